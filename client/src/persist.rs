//! File-backed storage of an open project: its pending changes and the
//! local graph they refer to, one JSON file per project.

use crate::error::Result;
use mindsync_engine::{Error, ProjectGraph, TrackerSnapshot};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// What a session saves between runs.
///
/// The graph is kept next to the pending ids so that restored dirty ids
/// still have a payload to upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    pub pending: TrackerSnapshot,
    #[serde(default)]
    pub graph: ProjectGraph,
}

impl SavedProject {
    pub fn project_id(&self) -> &str {
        &self.pending.project_id
    }
}

/// Reads and writes `<dir>/project-<hex of project_id>.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the saved state of `project_id`.
    ///
    /// The id is hex-encoded, so distinct ids never share a file.
    pub fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir
            .join(format!("project-{}.json", hex::encode(project_id.as_bytes())))
    }

    /// Write the saved state, replacing the previous file atomically.
    pub async fn save(&self, saved: &SavedProject) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(saved.project_id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(saved)
            .map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            project_id = %saved.project_id(),
            path = %path.display(),
            pending = saved.pending.pending().total(),
            nodes = saved.graph.nodes.len(),
            edges = saved.graph.edges.len(),
            "project state saved"
        );
        Ok(path)
    }

    /// Read the saved state of `project_id`, if there is one.
    pub async fn load(&self, project_id: &str) -> Result<Option<SavedProject>> {
        let path = self.path_for(project_id);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let saved: SavedProject =
            serde_json::from_str(&json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        tracing::debug!(
            project_id,
            path = %path.display(),
            pending = saved.pending.pending().total(),
            "project state loaded"
        );
        Ok(Some(saved))
    }

    /// Delete the saved state of `project_id`. Missing files are fine.
    pub async fn remove(&self, project_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(project_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
