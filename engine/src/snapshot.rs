//! Persisted form of a tracker's pending changes.
//!
//! Snapshots are the bridge between the in-memory [`ChangeTracker`] and
//! whatever storage the host uses (a file, local storage). The engine only
//! produces and validates them; writing them somewhere is the caller's job.
//!
//! [`ChangeTracker`]: crate::ChangeTracker

use crate::{error::Result, ChangeSet, Error, PendingChanges, ProjectId};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Pending dirty/deleted ids of one project at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Project the changes belong to
    pub project_id: ProjectId,
    /// The pending sets
    pub changes: ChangeSet,
}

impl TrackerSnapshot {
    pub fn new(project_id: impl Into<ProjectId>, changes: ChangeSet) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            project_id: project_id.into(),
            changes,
        }
    }

    pub fn pending(&self) -> PendingChanges {
        self.changes.pending()
    }

    /// Serialize to JSON. Set ordering makes the output deterministic.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeTracker;

    #[test]
    fn json_is_deterministic() {
        let a = ChangeTracker::new();
        a.mark_node_dirty("n2");
        a.mark_node_dirty("n1");

        let b = ChangeTracker::new();
        b.mark_node_dirty("n1");
        b.mark_node_dirty("n2");

        assert_eq!(
            a.export_state("p").to_json().unwrap(),
            b.export_state("p").to_json().unwrap()
        );
    }

    #[test]
    fn json_round_trip_keeps_pending() {
        let tracker = ChangeTracker::new();
        tracker.mark_node_dirty("n1");
        tracker.mark_edge_deleted("e1");

        let json = tracker.export_state("project-1").to_json_pretty().unwrap();
        let parsed = TrackerSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed.project_id, "project-1");
        assert_eq!(parsed.pending(), tracker.pending_changes());
    }

    #[test]
    fn rejects_future_format() {
        let json = r#"{"formatVersion": 99, "projectId": "p", "changes": {}}"#;
        let err = TrackerSnapshot::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot format version"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            TrackerSnapshot::from_json("not json"),
            Err(Error::InvalidSnapshot(_))
        ));
    }
}
