//! Test doubles for the remote store and the local graph.

#![allow(dead_code)]

use async_trait::async_trait;
use mindsync_engine::{
    BatchOutcome, EdgeId, EdgeRecord, EntityId, EntityKind, GraphSnapshotProvider, NodeId,
    NodeRecord, ProjectGraph, RemoteClient, RemoteError, UpsertBatch,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A remote call as seen by [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upsert { kind: EntityKind, ids: Vec<EntityId> },
    Delete { kind: EntityKind, ids: Vec<EntityId> },
}

type Hook = Box<dyn Fn(&Call) + Send + Sync>;

/// Remote store that confirms everything except what it is told to fail.
#[derive(Default)]
pub struct ScriptedRemote {
    rejected: Mutex<HashSet<EntityId>>,
    offline: AtomicBool,
    calls: Mutex<Vec<Call>>,
    hook: Mutex<Option<Hook>>,
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer these ids as failed.
    pub fn reject(&self, ids: &[&str]) {
        self.rejected
            .lock()
            .extend(ids.iter().map(|s| s.to_string()));
    }

    pub fn accept_all(&self) {
        self.rejected.lock().clear();
    }

    /// Fail every call as a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Run `hook` inside every call, before it answers.
    pub fn on_call(&self, hook: impl Fn(&Call) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// Make the next call signal `entered` and wait for `release`.
    pub fn pause_next_call(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    async fn answer(&self, call: Call) -> Result<BatchOutcome, RemoteError> {
        self.calls.lock().push(call.clone());

        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        if let Some(hook) = self.hook.lock().as_ref() {
            hook(&call);
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".into()));
        }

        let ids = match call {
            Call::Upsert { ids, .. } | Call::Delete { ids, .. } => ids,
        };
        let rejected = self.rejected.lock();
        let (failed_ids, confirmed_ids) = ids.into_iter().partition(|id| rejected.contains(id));
        Ok(BatchOutcome {
            confirmed_ids,
            failed_ids,
        })
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn upsert_batch(
        &self,
        _project_id: &str,
        batch: UpsertBatch,
    ) -> Result<BatchOutcome, RemoteError> {
        self.answer(Call::Upsert {
            kind: batch.kind(),
            ids: batch.ids(),
        })
        .await
    }

    async fn delete_batch(
        &self,
        kind: EntityKind,
        _project_id: &str,
        ids: Vec<EntityId>,
    ) -> Result<BatchOutcome, RemoteError> {
        self.answer(Call::Delete { kind, ids }).await
    }

    async fn fetch_project(&self, _project_id: &str) -> Result<ProjectGraph, RemoteError> {
        Ok(ProjectGraph::default())
    }
}

/// Local graph backed by two maps.
#[derive(Default)]
pub struct MapGraph {
    nodes: Mutex<BTreeMap<NodeId, NodeRecord>>,
    edges: Mutex<BTreeMap<EdgeId, EdgeRecord>>,
}

impl MapGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_node(&self, id: &str) {
        self.nodes
            .lock()
            .insert(id.to_string(), NodeRecord::new(id, json!({"label": id})));
    }

    pub fn put_edge(&self, id: &str, source: &str, target: &str) {
        self.edges.lock().insert(
            id.to_string(),
            EdgeRecord::new(id, source, target, json!({})),
        );
    }

    pub fn drop_node(&self, id: &str) {
        self.nodes.lock().remove(id);
    }
}

#[async_trait]
impl GraphSnapshotProvider for MapGraph {
    async fn read_nodes(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, RemoteError> {
        let nodes = self.nodes.lock();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn read_edges(&self, ids: &[EdgeId]) -> Result<Vec<EdgeRecord>, RemoteError> {
        let edges = self.edges.lock();
        Ok(ids.iter().filter_map(|id| edges.get(id).cloned()).collect())
    }
}
