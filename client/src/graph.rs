//! InMemoryGraph - the local mind-map graph, wired to a change tracker.
//!
//! Every mutation goes through here and marks the tracker while the graph
//! lock is held, so the graph and the pending sets never disagree about an
//! id. The scheduler reads payloads back through [`GraphSnapshotProvider`].

use crate::persist::SavedProject;
use async_trait::async_trait;
use mindsync_engine::{
    ChangeKind, ChangeTracker, EdgeId, EdgeRecord, EntityKind, GraphSnapshotProvider, NodeId,
    NodeRecord, ProjectGraph, RemoteError,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeId, NodeRecord>,
    edges: BTreeMap<EdgeId, EdgeRecord>,
}

/// Nodes and edges of the open project.
#[derive(Debug)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
    tracker: Arc<ChangeTracker>,
}

impl InMemoryGraph {
    /// Create an empty graph that reports mutations to `tracker`.
    pub fn new(tracker: Arc<ChangeTracker>) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            tracker,
        }
    }

    /// Insert or replace a node and mark it dirty.
    pub fn upsert_node(&self, node: NodeRecord) {
        let mut state = self.state.write();
        self.tracker.mark_node_dirty(&node.id);
        state.nodes.insert(node.id.clone(), node);
    }

    /// Insert or replace an edge and mark it dirty.
    pub fn upsert_edge(&self, edge: EdgeRecord) {
        let mut state = self.state.write();
        self.tracker.mark_edge_dirty(&edge.id);
        state.edges.insert(edge.id.clone(), edge);
    }

    /// Remove a node together with every edge touching it.
    ///
    /// The node and the removed edges are marked deleted. Returns the node,
    /// or `None` (and marks nothing) if it was not in the graph.
    pub fn remove_node(&self, id: &str) -> Option<NodeRecord> {
        let mut state = self.state.write();
        let node = state.nodes.remove(id)?;

        let incident: Vec<EdgeId> = state
            .edges
            .values()
            .filter(|e| e.source == id || e.target == id)
            .map(|e| e.id.clone())
            .collect();
        for edge_id in &incident {
            state.edges.remove(edge_id);
            self.tracker.mark_edge_deleted(edge_id);
        }
        self.tracker.mark_node_deleted(id);

        tracing::trace!(id, incident_edges = incident.len(), "node removed");
        Some(node)
    }

    /// Remove an edge and mark it deleted.
    pub fn remove_edge(&self, id: &str) -> Option<EdgeRecord> {
        let mut state = self.state.write();
        let edge = state.edges.remove(id)?;
        self.tracker.mark_edge_deleted(id);
        Some(edge)
    }

    pub fn node(&self, id: &str) -> Option<NodeRecord> {
        self.state.read().nodes.get(id).cloned()
    }

    pub fn edge(&self, id: &str) -> Option<EdgeRecord> {
        self.state.read().edges.get(id).cloned()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.state.read().nodes.keys().cloned().collect()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.state.read().edges.keys().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }

    /// Replace the whole graph without marking anything.
    ///
    /// Used when the graph is loaded from a baseline (the remote store, a
    /// local file) rather than edited.
    pub fn replace_all(&self, graph: ProjectGraph) {
        let mut state = self.state.write();
        state.nodes = graph.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        state.edges = graph.edges.into_iter().map(|e| (e.id.clone(), e)).collect();
    }

    /// Replace the graph with a remote copy, keeping local pending changes.
    ///
    /// Pending deletions stay out of the graph and pending edits keep their
    /// local payload. Nothing is marked or cleared, so those changes still
    /// reach the remote store on the next flush.
    pub fn rebase_onto(&self, remote: ProjectGraph) {
        let mut state = self.state.write();
        let pending = self.tracker.take_snapshot();

        let mut nodes: BTreeMap<NodeId, NodeRecord> = remote
            .nodes
            .into_iter()
            .filter(|n| !pending.contains(EntityKind::Node, ChangeKind::Deleted, &n.id))
            .map(|n| (n.id.clone(), n))
            .collect();
        for id in pending.dirty(EntityKind::Node) {
            if let Some(local) = state.nodes.remove(id) {
                nodes.insert(id.clone(), local);
            }
        }

        let mut edges: BTreeMap<EdgeId, EdgeRecord> = remote
            .edges
            .into_iter()
            .filter(|e| !pending.contains(EntityKind::Edge, ChangeKind::Deleted, &e.id))
            .map(|e| (e.id.clone(), e))
            .collect();
        for id in pending.dirty(EntityKind::Edge) {
            if let Some(local) = state.edges.remove(id) {
                edges.insert(id.clone(), local);
            }
        }

        state.nodes = nodes;
        state.edges = edges;
    }

    /// Mark every node and edge dirty, e.g. to upload a project that was
    /// created offline. Returns how many ids were newly marked.
    pub fn mark_all_dirty(&self) -> usize {
        let state = self.state.read();
        self.tracker
            .mark_all_dirty(state.nodes.keys(), state.edges.keys())
    }

    /// Pending changes and graph of `project_id`, taken together.
    pub fn capture(&self, project_id: &str) -> SavedProject {
        let state = self.state.read();
        SavedProject {
            pending: self.tracker.export_state(project_id),
            graph: ProjectGraph {
                nodes: state.nodes.values().cloned().collect(),
                edges: state.edges.values().cloned().collect(),
            },
        }
    }

    /// Restore pending changes and graph saved by [`capture`](Self::capture).
    pub fn restore(
        &self,
        project_id: &str,
        saved: SavedProject,
    ) -> Result<(), mindsync_engine::Error> {
        let mut state = self.state.write();
        self.tracker.import_state(project_id, saved.pending)?;
        state.nodes = saved.graph.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        state.edges = saved.graph.edges.into_iter().map(|e| (e.id.clone(), e)).collect();
        Ok(())
    }

    /// Copy of the whole graph.
    pub fn to_project_graph(&self) -> ProjectGraph {
        let state = self.state.read();
        ProjectGraph {
            nodes: state.nodes.values().cloned().collect(),
            edges: state.edges.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl GraphSnapshotProvider for InMemoryGraph {
    async fn read_nodes(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, RemoteError> {
        let state = self.state.read();
        Ok(ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
    }

    async fn read_edges(&self, ids: &[EdgeId]) -> Result<Vec<EdgeRecord>, RemoteError> {
        let state = self.state.read();
        Ok(ids.iter().filter_map(|id| state.edges.get(id).cloned()).collect())
    }
}
