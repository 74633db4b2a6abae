//! Graph record types and the wire shapes exchanged with the remote store.

use crate::{EdgeId, EntityId, NodeId};
use serde::{Deserialize, Serialize};

/// Kind of graph entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    /// Plural name, as used in remote paths and logs.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Node => "nodes",
            EntityKind::Edge => "edges",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Edge => write!(f, "edge"),
        }
    }
}

/// A mind-map node as persisted remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Node identifier, unique within the project
    pub id: NodeId,
    /// Opaque payload (label, position, style, ...)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// A mind-map edge as persisted remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Edge identifier, unique within the project
    pub id: EdgeId,
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Opaque payload (label, style, ...)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EdgeRecord {
    pub fn new(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            data,
        }
    }
}

/// Records to upsert in one remote call. A batch never mixes kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertBatch {
    Nodes(Vec<NodeRecord>),
    Edges(Vec<EdgeRecord>),
}

impl UpsertBatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            UpsertBatch::Nodes(_) => EntityKind::Node,
            UpsertBatch::Edges(_) => EntityKind::Edge,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            UpsertBatch::Nodes(records) => records.len(),
            UpsertBatch::Edges(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the records in this batch, in order.
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            UpsertBatch::Nodes(records) => records.iter().map(|r| r.id.clone()).collect(),
            UpsertBatch::Edges(records) => records.iter().map(|r| r.id.clone()).collect(),
        }
    }
}

/// Per-id result of a batch call.
///
/// Ids that appear in neither list are treated as failed by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Ids the remote store applied
    pub confirmed_ids: Vec<EntityId>,
    /// Ids the remote store did not apply
    #[serde(default)]
    pub failed_ids: Vec<EntityId>,
}

impl BatchOutcome {
    /// Every id confirmed.
    pub fn all_confirmed(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            confirmed_ids: ids.into_iter().collect(),
            failed_ids: Vec::new(),
        }
    }

    /// Nothing confirmed.
    pub fn all_failed(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            confirmed_ids: Vec::new(),
            failed_ids: ids.into_iter().collect(),
        }
    }
}

/// Request body for upserting records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest<T> {
    pub records: Vec<T>,
}

/// Request body for deleting rows by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub ids: Vec<EntityId>,
}

/// Every node and edge the remote store holds for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}
