//! Seams to the outside world: the remote store and the local graph.
//!
//! The engine never talks to a network or reads the canvas itself. Hosts
//! implement these two traits and hand them to the
//! [`SyncScheduler`](crate::SyncScheduler).

use crate::error::RemoteError;
use crate::{
    BatchOutcome, EdgeId, EdgeRecord, EntityId, EntityKind, NodeId, NodeRecord, ProjectGraph,
    UpsertBatch,
};
use async_trait::async_trait;

/// Batch persistence against the remote store, scoped to a project.
///
/// Implementations must accept an empty batch as a no-op success and must
/// write each record atomically: a record is either fully applied (and
/// confirmed) or not at all.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Insert or replace rows keyed by `(project_id, id)`.
    async fn upsert_batch(
        &self,
        project_id: &str,
        batch: UpsertBatch,
    ) -> Result<BatchOutcome, RemoteError>;

    /// Hard-delete rows keyed by `(project_id, id)`. Deleting a missing row
    /// counts as confirmed.
    async fn delete_batch(
        &self,
        kind: EntityKind,
        project_id: &str,
        ids: Vec<EntityId>,
    ) -> Result<BatchOutcome, RemoteError>;

    /// Every node and edge stored for the project.
    async fn fetch_project(&self, project_id: &str) -> Result<ProjectGraph, RemoteError>;
}

/// Read access to the current local graph.
///
/// Only entities that still exist are returned; unknown ids are skipped.
#[async_trait]
pub trait GraphSnapshotProvider: Send + Sync {
    async fn read_nodes(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, RemoteError>;

    async fn read_edges(&self, ids: &[EdgeId]) -> Result<Vec<EdgeRecord>, RemoteError>;
}
