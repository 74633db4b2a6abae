//! SyncScheduler - drains pending changes into the remote store.
//!
//! One call to [`SyncScheduler::flush`] is a round:
//! 1. Snapshot the tracker; marks arriving later belong to the next round
//! 2. Delete edges, then nodes
//! 3. Upsert nodes, then edges, reading payloads from the local graph
//! 4. Clear exactly the ids the remote confirmed, batch by batch
//!
//! Failed ids stay pending. There is no retry loop here: whoever drives the
//! scheduler (a timer, a mutation hook) decides when to flush again.

use crate::error::{RemoteError, Result};
use crate::{
    BatchOutcome, ChangeKind, ChangeSet, ChangeTracker, EntityId, EntityKind, Error,
    GraphSnapshotProvider, ProjectId, RemoteClient, UpsertBatch,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Default number of ids sent in one remote call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Confirmed and failed counts for one of the four categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    pub confirmed: usize,
    pub failed: usize,
    /// Ids left pending, for callers tracking repeated failures
    pub failed_ids: Vec<EntityId>,
}

/// What a flush round did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub node_upserts: CategoryReport,
    pub node_deletes: CategoryReport,
    pub edge_upserts: CategoryReport,
    pub edge_deletes: CategoryReport,
    /// Dirty ids the local graph no longer had; cleared without a remote call
    pub vanished: usize,
    /// Messages of remote calls that failed as a whole
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FlushReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            node_upserts: CategoryReport::default(),
            node_deletes: CategoryReport::default(),
            edge_upserts: CategoryReport::default(),
            edge_deletes: CategoryReport::default(),
            vanished: 0,
            errors: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn category(&self, kind: EntityKind, change: ChangeKind) -> &CategoryReport {
        match (kind, change) {
            (EntityKind::Node, ChangeKind::Dirty) => &self.node_upserts,
            (EntityKind::Node, ChangeKind::Deleted) => &self.node_deletes,
            (EntityKind::Edge, ChangeKind::Dirty) => &self.edge_upserts,
            (EntityKind::Edge, ChangeKind::Deleted) => &self.edge_deletes,
        }
    }

    fn category_mut(&mut self, kind: EntityKind, change: ChangeKind) -> &mut CategoryReport {
        match (kind, change) {
            (EntityKind::Node, ChangeKind::Dirty) => &mut self.node_upserts,
            (EntityKind::Node, ChangeKind::Deleted) => &mut self.node_deletes,
            (EntityKind::Edge, ChangeKind::Dirty) => &mut self.edge_upserts,
            (EntityKind::Edge, ChangeKind::Deleted) => &mut self.edge_deletes,
        }
    }

    fn categories(&self) -> [&CategoryReport; 4] {
        [
            &self.node_upserts,
            &self.node_deletes,
            &self.edge_upserts,
            &self.edge_deletes,
        ]
    }

    /// Total ids confirmed this round.
    pub fn confirmed(&self) -> usize {
        self.categories().iter().map(|c| c.confirmed).sum()
    }

    /// Total ids left pending after failing this round.
    pub fn failed(&self) -> usize {
        self.categories().iter().map(|c| c.failed).sum()
    }

    /// Nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.errors.is_empty()
    }
}

/// Result of calling [`SyncScheduler::flush`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The round ran to the end (possibly with failed ids).
    Completed(FlushReport),
    /// Another round was already in flight; nothing was done.
    Busy,
}

impl FlushOutcome {
    pub fn report(&self) -> Option<&FlushReport> {
        match self {
            FlushOutcome::Completed(report) => Some(report),
            FlushOutcome::Busy => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, FlushOutcome::Busy)
    }
}

/// Observable state of the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// End of the last round in which nothing failed
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_report: Option<FlushReport>,
    pub last_error: Option<String>,
}

/// Resets `is_syncing` even if the flush future is dropped mid-round.
struct SyncingGuard<'a>(&'a watch::Sender<SyncStatus>);

impl<'a> SyncingGuard<'a> {
    fn enter(status: &'a watch::Sender<SyncStatus>) -> Self {
        status.send_modify(|s| s.is_syncing = true);
        Self(status)
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.is_syncing = false);
    }
}

/// Pushes a tracker's pending changes to a [`RemoteClient`].
pub struct SyncScheduler {
    tracker: Arc<ChangeTracker>,
    graph: Arc<dyn GraphSnapshotProvider>,
    remote: Option<Arc<dyn RemoteClient>>,
    project_id: Option<ProjectId>,
    max_batch_size: usize,
    in_flight: Mutex<()>,
    status_tx: watch::Sender<SyncStatus>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("project_id", &self.project_id)
            .field("has_remote", &self.remote.is_some())
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl SyncScheduler {
    /// Create a scheduler with no remote and no project yet.
    pub fn new(tracker: Arc<ChangeTracker>, graph: Arc<dyn GraphSnapshotProvider>) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::default());
        Self {
            tracker,
            graph,
            remote: None,
            project_id: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            in_flight: Mutex::new(()),
            status_tx,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteClient>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<ProjectId>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Cap the ids per remote call. Zero is treated as one.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Watch the status; updated when a round starts and ends.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Run one flush round.
    ///
    /// Remote failures never surface as `Err`; they are counted in the
    /// report and the affected ids stay pending. `Err` means misuse: no
    /// remote configured or no project id. A call made while another round
    /// is running returns [`FlushOutcome::Busy`] immediately.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let remote = self.remote.as_ref().ok_or(Error::RemoteNotConfigured)?;
        let project_id = match self.project_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::MissingProjectId),
        };

        let Ok(_round) = self.in_flight.try_lock() else {
            tracing::debug!(project_id, "flush already in flight");
            return Ok(FlushOutcome::Busy);
        };
        let _syncing = SyncingGuard::enter(&self.status_tx);

        let snapshot = self.tracker.take_snapshot();
        let mut report = FlushReport::new(Utc::now());

        tracing::debug!(project_id, pending = ?snapshot.pending(), "flush round started");

        // Edges first so a store enforcing foreign keys never sees an edge
        // pointing at a node that is already gone.
        for kind in [EntityKind::Edge, EntityKind::Node] {
            self.flush_deletes(remote.as_ref(), project_id, kind, &snapshot, &mut report)
                .await;
        }
        for kind in [EntityKind::Node, EntityKind::Edge] {
            self.flush_upserts(remote.as_ref(), project_id, kind, &snapshot, &mut report)
                .await;
        }

        report.finished_at = Utc::now();
        self.finish_round(project_id, &report);

        Ok(FlushOutcome::Completed(report))
    }

    async fn flush_deletes(
        &self,
        remote: &dyn RemoteClient,
        project_id: &str,
        kind: EntityKind,
        snapshot: &ChangeSet,
        report: &mut FlushReport,
    ) {
        let ids: Vec<EntityId> = snapshot.deleted(kind).iter().cloned().collect();

        for chunk in ids.chunks(self.max_batch_size) {
            let outcome = match remote.delete_batch(kind, project_id, chunk.to_vec()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(%kind, ids = chunk.len(), "delete batch failed: {}", e);
                    report.errors.push(e.to_string());
                    BatchOutcome::all_failed(chunk.to_vec())
                }
            };
            self.settle(snapshot, kind, ChangeKind::Deleted, chunk, &outcome, report);
        }
    }

    async fn flush_upserts(
        &self,
        remote: &dyn RemoteClient,
        project_id: &str,
        kind: EntityKind,
        snapshot: &ChangeSet,
        report: &mut FlushReport,
    ) {
        let ids = snapshot.upserts(kind);

        for chunk in ids.chunks(self.max_batch_size) {
            let batch = match self.read_batch(kind, chunk).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(%kind, ids = chunk.len(), "reading local graph failed: {}", e);
                    report.errors.push(e.to_string());
                    self.settle(
                        snapshot,
                        kind,
                        ChangeKind::Dirty,
                        chunk,
                        &BatchOutcome::all_failed(chunk.to_vec()),
                        report,
                    );
                    continue;
                }
            };

            let vanished = self.clear_vanished(snapshot, kind, chunk, &batch);
            report.vanished += vanished.len();
            let requested: Vec<EntityId> = chunk
                .iter()
                .filter(|id| !vanished.contains(*id))
                .cloned()
                .collect();
            if requested.is_empty() {
                continue;
            }

            let outcome = match remote.upsert_batch(project_id, batch).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(%kind, ids = requested.len(), "upsert batch failed: {}", e);
                    report.errors.push(e.to_string());
                    BatchOutcome::all_failed(requested.clone())
                }
            };
            self.settle(snapshot, kind, ChangeKind::Dirty, &requested, &outcome, report);
        }
    }

    /// Current payloads for `ids`, limited to the ids asked for.
    async fn read_batch(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> std::result::Result<UpsertBatch, RemoteError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let batch = match kind {
            EntityKind::Node => {
                let mut nodes = self.graph.read_nodes(ids).await?;
                nodes.retain(|n| wanted.contains(n.id.as_str()));
                UpsertBatch::Nodes(nodes)
            }
            EntityKind::Edge => {
                let mut edges = self.graph.read_edges(ids).await?;
                edges.retain(|e| wanted.contains(e.id.as_str()));
                UpsertBatch::Edges(edges)
            }
        };
        Ok(batch)
    }

    /// Clear dirty ids the graph did not return and report which they were.
    fn clear_vanished(
        &self,
        snapshot: &ChangeSet,
        kind: EntityKind,
        requested: &[EntityId],
        batch: &UpsertBatch,
    ) -> HashSet<EntityId> {
        let present: HashSet<EntityId> = batch.ids().into_iter().collect();
        let vanished: Vec<EntityId> = requested
            .iter()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();

        if !vanished.is_empty() {
            tracing::debug!(%kind, count = vanished.len(), "dirty ids no longer in local graph");
            self.clear(snapshot, kind, ChangeKind::Dirty, &vanished);
        }
        vanished.into_iter().collect()
    }

    /// Clear the confirmed subset of `requested` and record the rest as failed.
    fn settle(
        &self,
        snapshot: &ChangeSet,
        kind: EntityKind,
        change: ChangeKind,
        requested: &[EntityId],
        outcome: &BatchOutcome,
        report: &mut FlushReport,
    ) {
        let confirmed_by_remote: HashSet<&str> =
            outcome.confirmed_ids.iter().map(String::as_str).collect();
        let (confirmed, failed): (Vec<EntityId>, Vec<EntityId>) = requested
            .iter()
            .cloned()
            .partition(|id| confirmed_by_remote.contains(id.as_str()));

        let cleared = self.clear(snapshot, kind, change, &confirmed);

        tracing::debug!(
            %kind,
            ?change,
            confirmed = confirmed.len(),
            cleared,
            failed = failed.len(),
            "batch settled"
        );

        let category = report.category_mut(kind, change);
        category.confirmed += confirmed.len();
        category.failed += failed.len();
        category.failed_ids.extend(failed);
    }

    /// Clear `ids` against the round's snapshot. Returns how many left the
    /// live set; ids re-marked since the snapshot stay.
    fn clear(
        &self,
        snapshot: &ChangeSet,
        kind: EntityKind,
        change: ChangeKind,
        ids: &[EntityId],
    ) -> usize {
        if ids.is_empty() {
            return 0;
        }
        match kind {
            EntityKind::Node => self.tracker.clear_confirmed(snapshot, ids, &[], change),
            EntityKind::Edge => self.tracker.clear_confirmed(snapshot, &[], ids, change),
        }
    }

    fn finish_round(&self, project_id: &str, report: &FlushReport) {
        if report.is_clean() {
            tracing::info!(
                project_id,
                confirmed = report.confirmed(),
                vanished = report.vanished,
                "flush round complete"
            );
        } else {
            tracing::warn!(
                project_id,
                confirmed = report.confirmed(),
                failed = report.failed(),
                errors = report.errors.len(),
                "flush round left changes pending"
            );
        }

        self.status_tx.send_modify(|status| {
            if report.is_clean() {
                status.last_synced_at = Some(report.finished_at);
                status.last_error = None;
            } else {
                status.last_error = report
                    .errors
                    .first()
                    .cloned()
                    .or_else(|| Some(format!("{} ids failed to sync", report.failed())));
            }
            status.last_report = Some(report.clone());
        });
    }
}
