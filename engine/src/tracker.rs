//! ChangeTracker - the single place where local changes are recorded.
//!
//! The tracker owns a [`ChangeSet`] behind a mutex that is never held across
//! an await point, so marks from the application keep going while a flush
//! is waiting on the network.

use crate::snapshot::{TrackerSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::{
    error::Result, ChangeKind, ChangeSet, EdgeId, EntityId, EntityKind, Error, NodeId,
    PendingChanges,
};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Records which nodes and edges changed since the last confirmed sync.
///
/// One tracker per open project. Share it with `Arc<ChangeTracker>`; all
/// methods take `&self`.
#[derive(Debug)]
pub struct ChangeTracker {
    changes: Mutex<ChangeSet>,
    pending_tx: watch::Sender<PendingChanges>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeTracker {
    /// Create a tracker with nothing pending.
    pub fn new() -> Self {
        let (pending_tx, _) = watch::channel(PendingChanges::default());
        Self {
            changes: Mutex::new(ChangeSet::new()),
            pending_tx,
        }
    }

    pub fn mark_node_dirty(&self, id: &str) -> bool {
        self.mark_dirty(EntityKind::Node, id)
    }

    pub fn mark_edge_dirty(&self, id: &str) -> bool {
        self.mark_dirty(EntityKind::Edge, id)
    }

    pub fn mark_node_deleted(&self, id: &str) -> bool {
        self.mark_deleted(EntityKind::Node, id)
    }

    pub fn mark_edge_deleted(&self, id: &str) -> bool {
        self.mark_deleted(EntityKind::Edge, id)
    }

    /// Record a local edit. Returns false if the id was already dirty or is
    /// pending deletion (a deleted id is never resurrected by an edit).
    pub fn mark_dirty(&self, kind: EntityKind, id: &str) -> bool {
        self.mutate(|changes| {
            let recorded = changes.mark_dirty(kind, id);
            if !recorded && changes.contains(kind, ChangeKind::Deleted, id) {
                tracing::debug!(%kind, id, "ignoring edit of entity pending deletion");
            }
            recorded
        })
    }

    /// Record a local delete, superseding any pending edit of the same id.
    pub fn mark_deleted(&self, kind: EntityKind, id: &str) -> bool {
        self.mutate(|changes| changes.mark_deleted(kind, id))
    }

    /// Mark many ids dirty at once, e.g. to upload a whole project.
    ///
    /// Returns how many ids were newly recorded.
    pub fn mark_all_dirty<'a, N, E>(&self, node_ids: N, edge_ids: E) -> usize
    where
        N: IntoIterator<Item = &'a NodeId>,
        E: IntoIterator<Item = &'a EdgeId>,
    {
        self.mutate(|changes| {
            let nodes = node_ids
                .into_iter()
                .filter(|id| changes.mark_dirty(EntityKind::Node, id))
                .count();
            let edges = edge_ids
                .into_iter()
                .filter(|id| changes.mark_dirty(EntityKind::Edge, id))
                .count();
            nodes + edges
        })
    }

    /// Live counts of the four sets.
    pub fn pending_changes(&self) -> PendingChanges {
        self.changes.lock().pending()
    }

    /// Whether anything is waiting to be synced.
    pub fn has_pending(&self) -> bool {
        !self.pending_changes().is_empty()
    }

    /// Forget everything pending.
    ///
    /// Used when leaving a project or after a desync that cannot be
    /// recovered by retrying.
    pub fn reset_sync_state(&self) {
        self.mutate(|changes| changes.reset());
        tracing::debug!("sync state reset");
    }

    /// Owned copy of the current sets; the live sets are left untouched.
    pub fn take_snapshot(&self) -> ChangeSet {
        self.changes.lock().clone()
    }

    /// Remove the given ids from one kind of set, as confirmed for `snapshot`.
    ///
    /// `snapshot` is the copy returned by [`take_snapshot`](Self::take_snapshot)
    /// that the caller flushed. Ids not in that snapshot are ignored, and so
    /// are dirty ids marked again after it was taken: those marks survive
    /// for the next round. Returns how many ids were removed.
    pub fn clear_confirmed(
        &self,
        snapshot: &ChangeSet,
        node_ids: &[NodeId],
        edge_ids: &[EdgeId],
        change: ChangeKind,
    ) -> usize {
        self.mutate(|changes| {
            let nodes = changes.clear_confirmed(snapshot, EntityKind::Node, change, node_ids);
            let edges = changes.clear_confirmed(snapshot, EntityKind::Edge, change, edge_ids);
            tracing::trace!(?change, nodes, edges, "cleared confirmed ids");
            nodes + edges
        })
    }

    /// Watch the pending counts.
    ///
    /// A new value is published whenever a mutation changes them.
    pub fn subscribe(&self) -> watch::Receiver<PendingChanges> {
        self.pending_tx.subscribe()
    }

    /// Export the pending sets for persistence.
    pub fn export_state(&self, project_id: &str) -> TrackerSnapshot {
        TrackerSnapshot::new(project_id, self.take_snapshot())
    }

    /// Replace the pending sets with a persisted snapshot.
    ///
    /// The snapshot must belong to `project_id`. Dirty ids that are also
    /// deleted in the snapshot are dropped.
    pub fn import_state(&self, project_id: &str, snapshot: TrackerSnapshot) -> Result<()> {
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if snapshot.project_id != project_id {
            return Err(Error::ProjectMismatch {
                expected: project_id.to_string(),
                actual: snapshot.project_id,
            });
        }

        let mut imported = snapshot.changes;
        let dropped = imported.enforce_delete_precedence();
        if dropped > 0 {
            tracing::warn!(dropped, "snapshot had ids both dirty and deleted");
        }

        self.mutate(|changes| changes.replace(imported));
        Ok(())
    }

    /// Apply `f` under the lock and publish the new counts if they moved.
    fn mutate<T>(&self, f: impl FnOnce(&mut ChangeSet) -> T) -> T {
        let (result, pending) = {
            let mut changes = self.changes.lock();
            let result = f(&mut changes);
            (result, changes.pending())
        };
        self.pending_tx.send_if_modified(|current| {
            if *current == pending {
                false
            } else {
                *current = pending;
                true
            }
        });
        result
    }
}

/// Ids of `kind` from `ids` that are currently in the given set.
///
/// Handy for callers building retry or give-up policies on failed ids.
pub fn still_pending(
    tracker: &ChangeTracker,
    kind: EntityKind,
    change: ChangeKind,
    ids: &[EntityId],
) -> Vec<EntityId> {
    let changes = tracker.changes.lock();
    ids.iter()
        .filter(|id| changes.contains(kind, change, id))
        .cloned()
        .collect()
}
