//! ChangeSet - the dirty/deleted id sets for nodes and edges.
//!
//! A pure data structure with no IO. Mutation is crate-private: the
//! [`ChangeTracker`](crate::ChangeTracker) is the only writer, everyone else
//! gets an owned copy or a [`PendingChanges`] count.
//!
//! Besides the sets, a change set keeps a mark sequence: every dirty mark
//! stamps its id with the next sequence number, and a copy remembers the
//! sequence it was taken at. Clearing against a copy skips ids stamped after
//! the copy was made, so an edit that lands while a flush is in flight is
//! never swallowed by that flush's confirmation.

use crate::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which of the two per-kind sets an id lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Changed locally, needs an upsert
    Dirty,
    /// Removed locally, needs a remote delete
    Deleted,
}

/// Cardinalities of the four sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChanges {
    pub dirty_nodes: usize,
    pub dirty_edges: usize,
    pub deleted_nodes: usize,
    pub deleted_edges: usize,
}

impl PendingChanges {
    pub fn total(&self) -> usize {
        self.dirty_nodes + self.dirty_edges + self.deleted_nodes + self.deleted_edges
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Dirty and deleted ids per entity kind.
///
/// Uses BTreeSet so iteration (and therefore batch order and serialized
/// form) is deterministic. Mark stamps are in-memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(default)]
    dirty_nodes: BTreeSet<EntityId>,
    #[serde(default)]
    dirty_edges: BTreeSet<EntityId>,
    #[serde(default)]
    deleted_nodes: BTreeSet<EntityId>,
    #[serde(default)]
    deleted_edges: BTreeSet<EntityId>,
    /// Sequence number of the latest dirty mark
    #[serde(skip)]
    seq: u64,
    /// Last dirty-mark stamp per node id; absent means "before any copy"
    #[serde(skip)]
    node_stamps: BTreeMap<EntityId, u64>,
    #[serde(skip)]
    edge_stamps: BTreeMap<EntityId, u64>,
}

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids in the given set.
    pub fn ids(&self, kind: EntityKind, change: ChangeKind) -> &BTreeSet<EntityId> {
        match (kind, change) {
            (EntityKind::Node, ChangeKind::Dirty) => &self.dirty_nodes,
            (EntityKind::Edge, ChangeKind::Dirty) => &self.dirty_edges,
            (EntityKind::Node, ChangeKind::Deleted) => &self.deleted_nodes,
            (EntityKind::Edge, ChangeKind::Deleted) => &self.deleted_edges,
        }
    }

    fn ids_mut(&mut self, kind: EntityKind, change: ChangeKind) -> &mut BTreeSet<EntityId> {
        match (kind, change) {
            (EntityKind::Node, ChangeKind::Dirty) => &mut self.dirty_nodes,
            (EntityKind::Edge, ChangeKind::Dirty) => &mut self.dirty_edges,
            (EntityKind::Node, ChangeKind::Deleted) => &mut self.deleted_nodes,
            (EntityKind::Edge, ChangeKind::Deleted) => &mut self.deleted_edges,
        }
    }

    fn stamps_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, u64> {
        match kind {
            EntityKind::Node => &mut self.node_stamps,
            EntityKind::Edge => &mut self.edge_stamps,
        }
    }

    fn stamp(&self, kind: EntityKind, id: &str) -> u64 {
        let stamps = match kind {
            EntityKind::Node => &self.node_stamps,
            EntityKind::Edge => &self.edge_stamps,
        };
        stamps.get(id).copied().unwrap_or(0)
    }

    pub fn dirty(&self, kind: EntityKind) -> &BTreeSet<EntityId> {
        self.ids(kind, ChangeKind::Dirty)
    }

    pub fn deleted(&self, kind: EntityKind) -> &BTreeSet<EntityId> {
        self.ids(kind, ChangeKind::Deleted)
    }

    /// Whether `id` is in the given set.
    pub fn contains(&self, kind: EntityKind, change: ChangeKind, id: &str) -> bool {
        self.ids(kind, change).contains(id)
    }

    /// Dirty ids that still need an upsert: dirty minus deleted.
    pub fn upserts(&self, kind: EntityKind) -> Vec<EntityId> {
        let deleted = self.deleted(kind);
        self.dirty(kind)
            .iter()
            .filter(|id| !deleted.contains(*id))
            .cloned()
            .collect()
    }

    /// Counts of the four sets.
    pub fn pending(&self) -> PendingChanges {
        PendingChanges {
            dirty_nodes: self.dirty_nodes.len(),
            dirty_edges: self.dirty_edges.len(),
            deleted_nodes: self.deleted_nodes.len(),
            deleted_edges: self.deleted_edges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    /// Record `id` as dirty. A deleted id stays deleted and is not recorded.
    ///
    /// Returns true if the id was not dirty before. Re-marking a dirty id
    /// changes no count but restamps it.
    pub(crate) fn mark_dirty(&mut self, kind: EntityKind, id: &str) -> bool {
        if self.deleted(kind).contains(id) {
            return false;
        }
        self.seq += 1;
        let seq = self.seq;
        self.stamps_mut(kind).insert(id.to_string(), seq);
        self.ids_mut(kind, ChangeKind::Dirty).insert(id.to_string())
    }

    /// Record `id` as deleted and evict it from the dirty set.
    ///
    /// Returns true if either set changed.
    pub(crate) fn mark_deleted(&mut self, kind: EntityKind, id: &str) -> bool {
        let evicted = self.ids_mut(kind, ChangeKind::Dirty).remove(id);
        self.stamps_mut(kind).remove(id);
        let inserted = self
            .ids_mut(kind, ChangeKind::Deleted)
            .insert(id.to_string());
        evicted || inserted
    }

    /// Remove `ids` from one set, as confirmed against the copy `as_of`.
    ///
    /// An id is removed only if `as_of` holds it in the same set and, for
    /// dirty ids, it was not marked again after `as_of` was taken. Returns
    /// how many ids were removed.
    pub(crate) fn clear_confirmed<'a, I>(
        &mut self,
        as_of: &ChangeSet,
        kind: EntityKind,
        change: ChangeKind,
        ids: I,
    ) -> usize
    where
        I: IntoIterator<Item = &'a EntityId>,
    {
        let mut removed = 0;
        for id in ids {
            if !as_of.contains(kind, change, id) {
                continue;
            }
            if change == ChangeKind::Dirty && self.stamp(kind, id) > as_of.seq {
                continue;
            }
            if self.ids_mut(kind, change).remove(id.as_str()) {
                if change == ChangeKind::Dirty {
                    self.stamps_mut(kind).remove(id.as_str());
                }
                removed += 1;
            }
        }
        removed
    }

    /// Take over the sets of `other`, keeping the mark sequence monotonic.
    pub(crate) fn replace(&mut self, mut other: ChangeSet) {
        other.seq = other.seq.max(self.seq);
        *self = other;
    }

    /// Empty all four sets.
    pub(crate) fn reset(&mut self) {
        self.dirty_nodes.clear();
        self.dirty_edges.clear();
        self.deleted_nodes.clear();
        self.deleted_edges.clear();
        self.node_stamps.clear();
        self.edge_stamps.clear();
    }

    /// Drop dirty ids that are also deleted. Returns how many were dropped.
    ///
    /// Only needed for sets that did not come from the mark methods, such as
    /// a deserialized snapshot.
    pub(crate) fn enforce_delete_precedence(&mut self) -> usize {
        let mut dropped = 0;
        for kind in [EntityKind::Node, EntityKind::Edge] {
            let deleted = self.deleted(kind).clone();
            let dirty = self.ids_mut(kind, ChangeKind::Dirty);
            let before = dirty.len();
            dirty.retain(|id| !deleted.contains(id));
            dropped += before - dirty.len();
            self.stamps_mut(kind).retain(|id, _| !deleted.contains(id));
        }
        dropped
    }
}
