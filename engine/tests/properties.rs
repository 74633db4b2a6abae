//! Property tests for the change tracker.

use mindsync_engine::{ChangeKind, ChangeTracker, EntityKind, PendingChanges};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Mark {
    Dirty(EntityKind, String),
    Deleted(EntityKind, String),
    Reset,
}

fn arb_kind() -> impl Strategy<Value = EntityKind> {
    prop_oneof![Just(EntityKind::Node), Just(EntityKind::Edge)]
}

// A small id space so marks collide often
fn arb_id() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|i| format!("id-{i}"))
}

fn arb_mark() -> impl Strategy<Value = Mark> {
    prop_oneof![
        8 => (arb_kind(), arb_id()).prop_map(|(k, id)| Mark::Dirty(k, id)),
        4 => (arb_kind(), arb_id()).prop_map(|(k, id)| Mark::Deleted(k, id)),
        1 => Just(Mark::Reset),
    ]
}

fn apply(tracker: &ChangeTracker, mark: &Mark) {
    match mark {
        Mark::Dirty(kind, id) => {
            tracker.mark_dirty(*kind, id);
        }
        Mark::Deleted(kind, id) => {
            tracker.mark_deleted(*kind, id);
        }
        Mark::Reset => tracker.reset_sync_state(),
    }
}

fn assert_disjoint(tracker: &ChangeTracker) {
    let snapshot = tracker.take_snapshot();
    for kind in [EntityKind::Node, EntityKind::Edge] {
        let dirty = snapshot.dirty(kind);
        let deleted = snapshot.deleted(kind);
        assert!(
            dirty.is_disjoint(deleted),
            "{kind} ids both dirty and deleted: {:?}",
            dirty.intersection(deleted).collect::<Vec<_>>()
        );
    }
}

proptest! {
    #[test]
    fn prop_dirty_and_deleted_stay_disjoint(marks in prop::collection::vec(arb_mark(), 0..64)) {
        let tracker = ChangeTracker::new();
        for mark in &marks {
            apply(&tracker, mark);
            assert_disjoint(&tracker);
        }
    }

    #[test]
    fn prop_repeated_dirty_marks_count_once(
        kind in arb_kind(),
        id in arb_id(),
        repeats in 2usize..10,
    ) {
        let tracker = ChangeTracker::new();
        tracker.mark_dirty(kind, &id);
        let after_first = tracker.pending_changes();

        for _ in 1..repeats {
            tracker.mark_dirty(kind, &id);
        }
        prop_assert_eq!(tracker.pending_changes(), after_first);
    }

    #[test]
    fn prop_delete_after_dirty_wins(
        before in prop::collection::vec(arb_mark(), 0..16),
        kind in arb_kind(),
        id in arb_id(),
    ) {
        let tracker = ChangeTracker::new();
        for mark in &before {
            apply(&tracker, mark);
        }

        tracker.mark_dirty(kind, &id);
        tracker.mark_deleted(kind, &id);

        let snapshot = tracker.take_snapshot();
        prop_assert!(snapshot.contains(kind, ChangeKind::Deleted, &id));
        prop_assert!(!snapshot.contains(kind, ChangeKind::Dirty, &id));
    }

    #[test]
    fn prop_reset_clears_everything(marks in prop::collection::vec(arb_mark(), 0..64)) {
        let tracker = ChangeTracker::new();
        for mark in &marks {
            apply(&tracker, mark);
        }
        tracker.reset_sync_state();
        prop_assert_eq!(tracker.pending_changes(), PendingChanges::default());
    }

    #[test]
    fn prop_marks_after_snapshot_survive_clear(
        before in prop::collection::vec(arb_mark(), 0..32),
        after in prop::collection::vec(arb_mark(), 1..32),
    ) {
        // Resets are a session boundary, not a concurrent mark
        let after: Vec<Mark> = after
            .into_iter()
            .filter(|m| !matches!(m, Mark::Reset))
            .collect();

        let tracker = ChangeTracker::new();
        for mark in &before {
            apply(&tracker, mark);
        }

        let snapshot = tracker.take_snapshot();
        for mark in &after {
            apply(&tracker, mark);
        }

        // Confirm everything the snapshot held
        for change in [ChangeKind::Dirty, ChangeKind::Deleted] {
            let nodes: Vec<String> = snapshot.ids(EntityKind::Node, change).iter().cloned().collect();
            let edges: Vec<String> = snapshot.ids(EntityKind::Edge, change).iter().cloned().collect();
            tracker.clear_confirmed(&snapshot, &nodes, &edges, change);
        }

        // The last mark per id after the snapshot decides where it must be
        let live = tracker.take_snapshot();
        let mut last: std::collections::HashMap<(EntityKind, String), ChangeKind> =
            std::collections::HashMap::new();
        for mark in &after {
            match mark {
                Mark::Dirty(kind, id) => {
                    // An edit of a pending delete is not recorded
                    let entry = last.entry((*kind, id.clone())).or_insert(ChangeKind::Dirty);
                    if *entry != ChangeKind::Deleted
                        && !snapshot.contains(*kind, ChangeKind::Deleted, id)
                    {
                        *entry = ChangeKind::Dirty;
                    }
                }
                Mark::Deleted(kind, id) => {
                    last.insert((*kind, id.clone()), ChangeKind::Deleted);
                }
                Mark::Reset => unreachable!(),
            }
        }

        for ((kind, id), change) in last {
            match change {
                ChangeKind::Dirty => {
                    if !snapshot.contains(kind, ChangeKind::Deleted, &id) {
                        prop_assert!(
                            live.contains(kind, ChangeKind::Dirty, &id),
                            "{} {} marked dirty after snapshot was lost", kind, id
                        );
                    }
                }
                ChangeKind::Deleted => {
                    if !snapshot.contains(kind, ChangeKind::Deleted, &id) {
                        prop_assert!(
                            live.contains(kind, ChangeKind::Deleted, &id),
                            "{} {} deleted after snapshot was lost", kind, id
                        );
                    }
                }
            }
        }
    }
}
