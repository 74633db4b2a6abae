//! # MindSync Engine
//!
//! Incremental change tracking and cloud synchronization for mind-map graphs.
//!
//! The application marks nodes and edges as changed whenever it likes; the
//! engine remembers what is pending and, when asked to flush, pushes exactly
//! that to a remote store without losing or duplicating writes.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine reaches the network and the canvas only through
//!   the [`RemoteClient`] and [`GraphSnapshotProvider`] traits
//! - **Idempotent**: marking twice is marking once; flushing twice is safe
//! - **Never loses a mark**: ids leave the pending sets only after the remote
//!   store confirmed them, and only if they were part of the flushed snapshot
//!
//! ## Core Concepts
//!
//! ### ChangeSet
//!
//! Four sets of ids: dirty nodes, dirty edges, deleted nodes, deleted edges.
//! For each kind an id is never both dirty and deleted; deletion wins.
//!
//! ### ChangeTracker
//!
//! The [`ChangeTracker`] is the only writer of the [`ChangeSet`]. Create one
//! per open project, share it behind an `Arc`, and drop it on project switch.
//!
//! ### SyncScheduler
//!
//! The [`SyncScheduler`] runs flush rounds: snapshot, delete, upsert, clear
//! what was confirmed. Failed ids stay pending for the next round.
//!
//! ## Quick Start
//!
//! ```rust
//! use mindsync_engine::ChangeTracker;
//!
//! let tracker = ChangeTracker::new();
//! tracker.mark_node_dirty("n1");
//! tracker.mark_node_dirty("n1");
//! tracker.mark_edge_dirty("e1");
//! tracker.mark_edge_deleted("e1");
//!
//! let pending = tracker.pending_changes();
//! assert_eq!(pending.dirty_nodes, 1);
//! assert_eq!(pending.dirty_edges, 0);
//! assert_eq!(pending.deleted_edges, 1);
//! ```
//!
//! ## Persistence
//!
//! Use [`ChangeTracker::export_state`] and [`ChangeTracker::import_state`]
//! with [`TrackerSnapshot`] to keep pending changes across restarts.

pub mod change_set;
pub mod error;
pub mod record;
pub mod remote;
pub mod scheduler;
pub mod snapshot;
pub mod tracker;

// Re-export main types at crate root
pub use change_set::{ChangeKind, ChangeSet, PendingChanges};
pub use error::{Error, RemoteError};
pub use record::{
    BatchOutcome, DeleteRequest, EdgeRecord, EntityKind, NodeRecord, ProjectGraph, UpsertBatch,
    UpsertRequest,
};
pub use remote::{GraphSnapshotProvider, RemoteClient};
pub use scheduler::{
    CategoryReport, FlushOutcome, FlushReport, SyncScheduler, SyncStatus, DEFAULT_MAX_BATCH_SIZE,
};
pub use snapshot::{TrackerSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use tracker::ChangeTracker;

/// Type aliases for clarity
pub type EntityId = String;
pub type NodeId = String;
pub type EdgeId = String;
pub type ProjectId = String;
