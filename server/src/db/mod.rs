//! Database module for PostgreSQL persistence.
//!
//! Two tables, `nodes` and `edges`, keyed by `(project_id, id)`. Every
//! write is a single statement, so each record is applied atomically.

mod edges;
mod nodes;
mod pool;

pub use edges::*;
pub use nodes::*;
pub use pool::*;

/// Whether the error is a per-row data problem (constraint, bad value)
/// rather than the database being unreachable.
pub fn is_row_error(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(_))
}
