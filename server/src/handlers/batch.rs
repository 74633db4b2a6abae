//! Batch handlers - apply upserts and deletes for one project.
//!
//! A batch is not a transaction. Each record is written on its own and
//! reported on its own: valid rows that the database accepts are
//! confirmed, invalid rows and rows the database rejects are failed. Only
//! an unreachable database fails the request as a whole.

use crate::db;
use crate::error::{AppError, Result};
use mindsync_engine::{BatchOutcome, EdgeRecord, EntityId, EntityKind, NodeRecord};
use sqlx::PgPool;

/// A record that can be checked before it reaches the database.
pub trait BatchRecord {
    fn id(&self) -> &str;

    /// Why the record cannot be stored, if it cannot.
    fn problem(&self) -> Option<&'static str>;
}

impl BatchRecord for NodeRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn problem(&self) -> Option<&'static str> {
        if self.id.is_empty() {
            return Some("empty id");
        }
        None
    }
}

impl BatchRecord for EdgeRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn problem(&self) -> Option<&'static str> {
        if self.id.is_empty() {
            return Some("empty id");
        }
        if self.source.is_empty() || self.target.is_empty() {
            return Some("empty endpoint");
        }
        None
    }
}

/// Reject batches over the configured size.
pub fn check_batch_size(kind: EntityKind, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(AppError::BadRequest(format!(
            "batch of {} {} exceeds the limit of {}",
            len,
            kind.plural(),
            max
        )));
    }
    Ok(())
}

/// Split records into storable ones and an outcome listing the rest as failed.
pub fn partition_valid<T: BatchRecord>(records: Vec<T>) -> (Vec<T>, BatchOutcome) {
    let mut outcome = BatchOutcome::default();
    let mut valid = Vec::with_capacity(records.len());

    for record in records {
        match record.problem() {
            Some(reason) => {
                tracing::debug!(id = record.id(), reason, "rejecting record");
                outcome.failed_ids.push(record.id().to_string());
            }
            None => valid.push(record),
        }
    }
    (valid, outcome)
}

/// Record the result of writing one row into `outcome`.
///
/// Row-level database errors fail the row; anything else aborts the batch.
fn settle_row(
    outcome: &mut BatchOutcome,
    id: &str,
    result: std::result::Result<(), sqlx::Error>,
) -> Result<()> {
    match result {
        Ok(()) => outcome.confirmed_ids.push(id.to_string()),
        Err(e) if db::is_row_error(&e) => {
            tracing::warn!(id, "row rejected by database: {}", e);
            outcome.failed_ids.push(id.to_string());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Upsert nodes, one statement per node.
pub async fn handle_upsert_nodes(
    pool: &PgPool,
    project_id: &str,
    records: Vec<NodeRecord>,
) -> Result<BatchOutcome> {
    let (valid, mut outcome) = partition_valid(records);

    for node in &valid {
        let result = db::upsert_node(pool, project_id, node).await;
        settle_row(&mut outcome, &node.id, result)?;
    }

    tracing::debug!(
        project_id,
        confirmed = outcome.confirmed_ids.len(),
        failed = outcome.failed_ids.len(),
        "nodes upserted"
    );
    Ok(outcome)
}

/// Upsert edges, one statement per edge.
pub async fn handle_upsert_edges(
    pool: &PgPool,
    project_id: &str,
    records: Vec<EdgeRecord>,
) -> Result<BatchOutcome> {
    let (valid, mut outcome) = partition_valid(records);

    for edge in &valid {
        let result = db::upsert_edge(pool, project_id, edge).await;
        settle_row(&mut outcome, &edge.id, result)?;
    }

    tracing::debug!(
        project_id,
        confirmed = outcome.confirmed_ids.len(),
        failed = outcome.failed_ids.len(),
        "edges upserted"
    );
    Ok(outcome)
}

/// Hard-delete rows of `kind`. Every id is confirmed once the statement
/// succeeds, including ids that had no row.
pub async fn handle_delete(
    pool: &PgPool,
    kind: EntityKind,
    project_id: &str,
    ids: Vec<EntityId>,
) -> Result<BatchOutcome> {
    if ids.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let removed = match kind {
        EntityKind::Node => db::delete_nodes(pool, project_id, &ids).await?,
        EntityKind::Edge => db::delete_edges(pool, project_id, &ids).await?,
    };

    tracing::debug!(
        project_id,
        %kind,
        requested = ids.len(),
        removed,
        "rows deleted"
    );
    Ok(BatchOutcome::all_confirmed(ids))
}
