//! Database operations for the edges table.

use mindsync_engine::{EdgeRecord, EntityId};
use sqlx::{PgPool, Row};

/// A stored edge row from the database.
#[derive(Debug)]
pub struct StoredEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub data: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEdge {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEdge {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            target: row.try_get("target")?,
            data: row.try_get("data")?,
        })
    }
}

impl StoredEdge {
    pub fn into_record(self) -> EdgeRecord {
        EdgeRecord::new(self.id, self.source, self.target, self.data)
    }
}

/// Insert or replace an edge.
pub async fn upsert_edge(
    pool: &PgPool,
    project_id: &str,
    edge: &EdgeRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO edges (project_id, id, source, target, data, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (project_id, id) DO UPDATE SET
            source = EXCLUDED.source,
            target = EXCLUDED.target,
            data = EXCLUDED.data,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(project_id)
    .bind(&edge.id)
    .bind(&edge.source)
    .bind(&edge.target)
    .bind(&edge.data)
    .execute(pool)
    .await?;

    Ok(())
}

/// Hard-delete edges by id. Ids with no row are ignored.
///
/// Returns the number of rows removed.
pub async fn delete_edges(
    pool: &PgPool,
    project_id: &str,
    ids: &[EntityId],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM edges
        WHERE project_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(project_id)
    .bind(ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// All edges of a project, ordered by id.
pub async fn list_edges(pool: &PgPool, project_id: &str) -> Result<Vec<StoredEdge>, sqlx::Error> {
    sqlx::query_as::<_, StoredEdge>(
        r#"
        SELECT id, source, target, data
        FROM edges
        WHERE project_id = $1
        ORDER BY id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}
