//! Database operations for the nodes table.

use mindsync_engine::{EntityId, NodeRecord};
use sqlx::{PgPool, Row};

/// A stored node row from the database.
#[derive(Debug)]
pub struct StoredNode {
    pub id: String,
    pub data: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredNode {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredNode {
            id: row.try_get("id")?,
            data: row.try_get("data")?,
        })
    }
}

impl StoredNode {
    pub fn into_record(self) -> NodeRecord {
        NodeRecord::new(self.id, self.data)
    }
}

/// Insert or replace a node.
pub async fn upsert_node(
    pool: &PgPool,
    project_id: &str,
    node: &NodeRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO nodes (project_id, id, data, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (project_id, id) DO UPDATE SET
            data = EXCLUDED.data,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(project_id)
    .bind(&node.id)
    .bind(&node.data)
    .execute(pool)
    .await?;

    Ok(())
}

/// Hard-delete nodes by id. Ids with no row are ignored.
///
/// Returns the number of rows removed.
pub async fn delete_nodes(
    pool: &PgPool,
    project_id: &str,
    ids: &[EntityId],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM nodes
        WHERE project_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(project_id)
    .bind(ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// All nodes of a project, ordered by id.
pub async fn list_nodes(pool: &PgPool, project_id: &str) -> Result<Vec<StoredNode>, sqlx::Error> {
    sqlx::query_as::<_, StoredNode>(
        r#"
        SELECT id, data
        FROM nodes
        WHERE project_id = $1
        ORDER BY id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}
