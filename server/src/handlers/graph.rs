//! Graph handler - returns everything stored for a project.

use crate::db;
use crate::error::Result;
use mindsync_engine::ProjectGraph;
use sqlx::PgPool;

/// Load all nodes and edges of a project. An unknown project is empty.
pub async fn handle_get_graph(pool: &PgPool, project_id: &str) -> Result<ProjectGraph> {
    let nodes = db::list_nodes(pool, project_id).await?;
    let edges = db::list_edges(pool, project_id).await?;

    tracing::debug!(
        project_id,
        nodes = nodes.len(),
        edges = edges.len(),
        "graph loaded"
    );

    Ok(ProjectGraph {
        nodes: nodes.into_iter().map(|n| n.into_record()).collect(),
        edges: edges.into_iter().map(|e| e.into_record()).collect(),
    })
}
