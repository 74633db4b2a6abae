//! Per-project graph routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use mindsync_engine::{
    BatchOutcome, DeleteRequest, EdgeRecord, EntityKind, NodeRecord, ProjectGraph, UpsertRequest,
};

use crate::error::Result;
use crate::handlers::{
    check_batch_size, handle_delete, handle_get_graph, handle_upsert_edges, handle_upsert_nodes,
};
use crate::AppState;

/// Create project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/graph", get(graph_handler))
        .route("/projects/{project_id}/nodes", post(upsert_nodes_handler))
        .route("/projects/{project_id}/nodes/delete", post(delete_nodes_handler))
        .route("/projects/{project_id}/edges", post(upsert_edges_handler))
        .route("/projects/{project_id}/edges/delete", post(delete_edges_handler))
}

/// GET /projects/{project_id}/graph - Every node and edge of the project.
async fn graph_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectGraph>> {
    let graph = handle_get_graph(&state.pool, &project_id).await?;
    Ok(Json(graph))
}

/// POST /projects/{project_id}/nodes - Upsert nodes.
async fn upsert_nodes_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: std::result::Result<Json<UpsertRequest<NodeRecord>>, JsonRejection>,
) -> Result<Json<BatchOutcome>> {
    let Json(request) = body?;
    check_batch_size(EntityKind::Node, request.records.len(), state.config.max_batch_size)?;
    let outcome = handle_upsert_nodes(&state.pool, &project_id, request.records).await?;
    Ok(Json(outcome))
}

/// POST /projects/{project_id}/edges - Upsert edges.
async fn upsert_edges_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: std::result::Result<Json<UpsertRequest<EdgeRecord>>, JsonRejection>,
) -> Result<Json<BatchOutcome>> {
    let Json(request) = body?;
    check_batch_size(EntityKind::Edge, request.records.len(), state.config.max_batch_size)?;
    let outcome = handle_upsert_edges(&state.pool, &project_id, request.records).await?;
    Ok(Json(outcome))
}

/// POST /projects/{project_id}/nodes/delete - Hard-delete nodes.
async fn delete_nodes_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>> {
    delete(state, EntityKind::Node, project_id, body).await
}

/// POST /projects/{project_id}/edges/delete - Hard-delete edges.
async fn delete_edges_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>> {
    delete(state, EntityKind::Edge, project_id, body).await
}

async fn delete(
    state: AppState,
    kind: EntityKind,
    project_id: String,
    body: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>> {
    let Json(request) = body?;
    check_batch_size(kind, request.ids.len(), state.config.max_batch_size)?;
    let outcome = handle_delete(&state.pool, kind, &project_id, request.ids).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use crate::routes::{create_routes, test_support::offline_state};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use mindsync_engine::BatchOutcome;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(max_batch_size: usize) -> Router {
        create_routes().with_state(offline_state(max_batch_size))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ============================================================================
    // Validation (no database needed)
    // ============================================================================

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let records: Vec<Value> = (0..3).map(|i| json!({"id": format!("n{i}")})).collect();
        let response = app(2)
            .oneshot(post("/projects/p1/nodes", json!({ "records": records })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid request");
        assert!(body["details"].as_str().unwrap().contains("exceeds the limit"));
    }

    #[tokio::test]
    async fn oversized_delete_is_rejected() {
        let response = app(1)
            .oneshot(post("/projects/p1/edges/delete", json!({"ids": ["e1", "e2"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_records_fail_individually() {
        let response = app(10)
            .oneshot(post(
                "/projects/p1/edges",
                json!({"records": [
                    {"id": "", "source": "a", "target": "b"},
                    {"id": "e2", "source": "", "target": "b"}
                ]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome: BatchOutcome = serde_json::from_value(body_json(response).await).unwrap();
        assert!(outcome.confirmed_ids.is_empty());
        assert_eq!(outcome.failed_ids, vec!["".to_string(), "e2".to_string()]);
    }

    #[tokio::test]
    async fn empty_batches_are_noops() {
        let response = app(10)
            .oneshot(post("/projects/p1/nodes", json!({"records": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"confirmedIds": [], "failedIds": []})
        );

        let response = app(10)
            .oneshot(post("/projects/p1/nodes/delete", json!({"ids": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let response = app(10)
            .oneshot(post("/projects/p1/nodes", json!({"nodes": "nope"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app(10)
            .oneshot(
                Request::builder()
                    .uri("/projects/p1/widgets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "no route for /projects/p1/widgets"
        );
    }

    // ============================================================================
    // Database unreachable
    // ============================================================================

    #[tokio::test]
    async fn unreachable_database_fails_whole_batch() {
        let response = app(10)
            .oneshot(post(
                "/projects/p1/nodes",
                json!({"records": [{"id": "n1", "data": {"label": "root"}}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Database error");
    }

    #[tokio::test]
    async fn health_reports_degraded_database() {
        let response = app(10)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], false);
    }
}
