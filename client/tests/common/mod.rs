//! In-process stand-in for mindsync-server.
//!
//! Same routes and bodies as the real server, backed by maps instead of
//! PostgreSQL, with knobs to fail requests.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mindsync_engine::{
    BatchOutcome, DeleteRequest, EdgeRecord, EntityId, NodeRecord, ProjectGraph, UpsertRequest,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;

type Key = (String, EntityId);

#[derive(Default)]
pub struct StubState {
    nodes: Mutex<BTreeMap<Key, NodeRecord>>,
    edges: Mutex<BTreeMap<Key, EdgeRecord>>,
    rejected: Mutex<HashSet<EntityId>>,
    fail_status: Mutex<Option<StatusCode>>,
    garbage: Mutex<bool>,
    requests: Mutex<Vec<String>>,
}

impl StubState {
    /// Answer these ids as failed.
    pub fn reject(&self, ids: &[&str]) {
        self.rejected
            .lock()
            .extend(ids.iter().map(|s| s.to_string()));
    }

    /// Answer every request with `status` and a JSON error body.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        *self.fail_status.lock() = status;
    }

    /// Answer every request with 200 and a body that is not JSON.
    pub fn send_garbage(&self, garbage: bool) {
        *self.garbage.lock() = garbage;
    }

    /// `"METHOD /path"` of every request received.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn node(&self, project_id: &str, id: &str) -> Option<NodeRecord> {
        self.nodes
            .lock()
            .get(&(project_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn edge(&self, project_id: &str, id: &str) -> Option<EdgeRecord> {
        self.edges
            .lock()
            .get(&(project_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn seed(&self, project_id: &str, graph: ProjectGraph) {
        let mut nodes = self.nodes.lock();
        for node in graph.nodes {
            nodes.insert((project_id.to_string(), node.id.clone()), node);
        }
        let mut edges = self.edges.lock();
        for edge in graph.edges {
            edges.insert((project_id.to_string(), edge.id.clone()), edge);
        }
    }

    fn intercept(&self, request: String) -> Option<Response> {
        self.requests.lock().push(request);
        if let Some(status) = *self.fail_status.lock() {
            let body = serde_json::json!({"error": "stub failure"});
            return Some((status, Json(body)).into_response());
        }
        if *self.garbage.lock() {
            return Some((StatusCode::OK, "<html>not json</html>").into_response());
        }
        None
    }

    fn outcome(&self, ids: Vec<EntityId>) -> BatchOutcome {
        let rejected = self.rejected.lock();
        let (failed_ids, confirmed_ids) = ids.into_iter().partition(|id| rejected.contains(id));
        BatchOutcome {
            confirmed_ids,
            failed_ids,
        }
    }
}

pub struct StubServer {
    pub url: String,
    pub state: Arc<StubState>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let state = Arc::new(StubState::default());
        let app = Router::new()
            .route("/projects/{project_id}/graph", get(graph))
            .route("/projects/{project_id}/nodes", post(upsert_nodes))
            .route("/projects/{project_id}/nodes/delete", post(delete_nodes))
            .route("/projects/{project_id}/edges", post(upsert_edges))
            .route("/projects/{project_id}/edges/delete", post(delete_edges))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
            task,
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn graph(State(state): State<Arc<StubState>>, Path(project_id): Path<String>) -> Response {
    if let Some(response) = state.intercept(format!("GET /projects/{project_id}/graph")) {
        return response;
    }
    let graph = ProjectGraph {
        nodes: state
            .nodes
            .lock()
            .iter()
            .filter(|((p, _), _)| *p == project_id)
            .map(|(_, n)| n.clone())
            .collect(),
        edges: state
            .edges
            .lock()
            .iter()
            .filter(|((p, _), _)| *p == project_id)
            .map(|(_, e)| e.clone())
            .collect(),
    };
    Json(graph).into_response()
}

async fn upsert_nodes(
    State(state): State<Arc<StubState>>,
    Path(project_id): Path<String>,
    Json(request): Json<UpsertRequest<NodeRecord>>,
) -> Response {
    if let Some(response) = state.intercept(format!("POST /projects/{project_id}/nodes")) {
        return response;
    }
    let outcome = state.outcome(request.records.iter().map(|r| r.id.clone()).collect());
    let mut nodes = state.nodes.lock();
    for node in request.records {
        if outcome.confirmed_ids.contains(&node.id) {
            nodes.insert((project_id.clone(), node.id.clone()), node);
        }
    }
    Json(outcome).into_response()
}

async fn upsert_edges(
    State(state): State<Arc<StubState>>,
    Path(project_id): Path<String>,
    Json(request): Json<UpsertRequest<EdgeRecord>>,
) -> Response {
    if let Some(response) = state.intercept(format!("POST /projects/{project_id}/edges")) {
        return response;
    }
    let outcome = state.outcome(request.records.iter().map(|r| r.id.clone()).collect());
    let mut edges = state.edges.lock();
    for edge in request.records {
        if outcome.confirmed_ids.contains(&edge.id) {
            edges.insert((project_id.clone(), edge.id.clone()), edge);
        }
    }
    Json(outcome).into_response()
}

async fn delete_nodes(
    State(state): State<Arc<StubState>>,
    Path(project_id): Path<String>,
    Json(request): Json<DeleteRequest>,
) -> Response {
    if let Some(response) = state.intercept(format!("POST /projects/{project_id}/nodes/delete")) {
        return response;
    }
    let outcome = state.outcome(request.ids);
    let mut nodes = state.nodes.lock();
    for id in &outcome.confirmed_ids {
        nodes.remove(&(project_id.clone(), id.clone()));
    }
    Json(outcome).into_response()
}

async fn delete_edges(
    State(state): State<Arc<StubState>>,
    Path(project_id): Path<String>,
    Json(request): Json<DeleteRequest>,
) -> Response {
    if let Some(response) = state.intercept(format!("POST /projects/{project_id}/edges/delete")) {
        return response;
    }
    let outcome = state.outcome(request.ids);
    let mut edges = state.edges.lock();
    for id in &outcome.confirmed_ids {
        edges.remove(&(project_id.clone(), id.clone()));
    }
    Json(outcome).into_response()
}
