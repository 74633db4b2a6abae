//! HTTP implementation of [`RemoteClient`] against a MindSync server.

use crate::config::ClientConfig;
use crate::error::Result;
use async_trait::async_trait;
use mindsync_engine::{
    BatchOutcome, DeleteRequest, EntityId, EntityKind, ProjectGraph, RemoteClient, RemoteError,
    UpsertBatch, UpsertRequest,
};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Talks to the `/projects/{project_id}/...` endpoints of a MindSync server.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: Url,
}

impl HttpRemoteClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid server url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!("invalid server url {base_url}")).into());
        }

        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.server_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/projects/{project_id}/{segments...}`, with each segment
    /// percent-encoded.
    fn endpoint(&self, project_id: &str, segments: &[&str]) -> std::result::Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Transport(format!("invalid server url {}", self.base_url)))?;
            path.pop_if_empty().push("projects").push(project_id);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn send<B, R>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> std::result::Result<R, RemoteError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(%method, %url, status = status.as_u16(), "remote rejected request");
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn upsert_batch(
        &self,
        project_id: &str,
        batch: UpsertBatch,
    ) -> std::result::Result<BatchOutcome, RemoteError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let url = self.endpoint(project_id, &[batch.kind().plural()])?;
        tracing::trace!(%url, records = batch.len(), "upserting batch");

        match batch {
            UpsertBatch::Nodes(records) => {
                self.send(Method::POST, url, Some(&UpsertRequest { records }))
                    .await
            }
            UpsertBatch::Edges(records) => {
                self.send(Method::POST, url, Some(&UpsertRequest { records }))
                    .await
            }
        }
    }

    async fn delete_batch(
        &self,
        kind: EntityKind,
        project_id: &str,
        ids: Vec<EntityId>,
    ) -> std::result::Result<BatchOutcome, RemoteError> {
        if ids.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let url = self.endpoint(project_id, &[kind.plural(), "delete"])?;
        tracing::trace!(%url, ids = ids.len(), "deleting batch");

        self.send(Method::POST, url, Some(&DeleteRequest { ids }))
            .await
    }

    async fn fetch_project(&self, project_id: &str) -> std::result::Result<ProjectGraph, RemoteError> {
        let url = self.endpoint(project_id, &["graph"])?;
        self.send::<(), _>(Method::GET, url, None).await
    }
}
