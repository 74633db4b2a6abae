//! ProjectSession - lifecycle of one open project.
//!
//! A session owns the project's tracker, local graph and scheduler. Opening
//! it restores the graph and pending changes saved by an earlier run;
//! closing it makes a last flush attempt and saves whatever is still
//! pending. Switching projects means closing one session and opening
//! another, so pending sets never leak between projects.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::graph::InMemoryGraph;
use crate::http::HttpRemoteClient;
use crate::persist::StateStore;
use mindsync_engine::{
    ChangeTracker, Error, FlushOutcome, ProjectId, RemoteClient, SyncScheduler, SyncStatus,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// An open project.
pub struct ProjectSession {
    project_id: ProjectId,
    tracker: Arc<ChangeTracker>,
    graph: Arc<InMemoryGraph>,
    scheduler: Arc<SyncScheduler>,
    remote: Arc<dyn RemoteClient>,
    store: StateStore,
    flush_interval: Duration,
    /// Auto-flush loops spawned from this session
    auto_flush: Mutex<Vec<LoopControl>>,
}

impl std::fmt::Debug for ProjectSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectSession")
            .field("project_id", &self.project_id)
            .field("pending", &self.tracker.pending_changes())
            .field("state_dir", &self.store.dir())
            .finish()
    }
}

impl ProjectSession {
    /// Open `project_id`, restoring the graph and pending changes saved for
    /// it. Without saved state the graph starts empty.
    pub async fn open(
        config: &ClientConfig,
        remote: Arc<dyn RemoteClient>,
        project_id: impl Into<ProjectId>,
    ) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(Error::MissingProjectId.into());
        }

        let tracker = Arc::new(ChangeTracker::new());
        let graph = Arc::new(InMemoryGraph::new(tracker.clone()));
        let scheduler = SyncScheduler::new(tracker.clone(), graph.clone())
            .with_remote(remote.clone())
            .with_project(project_id.clone())
            .with_max_batch_size(config.batch_size);

        let session = Self {
            project_id,
            tracker,
            graph,
            scheduler: Arc::new(scheduler),
            remote,
            store: StateStore::new(&config.state_dir),
            flush_interval: config.flush_interval,
            auto_flush: Mutex::new(Vec::new()),
        };

        session.load().await?;
        tracing::info!(
            project_id = %session.project_id,
            pending = session.tracker.pending_changes().total(),
            "project session opened"
        );
        Ok(session)
    }

    /// Open `project_id` against the HTTP server named in `config`.
    pub async fn connect(config: &ClientConfig, project_id: impl Into<ProjectId>) -> Result<Self> {
        let remote = Arc::new(HttpRemoteClient::from_config(config)?);
        Self::open(config, remote, project_id).await
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn graph(&self) -> &Arc<InMemoryGraph> {
        &self.graph
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    /// Auto-flush period from the configuration.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn status(&self) -> SyncStatus {
        self.scheduler.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.scheduler.subscribe_status()
    }

    /// Wait until nothing is pending, or `timeout` passes.
    ///
    /// Returns whether everything was synced in time.
    pub async fn wait_until_synced(&self, timeout: Duration) -> bool {
        let mut pending = self.tracker.subscribe();
        let waited = tokio::time::timeout(timeout, pending.wait_for(|p| p.is_empty())).await;
        waited.is_ok_and(|r| r.is_ok())
    }

    /// Replace the local graph with the remote copy.
    ///
    /// Pending changes survive: locally deleted ids stay deleted and locally
    /// edited records keep their local payload until they are flushed.
    pub async fn load_from_remote(&self) -> Result<()> {
        let graph = self.remote.fetch_project(&self.project_id).await?;
        let (nodes, edges) = (graph.nodes.len(), graph.edges.len());

        self.graph.rebase_onto(graph);
        self.save().await?;

        tracing::info!(
            project_id = %self.project_id,
            nodes,
            edges,
            pending = self.tracker.pending_changes().total(),
            "project loaded from remote"
        );
        Ok(())
    }

    /// Run one flush round and save what is left pending.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let outcome = self.scheduler.flush().await?;
        if !outcome.is_busy() {
            self.save().await?;
        }
        Ok(outcome)
    }

    /// Save the graph and pending changes to the state directory.
    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.graph.capture(&self.project_id)).await?;
        Ok(())
    }

    /// Replace the graph and pending changes with the saved ones, if any.
    ///
    /// Returns whether saved state was found.
    pub async fn load(&self) -> Result<bool> {
        match self.store.load(&self.project_id).await? {
            Some(saved) => {
                self.graph.restore(&self.project_id, saved)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flush every `interval` while anything is pending.
    ///
    /// Must be called inside a tokio runtime. The loop runs until the
    /// returned handle is stopped or the session is closed.
    pub fn spawn_auto_flush(&self, interval: Duration) -> AutoFlushHandle {
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(auto_flush_loop(
            self.scheduler.clone(),
            self.graph.clone(),
            self.store.clone(),
            self.project_id.clone(),
            interval,
            stop.clone(),
        ));

        let control = LoopControl {
            stop,
            task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        };
        self.auto_flush.lock().push(control.clone());

        tracing::debug!(project_id = %self.project_id, ?interval, "auto-flush started");
        AutoFlushHandle { control }
    }

    /// Stop auto-flush, make a last flush attempt and save.
    pub async fn close(self) -> Result<()> {
        // Loops finish their current round before the last flush starts
        let loops: Vec<LoopControl> = self.auto_flush.lock().drain(..).collect();
        for control in loops {
            control.shutdown().await;
        }

        if self.tracker.has_pending() {
            match self.scheduler.flush().await {
                Ok(outcome) => {
                    if let Some(report) = outcome.report() {
                        if !report.is_clean() {
                            tracing::warn!(
                                project_id = %self.project_id,
                                failed = report.failed(),
                                "closing with changes still pending"
                            );
                        }
                    }
                }
                Err(e) => tracing::warn!(project_id = %self.project_id, "final flush failed: {}", e),
            }
        }

        self.save().await?;
        tracing::info!(project_id = %self.project_id, "project session closed");
        Ok(())
    }
}

/// Stop signal and task of one auto-flush loop, shared by the session and
/// the loop's handle. Every caller of `shutdown` returns only after the
/// task has ended.
#[derive(Debug, Clone)]
struct LoopControl {
    stop: Arc<Notify>,
    task: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl LoopControl {
    async fn shutdown(&self) {
        self.stop.notify_one();
        let mut slot = self.task.lock().await;
        if let Some(task) = slot.take() {
            if let Err(e) = task.await {
                tracing::warn!("auto-flush task ended abnormally: {}", e);
            }
        }
    }
}

/// Handle to a running auto-flush loop.
#[derive(Debug)]
pub struct AutoFlushHandle {
    control: LoopControl,
}

impl AutoFlushHandle {
    /// Stop the loop and wait for it to finish its current round.
    pub async fn stop(self) {
        self.control.shutdown().await;
    }

    pub fn is_finished(&self) -> bool {
        // Locked means another caller is stopping it
        self.control
            .task
            .try_lock()
            .is_ok_and(|slot| slot.as_ref().map_or(true, JoinHandle::is_finished))
    }
}

async fn auto_flush_loop(
    scheduler: Arc<SyncScheduler>,
    graph: Arc<InMemoryGraph>,
    store: StateStore,
    project_id: ProjectId,
    interval: Duration,
    stop: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = ticker.tick() => {
                if !scheduler.tracker().has_pending() {
                    continue;
                }
                match scheduler.flush().await {
                    Ok(FlushOutcome::Busy) => {}
                    Ok(FlushOutcome::Completed(_)) => {
                        if let Err(e) = store.save(&graph.capture(&project_id)).await {
                            tracing::warn!(%project_id, "saving pending changes failed: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!(%project_id, "auto-flush stopped: {}", e);
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(%project_id, "auto-flush stopped");
}
