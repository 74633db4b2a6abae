//! # MindSync Client
//!
//! Client-side adapters around [`mindsync_engine`]:
//!
//! - [`HttpRemoteClient`]: the engine's `RemoteClient` over HTTP, talking to
//!   `mindsync-server`
//! - [`InMemoryGraph`]: the local graph; every mutation marks the tracker
//! - [`StateStore`]: graph and pending changes saved as one JSON file per
//!   project
//! - [`ProjectSession`]: open, flush, auto-flush, save and close a project
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mindsync_client::{ClientConfig, ProjectSession};
//! use mindsync_engine::NodeRecord;
//! use serde_json::json;
//!
//! # async fn run() -> mindsync_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let session = ProjectSession::connect(&config, "project-1").await?;
//! session.load_from_remote().await?;
//!
//! session
//!     .graph()
//!     .upsert_node(NodeRecord::new("n1", json!({"label": "Central idea"})));
//!
//! let auto_flush = session.spawn_auto_flush(config.flush_interval);
//! // ... edit the graph ...
//! auto_flush.stop().await;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod http;
pub mod persist;
pub mod session;

pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use graph::InMemoryGraph;
pub use http::HttpRemoteClient;
pub use persist::{SavedProject, StateStore};
pub use session::{AutoFlushHandle, ProjectSession};
