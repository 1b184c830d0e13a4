//! obstore library -- object storage gateway.
//!
//! This crate provides the core components for running an HTTP gateway in
//! front of dynamically discovered object-storage backend nodes: container
//! runtime discovery, per-node connection and bucket preparation,
//! deterministic object routing, and the once-only initialization tying
//! them together.

use std::sync::Arc;

pub mod backend;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod init;
pub mod metrics;
pub mod router;
pub mod server;

use crate::config::Config;
use crate::init::RouterCell;
use crate::router::ObjectRouter;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Lazily-initialized backend router.
    pub router: RouterCell,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            router: RouterCell::new(),
        }
    }

    /// Get the backend router, running the discovery pipeline on first call.
    ///
    /// Both the startup background task and every HTTP handler funnel
    /// through here; the pipeline executes at most once per process.
    pub async fn get_or_init_router(&self) -> anyhow::Result<Arc<ObjectRouter>> {
        self.router
            .get_or_try_init(|| init::initialize(&self.config))
            .await
    }
}
