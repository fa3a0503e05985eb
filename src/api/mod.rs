//! HTTP transport for the artifact pipeline
//!
//! Maps routes and query parameters onto pipeline operations and pipeline
//! errors onto `{ "error": kind, "detail": message }` responses.

use anyhow::Result;
use tracing::info;

use crate::config::Config;

pub mod handlers;
pub mod models;
pub mod server;

pub use models::{ApiError, ErrorBody};
pub use server::{build_router, AppState};

/// API server bound to the configured host and port
#[derive(Debug)]
pub struct ApiServer {
    config: Config,
}

impl ApiServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Serve until the listener fails
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on {}:{}", self.config.server.host, self.config.server.port);
        server::start_http_server(self.config).await
    }
}
