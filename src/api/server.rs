//! API Server
//!
//! Serves the REST router until shutdown is requested.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::info;

use super::rest::{AppState, RestRouter};

/// Default REST bind address
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8090";

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Handle that triggers graceful shutdown when sent to
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.rest_addr;
        let app = RestRouter::new(self.state.clone()).build();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;
        info!("REST API listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }
}
