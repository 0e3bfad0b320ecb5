//! JsonLog server implementation

pub mod http;

use crate::config::ServerConfig;
use crate::stream::StreamRegistry;
use crate::{JsonLogError, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main JsonLog server that coordinates all components
pub struct LogServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
    shutdown_token: CancellationToken,
}

impl LogServer {
    /// Create a new JsonLog server, opening every configured stream
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(StreamRegistry::from_config(&config)?);
        if registry.is_empty() {
            warn!("no streams registered, every request will be rejected");
        }

        Ok(Self {
            config,
            registry,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Routing table shared with the HTTP layer
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Ingestion router bound to this server's streams
    pub fn router(&self) -> Router {
        http::router(Arc::clone(&self.registry))
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.config.server.bind)
            .await
            .map_err(|e| {
                JsonLogError::Server(format!(
                    "Failed to bind {}: {}",
                    self.config.server.bind, e
                ))
            })
    }

    /// Bind and serve until [`LogServer::shutdown`] is called
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`LogServer::shutdown`] is called
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, streams = self.registry.len(), "accepting records");

        let shutdown_token = self.shutdown_token.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
            .await
            .map_err(|e| JsonLogError::Server(format!("HTTP server failed: {}", e)))
    }

    /// Stop accepting requests
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Stop accepting requests, then drain and close every stream
    pub async fn close(&self) {
        self.shutdown();
        self.registry.close_all().await;
    }
}
