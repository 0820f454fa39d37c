//! # HTTP Server
//!
//! Wires the storage routes, CORS, request tracing and body limits into a
//! single Axum router.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::file_storage::{LocalBackend, StorageBackend, StorageResult};

use super::config::GatewayConfig;
use super::storage_routes::{fallback_handler, storage_routes, StorageState};

/// HTTP server for the file gateway
pub struct HttpServer {
    config: GatewayConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server over an arbitrary backend
    pub fn new(config: GatewayConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let router = Self::build_router(&config, backend);
        Self { config, router }
    }

    /// Create a server over the configured uploads directory, creating it if needed.
    pub async fn open(config: GatewayConfig) -> StorageResult<Self> {
        let backend = LocalBackend::open(config.uploads_dir.clone()).await?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &GatewayConfig, backend: Arc<dyn StorageBackend>) -> Router {
        let state = Arc::new(StorageState::new(config.clone(), backend));

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        storage_routes(state)
            .fallback(fallback_handler)
            .layer(DefaultBodyLimit::max(config.request_body_limit()))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;

        tracing::info!(
            addr = %listener.local_addr()?,
            domain = %self.config.base_url(),
            uploads_dir = %self.config.uploads_dir.display(),
            max_file_size = self.config.max_file_size,
            "file gateway listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("file gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
