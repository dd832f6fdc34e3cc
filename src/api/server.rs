//! API Server
//!
//! HTTP + WebSocket front for the draw engine, with graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ApiConfig;
use crate::engine::DrawEngine;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
    config: ApiConfig,
    engine: DrawEngine,
}

impl ApiServer {
    pub fn new(config: ApiConfig, engine: DrawEngine) -> Self {
        Self { config, engine }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = create_app(&self.config, self.engine.clone());
        let addr = self.socket_addr()?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Bingo API listening on http://{}", addr);
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }
}

/// Router with the full middleware stack
pub fn create_app(config: &ApiConfig, engine: DrawEngine) -> axum::Router {
    let state = Arc::new(AppState {
        engine,
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    create_router(state)
        // Request ID first so every later layer sees it
        .layer(axum::middleware::from_fn(request_id_middleware))
        // CORS before timeout to answer preflight
        .layer(create_cors_layer(config.allowed_origins.clone()))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
