use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_check, ingest_reading, link_channel, recent_readings, register_device, stats, AppState,
};
use super::ws::ws_handler;
use crate::alerts::{Notifier, NotifyTarget};
use crate::hub::FanoutHub;
use crate::ingest::Pipeline;
use crate::registry::DeviceRegistry;
use crate::store::MemoryStore;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Process-wide alert threshold; devices may override per record.
    pub default_threshold: f64,
    pub notify_target: NotifyTarget,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_threshold: 400.0,
            notify_target: NotifyTarget::Log,
        }
    }
}

/// Wire up the registry, store, hub, notifier and pipeline.
pub fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let registry = Arc::new(DeviceRegistry::new(config.default_threshold));
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(FanoutHub::new());
    let notifier = Arc::new(Notifier::new(config.notify_target.clone()));

    let pipeline = Pipeline::new(
        Arc::clone(&registry),
        Arc::clone(&store) as Arc<dyn crate::store::ReadingsStore>,
        Arc::clone(&hub),
        Arc::clone(&notifier),
    );

    Arc::new(AppState {
        registry,
        store,
        hub,
        notifier,
        pipeline,
    })
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Device lifecycle
        .route("/api/register", post(register_device))
        .route("/api/link", post(link_channel))
        // Readings
        .route("/api/readings", post(ingest_reading))
        .route("/api/readings", get(recent_readings))
        // Live subscriptions
        .route("/ws", get(ws_handler))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Plume server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Plume server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received");
}
