//! Collab Server
//!
//! Serves one shared text document to any number of editors over WebSocket.

use anyhow::Context;
use axum::http::HeaderValue;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collab_server::config::{Config, ServerConfig};
use collab_server::routes;
use collab_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "collab_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Collab Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Socket path: {}", config.server.socket_path);
    tracing::info!("Seed document: {} chars", config.document.seed.chars().count());

    let cors = cors_layer(&config.server)?;
    let (host, port) = (config.server.host.clone(), config.server.port);

    // Build router
    let app = routes::app(AppState::new(config))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    tracing::info!("Collab Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Build the CORS layer for the configured origin
fn cors_layer(server: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if server.cors_origin == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(&server.cors_origin)
        .with_context(|| format!("Invalid CORS origin {:?}", server.cors_origin))?;
    Ok(layer.allow_origin(origin))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
