//! Route modules for the collab server

pub mod document;
pub mod health;
pub mod socket;

use axum::{http::Uri, routing::get, Router};

use crate::error::AppError;
use crate::state::AppState;

/// Build the application router
///
/// The WebSocket endpoint is mounted at the configured socket path.
pub fn app(state: AppState) -> Router {
    let socket_path = state.config().server.socket_path.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .route(&socket_path, get(socket::upgrade))
        .nest("/api/v1/document", document::router())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
