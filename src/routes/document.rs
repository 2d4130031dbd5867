//! Document API endpoints
//!
//! Read-only HTTP views of the shared document. Editing goes through the
//! WebSocket session protocol.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::document::{DocumentSnapshot, Update};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::sync::HubStatus;

/// Create the document router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_document))
        .route("/updates", get(get_updates))
        .route("/status", get(get_status))
}

#[derive(Debug, Deserialize)]
pub struct UpdatesQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub updates: Vec<Update>,
    pub version: u64,
}

/// Current text and version
async fn get_document(State(state): State<AppState>) -> Json<DocumentSnapshot> {
    Json(state.hub().snapshot().await)
}

/// Updates after `since`, without waiting for new ones
async fn get_updates(
    State(state): State<AppState>,
    Query(query): Query<UpdatesQuery>,
) -> Result<Json<UpdatesResponse>> {
    let (updates, version) = state.hub().updates_since(query.since).await;

    if query.since > version {
        return Err(AppError::BadRequest(format!(
            "Version {} is ahead of the document (at {})",
            query.since, version
        )));
    }

    Ok(Json(UpdatesResponse { updates, version }))
}

/// Version, sessions and parked pulls
async fn get_status(State(state): State<AppState>) -> Json<HubStatus> {
    Json(state.hub().status().await)
}
