//! Sensor inventory endpoint.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/sensors", get(handler))
}

/// Handle `GET /sensors`: all sensors with their city, type and meta bag.
async fn handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // ---
    match state.facade.sensors().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to list sensors: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to list sensors"),
            )
                .into_response()
        }
    }
}
