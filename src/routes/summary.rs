//! Latest per-city summary endpoint.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/summary", get(handler))
}

/// Handle `GET /summary`.
///
/// Serves the latest AQI/congestion per city through the cache (30s TTL).
/// Cities without readings report `null` metrics, never zeros.
async fn handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // ---
    match state.facade.summary().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to compute summary: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to compute summary"),
            )
                .into_response()
        }
    }
}
