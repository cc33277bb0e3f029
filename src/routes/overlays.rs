//! Map overlay endpoint.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/overlays", get(handler))
}

/// Handle `GET /overlays`.
///
/// AQI heatmap points and wind vectors derived from sensor metadata, served
/// through the cache (60s TTL). When no sensor carries coordinates the fixed
/// sample overlay is substituted.
async fn handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // ---
    match state.facade.overlays().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to build overlays: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to build overlays"),
            )
                .into_response()
        }
    }
}
