//! City listing endpoint.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/cities", get(handler))
}

/// Handle `GET /cities`: all cities in id order, straight from the store.
async fn handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // ---
    match state.store.cities().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to list cities: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to list cities"),
            )
                .into_response()
        }
    }
}
