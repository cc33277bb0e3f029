//! Policy scenario simulation endpoint.

use std::sync::Arc;

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/simulate", get(handler))
}

#[derive(Debug, Deserialize)]
struct SimulateQuery {
    /// Share of vehicles removed, percent. Clamped to `[0, 100]`.
    reduction_pct: Option<f64>,
    /// Whether odd-even plate restrictions are in force.
    odd_even: Option<bool>,
}

/// Handle `GET /simulate`.
///
/// Projects AQI/congestion under the requested policy against the current
/// summary baseline. Deterministic for a given summary; cached on the
/// post-clamp inputs (30s TTL).
async fn handler(
    Query(params): Query<SimulateQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // ---
    let reduction_pct = params.reduction_pct.unwrap_or(0.0);
    let odd_even = params.odd_even.unwrap_or(false);

    match state.facade.simulate(reduction_pct, odd_even).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to run simulation: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to run simulation"),
            )
                .into_response()
        }
    }
}
