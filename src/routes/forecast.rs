//! Forecast endpoint (placeholder model).

use std::sync::Arc;

use axum::{
    extract::Path, extract::Query, extract::State, http::StatusCode, response::IntoResponse,
    routing::get, Json, Router,
};
use serde::Deserialize;
use tracing::error;

use super::AppState;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/forecast/{city_id}", get(handler))
}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    /// Forecast horizon in hours (default: 24).
    horizon: Option<u32>,
}

/// Handle `GET /forecast/{city_id}`.
///
/// Placeholder until a real model lands: replicates the city's latest
/// values over the horizon, served through the cache (300s TTL). A metric
/// with no reading yields an empty series.
async fn handler(
    Path(city_id): Path<i32>,
    Query(params): Query<ForecastQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // ---
    let horizon = params.horizon.unwrap_or(24);

    match state.facade.forecast(city_id, horizon).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to build forecast for city {}: {}", city_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to build forecast"),
            )
                .into_response()
        }
    }
}
