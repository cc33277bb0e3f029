//! Historical series endpoint.

use std::sync::Arc;

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;

use super::AppState;
use crate::aggregate::HistoryRange;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/history/summary", get(handler))
}

/// Query parameters for the history window.
///
/// An explicit `[start, end)` pair wins over `days`; with neither given the
/// window defaults to the last 7 days.
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    days: Option<u32>,
    /// RFC 3339 instant, e.g. `2025-06-01T00:00:00Z`.
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

/// Handle `GET /history/summary`.
///
/// Day-bucketed AQI/congestion series per city plus correlation pairs,
/// served through the cache (300s TTL, keyed by the resolved window). An
/// empty window degrades to the fixed sample payload, never to an error.
async fn handler(
    Query(params): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // ---
    let range = match (params.start, params.end) {
        (Some(start), Some(end)) => HistoryRange::Between(start, end),
        _ => HistoryRange::Days(params.days.unwrap_or(7)),
    };

    match state.facade.history(range).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("Failed to build history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to build history"),
            )
                .into_response()
        }
    }
}
