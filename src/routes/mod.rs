use std::sync::Arc;

use axum::Router;

use crate::facade::CacheFacade;
use crate::store::TimeSeriesStore;

mod cities;
mod forecast;
mod health;
mod history;
mod overlays;
mod sensors;
mod simulate;
mod summary;

// ---

/// Shared state handed to every route: the caching facade in front of the
/// analytics core, plus the bare store for the endpoints that bypass it.
pub struct AppState {
    // ---
    pub facade: CacheFacade,
    pub store: Arc<dyn TimeSeriesStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    // ---
    Router::new()
        .merge(summary::router())
        .merge(sensors::router())
        .merge(history::router())
        .merge(overlays::router())
        .merge(forecast::router())
        .merge(simulate::router())
        .merge(cities::router())
        .merge(health::router())
        .with_state(state)
}
