//! Data models for the analytics service.
//!
//! Three groups:
//! - store entities (`City`, `Sensor`) read from PostgreSQL
//! - query projections (`LatestMetric`, `MetricSample`) produced by the
//!   aggregation queries in `store`
//! - JSON payloads served by the API and cached by the facade

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---

/// A city owning zero or more sensors.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    // ---
    pub id: i32,
    pub name: String,
}

/// A sensor belonging to one city.
///
/// `meta` is a JSONB bag of weakly typed fields (`lat`, `lng`, `aqi`,
/// `wind_dir_deg`, `wind_speed`). It is the only source of overlay geometry;
/// a sensor without `lat`/`lng` in `meta` contributes nothing to overlays.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sensor {
    // ---
    pub id: i32,
    pub city_id: i32,
    /// Sensor kind: `"air"` or `"traffic"`.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub meta: Option<serde_json::Value>,
}

// ---

/// Newest reading for one city, from the grouped top-1-by-timestamp query.
///
/// `value` carries `aqi` for air readings and `congestion_index` for traffic
/// readings; the value is nullable independently of the row's timestamp.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LatestMetric {
    // ---
    pub city_id: i32,
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One reading row joined up to its owning city, used for day bucketing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricSample {
    // ---
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

// ---

/// Per-city entry of the `/summary` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySummary {
    // ---
    pub city: String,
    /// Latest AQI, or `null` when the city has no air reading.
    pub aqi: Option<f64>,
    /// Latest congestion index, or `null` when the city has no traffic reading.
    pub traffic: Option<f64>,
    /// Max of the two latest reading timestamps; `null` when neither exists.
    pub last_update: Option<DateTime<Utc>>,
}

/// The `/history/summary` payload.
///
/// Every series has exactly one entry per date, in date order. The two
/// correlation vectors are equal length and pairwise aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    // ---
    pub dates: Vec<NaiveDate>,
    pub aqi: BTreeMap<String, Vec<Option<f64>>>,
    pub congestion: BTreeMap<String, Vec<Option<f64>>>,
    pub correlation: CorrelationPairs,
}

/// Paired (aqi, congestion) day-bucket means where both were present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPairs {
    // ---
    pub aqi: Vec<f64>,
    pub congestion: Vec<f64>,
}

/// The `/overlays` payload for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaysPayload {
    // ---
    pub heatmap: Vec<HeatPoint>,
    pub wind: Vec<WindVector>,
}

/// Heatmap point derived from an air sensor with coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatPoint {
    // ---
    pub lat: f64,
    pub lng: f64,
    pub aqi: Option<f64>,
    pub radius_m: f64,
}

/// Wind vector derived from any sensor with coordinates.
///
/// `end` is a fixed-magnitude visual offset from `start`, not a physical
/// projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindVector {
    // ---
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub speed: f64,
    pub direction_deg: f64,
}

/// The `/forecast/{city_id}` placeholder payload: latest values replicated
/// over the horizon, pending a real model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPayload {
    // ---
    pub city_id: i32,
    pub horizon: u32,
    pub aqi_forecast: Vec<f64>,
    pub traffic_forecast: Vec<f64>,
}

// ---

/// The `/simulate` payload bundling inputs, baseline, projection and delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationPayload {
    // ---
    pub inputs: SimulationInputs,
    pub baseline: SimulationMetrics,
    pub scenario: SimulationMetrics,
    pub delta: SimulationMetrics,
    pub meta: SimulationMeta,
}

/// Post-clamp simulation inputs, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    // ---
    pub reduction_pct: f64,
    pub odd_even_enabled: bool,
}

/// One (aqi, congestion) metric pair; either side is `null` when no city
/// reports that metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    // ---
    pub aqi: Option<f64>,
    pub traffic_congestion_index: Option<f64>,
}

/// Simulation run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMeta {
    // ---
    pub generated_at: DateTime<Utc>,
    pub horizon_hours: u32,
}
