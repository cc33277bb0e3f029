//! Analytics aggregation over the time-series store.
//!
//! Turns raw readings into the latest-value summary, the day-bucketed
//! history with correlation extraction, the map overlays and the forecast
//! placeholder. Everything here is read-only against the store; missing
//! data degrades to `null` values or a no-data sentinel, never to an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::cache::Clock;
use crate::models::{
    City, CitySummary, CorrelationPairs, ForecastPayload, HeatPoint, HistoryPayload,
    MetricSample, OverlaysPayload, Sensor, WindVector,
};
use crate::store::TimeSeriesStore;

// ---

/// Heatmap radius for an air sensor whose `meta.aqi` does not parse.
const BASE_RADIUS_M: f64 = 500.0;
/// Wind direction substituted when `meta.wind_dir_deg` is missing or malformed.
const DEFAULT_WIND_DIR_DEG: f64 = 45.0;
/// Wind speed substituted when `meta.wind_speed` is missing or malformed.
const DEFAULT_WIND_SPEED: f64 = 2.0;

/// Requested history window: a day count resolved against the clock, or an
/// explicit half-open instant range.
#[derive(Debug, Clone, Copy)]
pub enum HistoryRange {
    Days(u32),
    Between(DateTime<Utc>, DateTime<Utc>),
}

// ---

/// Read-side analytics over an injected [`TimeSeriesStore`].
pub struct Aggregator {
    // ---
    store: Arc<dyn TimeSeriesStore>,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn TimeSeriesStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Latest AQI and congestion per city.
    ///
    /// `last_update` is the max of the latest air/traffic timestamps that
    /// exist for the city; a city with neither kind of reading gets `null`
    /// for all three fields. A latest reading whose metric value is `null`
    /// still contributes its timestamp.
    pub async fn compute_summary(&self) -> Result<Vec<CitySummary>> {
        // ---
        let cities = self.store.cities().await?;
        let air: HashMap<i32, _> = self
            .store
            .latest_air_by_city()
            .await?
            .into_iter()
            .map(|m| (m.city_id, m))
            .collect();
        let traffic: HashMap<i32, _> = self
            .store
            .latest_traffic_by_city()
            .await?
            .into_iter()
            .map(|m| (m.city_id, m))
            .collect();

        Ok(cities
            .into_iter()
            .map(|city| {
                let latest_air = air.get(&city.id);
                let latest_traffic = traffic.get(&city.id);
                let last_update = match (latest_air, latest_traffic) {
                    (Some(a), Some(t)) => Some(a.timestamp.max(t.timestamp)),
                    (Some(a), None) => Some(a.timestamp),
                    (None, Some(t)) => Some(t.timestamp),
                    (None, None) => None,
                };
                CitySummary {
                    city: city.name,
                    aqi: latest_air.and_then(|m| m.value),
                    traffic: latest_traffic.and_then(|m| m.value),
                    last_update,
                }
            })
            .collect())
    }

    /// Day-bucketed AQI/congestion series with correlation pairs.
    ///
    /// Returns `None` (the no-data sentinel) for an empty or inverted range
    /// and when the store has no cities; callers substitute
    /// [`mock_history`] instead of retrying the query.
    pub async fn build_history(&self, range: HistoryRange) -> Result<Option<HistoryPayload>> {
        // ---
        let (start, end) = match range {
            HistoryRange::Days(days) => {
                let end = self.clock.now();
                (end - chrono::Duration::days(i64::from(days)), end)
            }
            HistoryRange::Between(start, end) => (start, end),
        };
        if end <= start {
            return Ok(None);
        }

        let cities = self.store.cities().await?;
        if cities.is_empty() {
            return Ok(None);
        }

        let dates = day_buckets(start, end);
        let air = self.store.air_samples_between(start, end).await?;
        let traffic = self.store.traffic_samples_between(start, end).await?;

        let aqi = bucket_means(&cities, &dates, &air);
        let congestion = bucket_means(&cities, &dates, &traffic);
        let correlation = pair_correlation(&aqi, &congestion);

        Ok(Some(HistoryPayload {
            dates,
            aqi,
            congestion,
            correlation,
        }))
    }

    /// Forecast placeholder: replicates the city's latest summary values
    /// over the horizon. A `null` metric yields an empty series.
    pub async fn compute_forecast(&self, city_id: i32, horizon: u32) -> Result<ForecastPayload> {
        // ---
        let aqi = self
            .store
            .latest_air_by_city()
            .await?
            .into_iter()
            .find(|m| m.city_id == city_id)
            .and_then(|m| m.value);
        let congestion = self
            .store
            .latest_traffic_by_city()
            .await?
            .into_iter()
            .find(|m| m.city_id == city_id)
            .and_then(|m| m.value);

        let replicate = |value: Option<f64>| -> Vec<f64> {
            value.map(|v| vec![v; horizon as usize]).unwrap_or_default()
        };

        Ok(ForecastPayload {
            city_id,
            horizon,
            aqi_forecast: replicate(aqi),
            traffic_forecast: replicate(congestion),
        })
    }
}

// ---

/// UTC calendar dates whose day-start falls before `end`, beginning at the
/// day containing `start`.
fn day_buckets(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    // ---
    let mut dates = Vec::new();
    let mut day = start.date_naive();
    while day.and_time(NaiveTime::MIN).and_utc() < end {
        dates.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    dates
}

/// Per-city arithmetic mean of non-null sample values per day bucket.
///
/// Every city gets a series with one entry per date; a bucket with no
/// qualifying samples stays `None`.
fn bucket_means(
    cities: &[City],
    dates: &[NaiveDate],
    samples: &[MetricSample],
) -> BTreeMap<String, Vec<Option<f64>>> {
    // ---
    let index: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let mut sums: BTreeMap<String, Vec<(f64, u32)>> = cities
        .iter()
        .map(|c| (c.name.clone(), vec![(0.0, 0); dates.len()]))
        .collect();

    for sample in samples {
        let Some(value) = sample.value else { continue };
        let Some(&bucket) = index.get(&sample.timestamp.date_naive()) else {
            continue;
        };
        let Some(series) = sums.get_mut(&sample.city) else { continue };
        series[bucket].0 += value;
        series[bucket].1 += 1;
    }

    sums.into_iter()
        .map(|(city, series)| {
            let means = series
                .into_iter()
                .map(|(sum, n)| (n > 0).then(|| sum / f64::from(n)))
                .collect();
            (city, means)
        })
        .collect()
}

/// Walks each city's two series index-by-index and keeps the pair only when
/// both buckets are non-null, so the output vectors stay aligned.
fn pair_correlation(
    aqi: &BTreeMap<String, Vec<Option<f64>>>,
    congestion: &BTreeMap<String, Vec<Option<f64>>>,
) -> CorrelationPairs {
    // ---
    let mut pairs = CorrelationPairs {
        aqi: Vec::new(),
        congestion: Vec::new(),
    };
    for (city, aqi_series) in aqi {
        let Some(congestion_series) = congestion.get(city) else { continue };
        for (a, c) in aqi_series.iter().zip(congestion_series) {
            if let (Some(a), Some(c)) = (a, c) {
                pairs.aqi.push(*a);
                pairs.congestion.push(*c);
            }
        }
    }
    pairs
}

// ---

/// Map overlays from sensor metadata.
///
/// Sensors missing `lat` or `lng` are skipped entirely. Air sensors emit a
/// heatmap point; every located sensor emits a wind vector, falling back to
/// the default direction/speed when its `meta` fields do not parse.
pub fn build_overlays(sensors: &[Sensor]) -> OverlaysPayload {
    // ---
    let mut heatmap = Vec::new();
    let mut wind = Vec::new();

    for sensor in sensors {
        let meta = sensor.meta.as_ref();
        let (Some(lat), Some(lng)) = (meta_f64(meta, "lat"), meta_f64(meta, "lng")) else {
            continue;
        };

        if sensor.kind == "air" {
            let aqi = meta_f64(meta, "aqi");
            let radius_m = match aqi {
                Some(aqi) => BASE_RADIUS_M + (aqi / 200.0) * 400.0,
                None => BASE_RADIUS_M,
            };
            heatmap.push(HeatPoint {
                lat,
                lng,
                aqi,
                radius_m,
            });
        }

        let direction_deg = meta_f64(meta, "wind_dir_deg").unwrap_or(DEFAULT_WIND_DIR_DEG);
        let speed = meta_f64(meta, "wind_speed").unwrap_or(DEFAULT_WIND_SPEED);
        wind.push(wind_vector(lat, lng, direction_deg, speed));
    }

    OverlaysPayload { heatmap, wind }
}

/// Fixed-magnitude visual offset from the sensor position, not a physical
/// projection.
fn wind_vector(lat: f64, lng: f64, direction_deg: f64, speed: f64) -> WindVector {
    // ---
    let theta = direction_deg.to_radians();
    let scale = 0.005 * (speed / 3.0);
    WindVector {
        start: [lat, lng],
        end: [lat + scale * theta.cos(), lng + scale * theta.sin()],
        speed,
        direction_deg,
    }
}

/// Reads a numeric `meta` field, accepting JSON numbers and numeric strings.
fn meta_f64(meta: Option<&Value>, key: &str) -> Option<f64> {
    // ---
    match meta?.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---

/// Fallback history sample served when real aggregation signals no data:
/// seven days for the three valley cities with one correlation pair set.
pub fn mock_history() -> HistoryPayload {
    // ---
    let dates = (1..=7)
        .filter_map(|day| NaiveDate::from_ymd_opt(2025, 12, day))
        .collect();

    let series = |values: &[f64]| values.iter().copied().map(Some).collect::<Vec<_>>();

    let mut aqi = BTreeMap::new();
    aqi.insert(
        "Kathmandu".to_string(),
        series(&[160.0, 155.0, 170.0, 180.0, 165.0, 150.0, 158.0]),
    );
    aqi.insert(
        "Lalitpur".to_string(),
        series(&[140.0, 145.0, 150.0, 155.0, 150.0, 142.0, 148.0]),
    );
    aqi.insert(
        "Bhaktapur".to_string(),
        series(&[150.0, 152.0, 160.0, 168.0, 160.0, 155.0, 150.0]),
    );

    let mut congestion = BTreeMap::new();
    congestion.insert(
        "Kathmandu".to_string(),
        series(&[0.8, 0.78, 0.82, 0.85, 0.8, 0.76, 0.79]),
    );
    congestion.insert(
        "Lalitpur".to_string(),
        series(&[0.6, 0.62, 0.64, 0.66, 0.63, 0.59, 0.61]),
    );

    HistoryPayload {
        dates,
        aqi,
        congestion,
        correlation: CorrelationPairs {
            aqi: vec![140.0, 150.0, 160.0, 170.0, 180.0],
            congestion: vec![0.55, 0.6, 0.7, 0.8, 0.88],
        },
    }
}

/// Fallback overlay sample served when no sensor carries coordinates.
pub fn mock_overlays() -> OverlaysPayload {
    // ---
    OverlaysPayload {
        heatmap: vec![
            HeatPoint {
                lat: 27.7172,
                lng: 85.324,
                aqi: Some(160.0),
                radius_m: 820.0,
            },
            HeatPoint {
                lat: 27.6588,
                lng: 85.3247,
                aqi: Some(140.0),
                radius_m: 780.0,
            },
            HeatPoint {
                lat: 27.671,
                lng: 85.4298,
                aqi: Some(120.0),
                radius_m: 740.0,
            },
        ],
        wind: vec![
            wind_vector(27.7172, 85.324, 45.0, 2.0),
            wind_vector(27.671, 85.4298, 60.0, 3.5),
        ],
    }
}

// ---
