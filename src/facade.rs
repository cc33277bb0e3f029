//! Read-through caching facade over the aggregator and simulator.
//!
//! Every payload class has a versioned key and a fixed TTL; bumping the
//! embedded version token is the only cache-busting mechanism. Caching is
//! best-effort: a backend error on `get` is a miss, an error on `set` is
//! swallowed, and the request is always served from direct computation.
//! Concurrent misses for one key may redundantly recompute and re-set it;
//! writes are idempotent for a fixed key and time window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{self, Aggregator, HistoryRange};
use crate::cache::{Cache, Clock};
use crate::models::{
    CitySummary, ForecastPayload, HistoryPayload, OverlaysPayload, Sensor, SimulationPayload,
};
use crate::simulate;
use crate::store::TimeSeriesStore;

// ---

const SUMMARY_KEY: &str = "summary:v1";
const SENSORS_KEY: &str = "sensors:v1";
const OVERLAYS_KEY: &str = "overlays:v1";

const SUMMARY_TTL: Duration = Duration::from_secs(30);
const FORECAST_TTL: Duration = Duration::from_secs(300);
const SENSORS_TTL: Duration = Duration::from_secs(300);
const HISTORY_TTL: Duration = Duration::from_secs(300);
const OVERLAYS_TTL: Duration = Duration::from_secs(60);
/// Simulation output is a pure function of the summary, so it shares the
/// summary's staleness window.
const SIMULATE_TTL: Duration = Duration::from_secs(30);

// ---

/// Serves every analytics payload through the cache.
pub struct CacheFacade {
    // ---
    agg: Aggregator,
    store: Arc<dyn TimeSeriesStore>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl CacheFacade {
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            agg: Aggregator::new(store.clone(), clock.clone()),
            store,
            cache,
            clock,
        }
    }

    /// Latest per-city summary, 30s staleness window.
    pub async fn summary(&self) -> Result<Vec<CitySummary>> {
        self.read_through(SUMMARY_KEY.to_string(), SUMMARY_TTL, || async move {
            self.agg.compute_summary().await
        })
        .await
    }

    /// Sensor list as stored, 300s staleness window.
    pub async fn sensors(&self) -> Result<Vec<Sensor>> {
        self.read_through(SENSORS_KEY.to_string(), SENSORS_TTL, || async move {
            self.store.sensors().await
        })
        .await
    }

    /// Day-bucketed history; the fallback sample is substituted before
    /// caching, so a no-data window serves the mock consistently for the
    /// whole TTL. Keys depend only on the resolved day count or range, so
    /// equal requests share an entry.
    pub async fn history(&self, range: HistoryRange) -> Result<HistoryPayload> {
        let key = match range {
            HistoryRange::Days(days) => format!("history:v1:days:{days}"),
            HistoryRange::Between(start, end) => {
                format!("history:v1:{}:{}", start.to_rfc3339(), end.to_rfc3339())
            }
        };
        self.read_through(key, HISTORY_TTL, || async move {
            Ok(self
                .agg
                .build_history(range)
                .await?
                .unwrap_or_else(aggregate::mock_history))
        })
        .await
    }

    /// Map overlays, 60s staleness window; the fallback sample stands in
    /// when no sensor carries coordinates.
    pub async fn overlays(&self) -> Result<OverlaysPayload> {
        self.read_through(OVERLAYS_KEY.to_string(), OVERLAYS_TTL, || async move {
            let sensors = self.store.sensors().await?;
            let overlays = aggregate::build_overlays(&sensors);
            if overlays.heatmap.is_empty() && overlays.wind.is_empty() {
                Ok(aggregate::mock_overlays())
            } else {
                Ok(overlays)
            }
        })
        .await
    }

    /// Forecast placeholder, keyed per city and horizon.
    pub async fn forecast(&self, city_id: i32, horizon: u32) -> Result<ForecastPayload> {
        let key = format!("forecast:v1:{city_id}:{horizon}");
        self.read_through(key, FORECAST_TTL, || async move {
            self.agg.compute_forecast(city_id, horizon).await
        })
        .await
    }

    /// Policy scenario projection, keyed by the post-clamp inputs so
    /// out-of-range requests share the clamped entry.
    pub async fn simulate(
        &self,
        reduction_pct: f64,
        odd_even_enabled: bool,
    ) -> Result<SimulationPayload> {
        let reduction_pct = reduction_pct.clamp(0.0, 100.0);
        let key = format!("simulate:v1:{reduction_pct}:{odd_even_enabled}");
        self.read_through(key, SIMULATE_TTL, || async move {
            let summary = self.agg.compute_summary().await?;
            Ok(simulate::run(
                &summary,
                reduction_pct,
                odd_even_enabled,
                self.clock.now(),
            ))
        })
        .await
    }

    // ---

    /// Read-through contract shared by every payload class.
    ///
    /// A well-formed hit is returned verbatim without recomputation. A miss,
    /// a backend `get` error and an undecodable hit all fall through to
    /// `compute`; `set` failures leave the fresh value as the response.
    async fn read_through<T, F, Fut>(&self, key: String, ttl: Duration, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // ---
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(payload) => {
                    debug!(key = %key, "cache hit");
                    return Ok(payload);
                }
                Err(err) => debug!(key = %key, error = %err, "cached payload undecodable"),
            },
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(err) => debug!(key = %key, error = %err, "cache get failed"),
        }

        let fresh = compute().await?;

        match serde_json::to_vec(&fresh) {
            Ok(bytes) => {
                if let Err(err) = self.cache.set(&key, bytes, ttl).await {
                    debug!(key = %key, error = %err, "cache set failed");
                }
            }
            Err(err) => debug!(key = %key, error = %err, "payload serialization failed"),
        }

        Ok(fresh)
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::cache::manual::ManualClock;
    use crate::cache::MemoryCache;
    use crate::models::{City, LatestMetric, MetricSample};
    use crate::store::fake::FakeStore;

    /// Cache double whose backend is down: every call errors.
    struct FailingCache;

    #[async_trait]
    impl Cache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(anyhow!("cache backend unreachable"))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
            Err(anyhow!("cache backend unreachable"))
        }
    }

    fn seeded_store() -> FakeStore {
        let t = Utc.with_ymd_and_hms(2025, 6, 9, 8, 0, 0).unwrap();
        FakeStore {
            cities: vec![City {
                id: 1,
                name: "Kathmandu".to_string(),
            }],
            latest_air: vec![LatestMetric {
                city_id: 1,
                value: Some(160.0),
                timestamp: t,
            }],
            latest_traffic: vec![LatestMetric {
                city_id: 1,
                value: Some(0.8),
                timestamp: t,
            }],
            air_samples: vec![MetricSample {
                city: "Kathmandu".to_string(),
                timestamp: t,
                value: Some(160.0),
            }],
            ..FakeStore::default()
        }
    }

    fn facade(store: FakeStore) -> (Arc<FakeStore>, Arc<ManualClock>, CacheFacade) {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap(),
        ));
        let cache = Arc::new(MemoryCache::new(clock.clone()));
        let facade = CacheFacade::new(store.clone(), cache, clock.clone());
        (store, clock, facade)
    }

    #[tokio::test]
    async fn summary_hit_is_served_without_recomputation() {
        // ---
        let (store, _clock, facade) = facade(seeded_store());

        let first = facade.summary().await.unwrap();
        let queries_after_first = store.call_count();

        let second = facade.summary().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.call_count(), queries_after_first);
    }

    #[tokio::test]
    async fn summary_is_recomputed_once_its_ttl_has_passed() {
        // ---
        let (store, clock, facade) = facade(seeded_store());

        facade.summary().await.unwrap();
        let queries_after_first = store.call_count();

        clock.advance(Duration::from_secs(30));
        facade.summary().await.unwrap();

        assert_eq!(store.call_count(), queries_after_first * 2);
    }

    #[tokio::test]
    async fn broken_cache_backend_degrades_to_direct_computation() {
        // ---
        let store = Arc::new(seeded_store());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap(),
        ));
        let facade = CacheFacade::new(store.clone(), Arc::new(FailingCache), clock);

        // Both get and set error; both calls still succeed by computing.
        let first = facade.summary().await.unwrap();
        let queries_after_first = store.call_count();
        let second = facade.summary().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.call_count(), queries_after_first * 2);
        assert_eq!(first[0].aqi, Some(160.0));
    }

    #[tokio::test]
    async fn undecodable_cached_bytes_are_treated_as_a_miss() {
        // ---
        let store = Arc::new(seeded_store());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap(),
        ));
        let cache = Arc::new(MemoryCache::new(clock.clone()));
        cache
            .set("summary:v1", b"not json".to_vec(), Duration::from_secs(300))
            .await
            .unwrap();

        let facade = CacheFacade::new(store.clone(), cache, clock);
        let summary = facade.summary().await.unwrap();

        assert_eq!(summary[0].city, "Kathmandu");
        assert!(store.call_count() > 0);
    }

    #[tokio::test]
    async fn history_requests_with_equal_day_counts_share_one_entry() {
        // ---
        let (store, _clock, facade) = facade(seeded_store());

        facade.history(HistoryRange::Days(7)).await.unwrap();
        let queries_after_first = store.call_count();

        // Same resolved day count: hit, no further store traffic.
        facade.history(HistoryRange::Days(7)).await.unwrap();
        assert_eq!(store.call_count(), queries_after_first);

        // Different day count: separate key, recomputed.
        facade.history(HistoryRange::Days(3)).await.unwrap();
        assert!(store.call_count() > queries_after_first);
    }

    #[tokio::test]
    async fn history_no_data_serves_and_caches_the_mock_payload() {
        // ---
        let (store, _clock, facade) = facade(FakeStore::default());

        let payload = facade.history(HistoryRange::Days(7)).await.unwrap();
        assert_eq!(payload, aggregate::mock_history());

        // The mock was cached; a repeat does not re-query the store.
        let queries_after_first = store.call_count();
        facade.history(HistoryRange::Days(7)).await.unwrap();
        assert_eq!(store.call_count(), queries_after_first);
    }

    #[tokio::test]
    async fn overlays_fall_back_to_the_sample_when_no_sensor_has_coordinates() {
        // ---
        let store = FakeStore {
            sensors: vec![Sensor {
                id: 1,
                city_id: 1,
                kind: "air".to_string(),
                meta: Some(json!({ "aqi": 140.0 })),
            }],
            ..FakeStore::default()
        };
        let (_store, _clock, facade) = facade(store);

        let overlays = facade.overlays().await.unwrap();
        assert_eq!(overlays, aggregate::mock_overlays());
    }

    #[tokio::test]
    async fn overlays_use_real_sensor_geometry_when_present() {
        // ---
        let store = FakeStore {
            sensors: vec![Sensor {
                id: 1,
                city_id: 1,
                kind: "air".to_string(),
                meta: Some(json!({ "lat": 27.7, "lng": 85.3, "aqi": 160.0 })),
            }],
            ..FakeStore::default()
        };
        let (_store, _clock, facade) = facade(store);

        let overlays = facade.overlays().await.unwrap();
        assert_eq!(overlays.heatmap.len(), 1);
        assert_eq!(overlays.wind.len(), 1);
        assert_eq!(overlays.heatmap[0].lat, 27.7);
    }

    #[tokio::test]
    async fn forecast_is_cached_per_city_and_horizon() {
        // ---
        let (store, _clock, facade) = facade(seeded_store());

        let first = facade.forecast(1, 24).await.unwrap();
        let queries_after_first = store.call_count();

        let second = facade.forecast(1, 24).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.call_count(), queries_after_first);

        let other = facade.forecast(1, 6).await.unwrap();
        assert_eq!(other.aqi_forecast.len(), 6);
        assert!(store.call_count() > queries_after_first);
    }

    #[tokio::test]
    async fn simulate_clamps_inputs_into_a_shared_cache_entry() {
        // ---
        let (store, _clock, facade) = facade(seeded_store());

        let clamped = facade.simulate(150.0, false).await.unwrap();
        let queries_after_first = store.call_count();

        // 150% clamps to 100%, so this is a hit on the same key.
        let full = facade.simulate(100.0, false).await.unwrap();

        assert_eq!(clamped, full);
        assert_eq!(clamped.inputs.reduction_pct, 100.0);
        assert_eq!(store.call_count(), queries_after_first);
    }
}
