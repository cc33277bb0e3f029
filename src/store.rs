//! Time-series store capability.
//!
//! `TimeSeriesStore` is the query surface the analytics core consumes. It is
//! injected into the aggregator so tests can run against an in-memory fake;
//! `PgStore` is the PostgreSQL implementation used in production.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{City, LatestMetric, MetricSample, Sensor};

// ---

/// Read-only query surface over cities, sensors and their readings.
///
/// All range queries are half-open: `start <= timestamp < end`.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// All cities, in id order.
    async fn cities(&self) -> Result<Vec<City>>;

    /// All sensors, in id order.
    async fn sensors(&self) -> Result<Vec<Sensor>>;

    /// Newest air reading per city (value = `aqi`), one row per city that
    /// has any air reading. Ties on equal timestamps resolve to whichever
    /// row the backend returns first; no tie-break is defined.
    async fn latest_air_by_city(&self) -> Result<Vec<LatestMetric>>;

    /// Newest traffic reading per city (value = `congestion_index`).
    async fn latest_traffic_by_city(&self) -> Result<Vec<LatestMetric>>;

    /// Air readings in `[start, end)` joined to their owning city.
    async fn air_samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>>;

    /// Traffic readings in `[start, end)` joined to their owning city.
    async fn traffic_samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>>;
}

// ---

/// PostgreSQL-backed store.
///
/// The latest-per-city lookups are single batched `DISTINCT ON` queries
/// rather than one round trip per city.
#[derive(Clone)]
pub struct PgStore {
    // ---
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimeSeriesStore for PgStore {
    // ---
    async fn cities(&self) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, City>("SELECT id, name FROM cities ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn sensors(&self) -> Result<Vec<Sensor>> {
        let rows =
            sqlx::query_as::<_, Sensor>("SELECT id, city_id, type, meta FROM sensors ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn latest_air_by_city(&self) -> Result<Vec<LatestMetric>> {
        let rows = sqlx::query_as::<_, LatestMetric>(
            r#"
            SELECT DISTINCT ON (s.city_id)
                   s.city_id, r.aqi AS value, r.timestamp
            FROM air_quality_readings r
            JOIN sensors s ON s.id = r.sensor_id
            ORDER BY s.city_id, r.timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn latest_traffic_by_city(&self) -> Result<Vec<LatestMetric>> {
        let rows = sqlx::query_as::<_, LatestMetric>(
            r#"
            SELECT DISTINCT ON (s.city_id)
                   s.city_id, r.congestion_index AS value, r.timestamp
            FROM traffic_readings r
            JOIN sensors s ON s.id = r.sensor_id
            ORDER BY s.city_id, r.timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn air_samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>> {
        let rows = sqlx::query_as::<_, MetricSample>(
            r#"
            SELECT c.name AS city, r.timestamp, r.aqi AS value
            FROM air_quality_readings r
            JOIN sensors s ON s.id = r.sensor_id
            JOIN cities c ON c.id = s.city_id
            WHERE r.timestamp >= $1 AND r.timestamp < $2
            ORDER BY r.timestamp
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn traffic_samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>> {
        let rows = sqlx::query_as::<_, MetricSample>(
            r#"
            SELECT c.name AS city, r.timestamp, r.congestion_index AS value
            FROM traffic_readings r
            JOIN sensors s ON s.id = r.sensor_id
            JOIN cities c ON c.id = s.city_id
            WHERE r.timestamp >= $1 AND r.timestamp < $2
            ORDER BY r.timestamp
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ---
