//! Database schema management for `urban-pulse`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the city/sensor tables and the two reading tables the analytics
/// queries read from. Readings are written by the ingestion pipeline, never
/// by this service. Safe to call on every startup; no-op if objects already
/// exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cities (
            id   SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Sensor positions are plain coordinates; overlay geometry comes from
    // the meta bag, not from these columns.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            id           SERIAL PRIMARY KEY,
            city_id      INTEGER NOT NULL REFERENCES cities (id),
            type         TEXT    NOT NULL,
            location_lat DOUBLE PRECISION,
            location_lng DOUBLE PRECISION,
            meta         JSONB
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS air_quality_readings (
            id        SERIAL PRIMARY KEY,
            sensor_id INTEGER     NOT NULL REFERENCES sensors (id),
            timestamp TIMESTAMPTZ NOT NULL,
            pm25      DOUBLE PRECISION,
            pm10      DOUBLE PRECISION,
            no2       DOUBLE PRECISION,
            o3        DOUBLE PRECISION,
            aqi       DOUBLE PRECISION,
            meta      JSONB
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS traffic_readings (
            id               SERIAL PRIMARY KEY,
            sensor_id        INTEGER     NOT NULL REFERENCES sensors (id),
            timestamp        TIMESTAMPTZ NOT NULL,
            speed            DOUBLE PRECISION,
            volume           DOUBLE PRECISION,
            congestion_index DOUBLE PRECISION,
            meta             JSONB
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for the per-city and per-range aggregation queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_city_id
            ON sensors (city_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_air_readings_sensor_ts
            ON air_quality_readings (sensor_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_traffic_readings_sensor_ts
            ON traffic_readings (sensor_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
