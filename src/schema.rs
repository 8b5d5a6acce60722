//! Database schema management for `watersafe-tds`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when a database is configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_data` table for ingested readings and the
/// `community_reports` table for user-submitted issues. Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id              BIGSERIAL PRIMARY KEY,
            location_label  TEXT             NOT NULL DEFAULT 'Sensor',
            tds_value       DOUBLE PRECISION NOT NULL CHECK (tds_value >= 0),
            turbidity       DOUBLE PRECISION,
            temperature     DOUBLE PRECISION,
            location_lat    DOUBLE PRECISION NOT NULL DEFAULT 0,
            location_lng    DOUBLE PRECISION NOT NULL DEFAULT 0,
            timestamp       TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS community_reports (
            id              BIGSERIAL PRIMARY KEY,
            issue_type      TEXT             NOT NULL,
            description     TEXT             NOT NULL,
            location_lat    DOUBLE PRECISION NOT NULL DEFAULT 0,
            location_lng    DOUBLE PRECISION NOT NULL DEFAULT 0,
            timestamp       TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Listing endpoints always read newest-first
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
            ON sensor_data (timestamp DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_community_reports_timestamp
            ON community_reports (timestamp DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
