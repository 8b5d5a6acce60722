//! Persistence for ingested readings and community reports.
//!
//! Two backends implement the same traits: [`PgStore`] over a PostgreSQL
//! pool, and [`MemoryStore`] for running without a database and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::models::{CommunityReport, Coordinate, IssueType, NewReport, Reading};

// ---

/// Label stored for readings pushed by a sensor without a named location.
pub const SENSOR_LABEL: &str = "Sensor";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Store of ingested sensor readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Append a reading; the store stamps `id` and `timestamp`.
    async fn insert_reading(&self, tds: f64, at: Coordinate) -> Result<Reading, StoreError>;

    /// Most recent readings, newest first.
    async fn recent_readings(&self, limit: usize) -> Result<Vec<Reading>, StoreError>;

    async fn latest_reading(&self) -> Result<Option<Reading>, StoreError> {
        Ok(self.recent_readings(1).await?.into_iter().next())
    }
}

/// Store of community reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Append a report; the store stamps `id` and `timestamp`.
    async fn insert_report(&self, report: NewReport) -> Result<CommunityReport, StoreError>;

    /// Most recent reports, newest first.
    async fn recent_reports(&self, limit: usize) -> Result<Vec<CommunityReport>, StoreError>;
}

// ---

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Row shape of `community_reports`; `issue_type` is stored as text.
#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    issue_type: String,
    description: String,
    lat: f64,
    lng: f64,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ReportRow> for CommunityReport {
    type Error = StoreError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        // ---
        Ok(CommunityReport {
            id: row.id,
            issue_type: row.issue_type.parse().map_err(StoreError::Corrupt)?,
            description: row.description,
            lat: row.lat,
            lng: row.lng,
            timestamp: row.timestamp,
        })
    }
}

const READING_COLUMNS: &str = "id, location_label, tds_value AS tds, turbidity, temperature, \
     location_lat AS lat, location_lng AS lng, timestamp";

const REPORT_COLUMNS: &str = "id, issue_type, description, \
     location_lat AS lat, location_lng AS lng, timestamp";

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, tds: f64, at: Coordinate) -> Result<Reading, StoreError> {
        // ---
        let sql = format!(
            "INSERT INTO sensor_data (location_label, tds_value, location_lat, location_lng) \
             VALUES ($1, $2, $3, $4) RETURNING {READING_COLUMNS}"
        );
        let reading = sqlx::query_as::<_, Reading>(&sql)
            .bind(SENSOR_LABEL)
            .bind(tds)
            .bind(at.lat)
            .bind(at.lng)
            .fetch_one(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn recent_readings(&self, limit: usize) -> Result<Vec<Reading>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_data ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(readings)
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn insert_report(&self, report: NewReport) -> Result<CommunityReport, StoreError> {
        // ---
        let sql = format!(
            "INSERT INTO community_reports (issue_type, description, location_lat, location_lng) \
             VALUES ($1, $2, $3, $4) RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(report.issue_type.as_str())
            .bind(&report.description)
            .bind(report.lat.unwrap_or(0.0))
            .bind(report.lng.unwrap_or(0.0))
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn recent_reports(&self, limit: usize) -> Result<Vec<CommunityReport>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM community_reports ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        sqlx::query_as::<_, ReportRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CommunityReport::try_from)
            .collect()
    }
}

/// Seed the PostgreSQL tables with sample rows when they are empty.
pub async fn seed_if_empty(pool: &PgPool) -> Result<(), StoreError> {
    // ---
    let store = PgStore::new(pool.clone());

    let (readings,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_data")
        .fetch_one(pool)
        .await?;
    if readings == 0 {
        for tds in SAMPLE_TDS {
            store.insert_reading(tds, SAMPLE_SITE).await?;
        }
        tracing::info!("Seeded {} sample readings", SAMPLE_TDS.len());
    }

    let (reports,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM community_reports")
        .fetch_one(pool)
        .await?;
    if reports == 0 {
        for report in sample_reports() {
            store.insert_report(report).await?;
        }
        tracing::info!("Seeded sample community reports");
    }
    Ok(())
}

// ---

const SAMPLE_SITE: Coordinate = Coordinate {
    lat: 28.6139,
    lng: 77.2090,
};

const SAMPLE_TDS: [f64; 3] = [450.5, 120.2, 850.0];

fn sample_reports() -> Vec<NewReport> {
    // ---
    vec![
        NewReport {
            issue_type: IssueType::Taste,
            description: "Water tastes slightly metallic today in Sector 4.".to_string(),
            lat: Some(SAMPLE_SITE.lat),
            lng: Some(SAMPLE_SITE.lng),
        },
        NewReport {
            issue_type: IssueType::Color,
            description: "Noticeable yellowish tint in the tap water.".to_string(),
            lat: Some(SAMPLE_SITE.lat),
            lng: Some(SAMPLE_SITE.lng),
        },
    ]
}

/// In-process store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
    reports: RwLock<Vec<CommunityReport>>,
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the same sample rows the database is seeded with.
    pub async fn seeded() -> Result<Self, StoreError> {
        // ---
        let store = Self::new();
        for tds in SAMPLE_TDS {
            store.insert_reading(tds, SAMPLE_SITE).await?;
        }
        for report in sample_reports() {
            store.insert_report(report).await?;
        }
        Ok(store)
    }
}

/// Newest first, ties broken by the later id.
fn newest_first<T, F>(items: &[T], limit: usize, key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    // ---
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(b).cmp(&key(a)));
    sorted.truncate(limit);
    sorted
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, tds: f64, at: Coordinate) -> Result<Reading, StoreError> {
        // ---
        let mut readings = self.readings.write().await;
        let reading = Reading {
            id: readings.len() as i64 + 1,
            location_label: SENSOR_LABEL.to_string(),
            tds,
            turbidity: None,
            temperature: None,
            lat: at.lat,
            lng: at.lng,
            timestamp: Utc::now(),
        };
        readings.push(reading.clone());
        Ok(reading)
    }

    async fn recent_readings(&self, limit: usize) -> Result<Vec<Reading>, StoreError> {
        // ---
        let readings = self.readings.read().await;
        Ok(newest_first(&readings, limit, |r| (r.timestamp, r.id)))
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: NewReport) -> Result<CommunityReport, StoreError> {
        // ---
        let mut reports = self.reports.write().await;
        let stored = CommunityReport {
            id: reports.len() as i64 + 1,
            issue_type: report.issue_type,
            description: report.description,
            lat: report.lat.unwrap_or(0.0),
            lng: report.lng.unwrap_or(0.0),
            timestamp: Utc::now(),
        };
        reports.push(stored.clone());
        Ok(stored)
    }

    async fn recent_reports(&self, limit: usize) -> Result<Vec<CommunityReport>, StoreError> {
        // ---
        let reports = self.reports.read().await;
        Ok(newest_first(&reports, limit, |r| (r.timestamp, r.id)))
    }
}
