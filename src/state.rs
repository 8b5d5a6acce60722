//! Shared application state and its background maintenance tasks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::advisory::{resolve_within, Advisor};
use crate::corpus;
use crate::live::LiveFeed;
use crate::models::{Reading, SafetyAssessment};
use crate::scheduler::{ScheduledTask, TaskGroup};
use crate::store::{ReadingStore, ReportStore};
use crate::Config;

// ---

/// The most recent advisory resolved for the latest ingested reading.
#[derive(Debug, Clone, Serialize)]
pub struct CachedAdvisory {
    // ---
    /// Id of the reading the advisory was resolved for.
    pub reading_id: i64,
    pub tds: f64,
    pub assessment: SafetyAssessment,
    pub resolved_at: DateTime<Utc>,
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub readings: Arc<dyn ReadingStore>,
    pub reports: Arc<dyn ReportStore>,
    pub advisor: Arc<dyn Advisor>,
    pub live: LiveFeed,
    /// Geotagged readings behind the dashboard and heatmap; replaced
    /// wholesale on every drift tick.
    pub corpus: Arc<RwLock<Vec<Reading>>>,
    pub advisory: Arc<RwLock<Option<CachedAdvisory>>>,
    /// Wakes the ingest-driven advisory refresher.
    refresh_signal: Arc<Notify>,
    pub config: Config,
}

impl AppState {
    // ---
    pub fn new<S>(
        store: Arc<S>,
        advisor: Arc<dyn Advisor>,
        corpus: Vec<Reading>,
        config: Config,
    ) -> Self
    where
        S: ReadingStore + ReportStore + 'static,
    {
        Self {
            readings: store.clone(),
            reports: store,
            advisor,
            live: LiveFeed::new(),
            corpus: Arc::new(RwLock::new(corpus)),
            advisory: Arc::new(RwLock::new(None)),
            refresh_signal: Arc::new(Notify::new()),
            config,
        }
    }

    /// Ask the refresher started by [`Self::start_background_tasks`] to
    /// re-resolve the advisory. Requests made while a refresh is running
    /// collapse into one follow-up refresh.
    pub fn request_refresh(&self) {
        self.refresh_signal.notify_one();
    }

    /// Resolve the advisory for the latest ingested reading and cache it.
    ///
    /// A resolution finishing after one for a newer reading is discarded.
    pub async fn refresh_advisory(&self) {
        // ---
        let latest = match self.readings.latest_reading().await {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!("No readings yet, skipping advisory refresh");
                return;
            }
            Err(e) => {
                warn!("Advisory refresh could not load the latest reading: {}", e);
                return;
            }
        };
        let reports = self
            .reports
            .recent_reports(self.config.recent_limit)
            .await
            .unwrap_or_else(|e| {
                warn!("Advisory refresh proceeding without reports: {}", e);
                Vec::new()
            });

        let assessment = resolve_within(
            self.advisor.as_ref(),
            latest.tds,
            &reports,
            self.config.advisory_timeout,
        )
        .await;
        info!(
            "Advisory refreshed for {} ppm: {} / {}",
            latest.tds, assessment.score, assessment.recommendation
        );

        let mut cached = self.advisory.write().await;
        if let Some(newer) = cached.as_ref().filter(|c| c.reading_id > latest.id) {
            debug!(
                "Discarding advisory for reading {}, reading {} already resolved",
                latest.id, newer.reading_id
            );
            return;
        }
        *cached = Some(CachedAdvisory {
            reading_id: latest.id,
            tds: latest.tds,
            assessment,
            resolved_at: Utc::now(),
        });
    }

    /// Apply one tick of synthetic drift to the corpus.
    pub async fn apply_drift(&self) {
        // ---
        let mut readings = self.corpus.write().await;
        let drifted = corpus::drift(&readings, &mut rand::thread_rng());
        *readings = drifted;
    }

    /// Start the advisory refreshers (periodic and on ingest) and the corpus
    /// drift.
    ///
    /// Dropping or cancelling the returned group stops all of them.
    pub fn start_background_tasks(&self) -> TaskGroup {
        // ---
        let mut tasks = TaskGroup::new();

        let state = self.clone();
        tasks.push(ScheduledTask::every(
            "advisory-refresh",
            self.config.refresh_interval,
            move || {
                let state = state.clone();
                async move { state.refresh_advisory().await }
            },
        ));

        let state = self.clone();
        tasks.push(ScheduledTask::on_notify(
            "advisory-on-ingest",
            Arc::clone(&self.refresh_signal),
            move || {
                let state = state.clone();
                async move { state.refresh_advisory().await }
            },
        ));

        let state = self.clone();
        tasks.push(ScheduledTask::every(
            "corpus-drift",
            self.config.drift_interval,
            move || {
                let state = state.clone();
                async move { state.apply_drift().await }
            },
        ));

        tasks
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::advisory::{Advisor, AdvisoryError, OfflineAdvisor};
    use crate::classifier::classify;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use crate::models::Coordinate;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Answers after a delay keyed on the prompt's TDS value, then fails so
    /// the baseline is cached.
    struct SlowAdvisor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Advisor for SlowAdvisor {
        async fn advise(&self, prompt: &str) -> Result<String, AdvisoryError> {
            // ---
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if prompt.contains("100 ppm") { 10 } else { 1 };
            tokio::time::sleep(Duration::from_secs(delay)).await;
            Err(AdvisoryError::EmptyResponse)
        }
    }

    fn slow_state() -> (AppState, Arc<SlowAdvisor>) {
        // ---
        let advisor = Arc::new(SlowAdvisor {
            calls: AtomicUsize::new(0),
        });
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            advisor.clone(),
            Vec::new(),
            Config::default(),
        );
        (state, advisor)
    }

    fn state_with(corpus: Vec<Reading>) -> AppState {
        // ---
        AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(OfflineAdvisor),
            corpus,
            Config::default(),
        )
    }

    #[tokio::test]
    async fn test_refresh_caches_latest() {
        // ---
        let state = state_with(Vec::new());
        state.refresh_advisory().await;
        assert!(state.advisory.read().await.is_none());

        state
            .readings
            .insert_reading(905.0, Coordinate::new(0.0, 0.0))
            .await
            .unwrap();
        state.refresh_advisory().await;

        let cached = state.advisory.read().await.clone().unwrap();
        assert_eq!(cached.tds, 905.0);
        assert_eq!(cached.assessment, classify(905.0));
    }

    #[tokio::test]
    async fn test_drift_replaces_corpus() {
        // ---
        let corpus = corpus::generate(20, &mut StdRng::seed_from_u64(3));
        let state = state_with(corpus.clone());
        state.apply_drift().await;

        let drifted = state.corpus.read().await;
        assert_eq!(drifted.len(), corpus.len());
        assert!(drifted.iter().all(|r| r.tds >= 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_tasks_stop_on_cancel() {
        // ---
        let state = state_with(Vec::new());
        state
            .readings
            .insert_reading(42.0, Coordinate::new(0.0, 0.0))
            .await
            .unwrap();

        let mut tasks = state.start_background_tasks();
        assert_eq!(tasks.len(), 3);
        tokio::time::sleep(std::time::Duration::from_secs(31)).await;
        assert_eq!(state.advisory.read().await.as_ref().map(|c| c.tds), Some(42.0));

        tasks.cancel_all();
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_refresh_does_not_overwrite_newer() {
        // ---
        let (state, _) = slow_state();
        let origin = Coordinate::new(0.0, 0.0);

        state.readings.insert_reading(100.0, origin).await.unwrap();
        let older = state.clone();
        tokio::spawn(async move { older.refresh_advisory().await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let newer = state.readings.insert_reading(900.0, origin).await.unwrap();
        let latest = state.clone();
        tokio::spawn(async move { latest.refresh_advisory().await });

        // The 900 ppm call lands after 1 s, the 100 ppm one after 10 s.
        tokio::time::sleep(Duration::from_secs(20)).await;
        let cached = state.advisory.read().await.clone().unwrap();
        assert_eq!(cached.reading_id, newer.id);
        assert_eq!(cached.tds, 900.0);
        assert_eq!(cached.assessment, classify(900.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_refreshes_coalesce() {
        // ---
        let (state, advisor) = slow_state();
        let origin = Coordinate::new(0.0, 0.0);
        let _tasks = state.start_background_tasks();

        for tds in [300.0, 310.0, 320.0] {
            state.readings.insert_reading(tds, origin).await.unwrap();
            state.request_refresh();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);

        // Requests during the running call add one follow-up, not two.
        for tds in [330.0, 340.0] {
            state.readings.insert_reading(tds, origin).await.unwrap();
            state.request_refresh();
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 2);

        let cached = state.advisory.read().await.clone().unwrap();
        assert_eq!(cached.tds, 340.0);
    }
}
