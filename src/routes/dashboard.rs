//! Hyperlocal dashboard: nearest readings, their trend, and the baseline
//! assessment shown before the enriched advisory arrives.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::classify;
use crate::models::{Coordinate, Reading, SafetyAssessment, TrendPoint};
use crate::smoothing::smooth;
use crate::spatial::select_nearest;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/dashboard", get(handler))
}

/// Location supplied by the client's geolocation provider, if any.
#[derive(Debug, Deserialize)]
struct LocationQuery {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    /// `None` when the fallback region was used.
    origin: Option<Coordinate>,
    readings: Vec<Reading>,
    trend: Vec<TrendPoint>,
    /// Baseline for the earliest selected reading; `None` with no data yet.
    assessment: Option<SafetyAssessment>,
}

async fn handler(
    Query(params): Query<LocationQuery>,
    State(state): State<AppState>,
) -> Json<DashboardResponse> {
    // ---
    let origin = Coordinate::from_parts(params.lat, params.lng);
    if origin.is_none() {
        info!("GET /api/dashboard - no usable location, using fallback region");
    }

    let readings = {
        let corpus = state.corpus.read().await;
        select_nearest(origin, &corpus, state.config.nearest_n)
    };
    let trend = smooth(&readings, state.config.smoothing_window);
    let assessment = readings.first().map(|r| classify(r.tds));

    info!(
        "GET /api/dashboard - {} readings selected, origin {:?}",
        readings.len(),
        origin
    );
    Json(DashboardResponse {
        origin,
        readings,
        trend,
        assessment,
    })
}
