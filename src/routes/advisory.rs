//! Advisory panel endpoint.
//!
//! With `?tds=` the advisory is resolved on demand. Without it, the cached
//! advisory for the latest reading is returned, or that reading's baseline
//! while the refresh is still pending.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::advisory::resolve_within;
use crate::classifier::classify;
use crate::error::{AppError, HandlerResult};
use crate::models::{SafetyAssessment, SafetyScore};
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/advisory", get(handler))
}

#[derive(Debug, Deserialize)]
struct AdvisoryQuery {
    tds: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AdvisoryResponse {
    tds: Option<f64>,
    /// `false` while only the deterministic baseline is available.
    resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
    assessment: Option<SafetyAssessment>,
    /// Unsafe water raises the critical alert.
    critical: bool,
}

impl AdvisoryResponse {
    // ---
    fn new(tds: f64, assessment: SafetyAssessment, resolved_at: Option<DateTime<Utc>>) -> Self {
        Self {
            tds: Some(tds),
            resolved: resolved_at.is_some(),
            resolved_at,
            critical: assessment.score == SafetyScore::Unsafe,
            assessment: Some(assessment),
        }
    }

    fn empty() -> Self {
        Self {
            tds: None,
            resolved: false,
            resolved_at: None,
            assessment: None,
            critical: false,
        }
    }
}

async fn handler(
    Query(params): Query<AdvisoryQuery>,
    State(state): State<AppState>,
) -> HandlerResult<AdvisoryResponse> {
    // ---
    if let Some(tds) = params.tds {
        if !tds.is_finite() || tds < 0.0 {
            return Err(AppError::BadRequest(format!(
                "TDS must be a non-negative number, got {tds}"
            )));
        }
        let reports = state
            .reports
            .recent_reports(state.config.recent_limit)
            .await
            .unwrap_or_else(|e| {
                warn!("Advisory for {} ppm proceeding without reports: {}", tds, e);
                Vec::new()
            });
        info!("GET /api/advisory - resolving {} ppm with {} reports", tds, reports.len());
        let assessment = resolve_within(
            state.advisor.as_ref(),
            tds,
            &reports,
            state.config.advisory_timeout,
        )
        .await;
        return Ok(Json(AdvisoryResponse::new(tds, assessment, Some(Utc::now()))));
    }

    let Some(latest) = state.readings.latest_reading().await? else {
        return Ok(Json(AdvisoryResponse::empty()));
    };

    let cached = state.advisory.read().await.clone();
    let response = match cached {
        Some(c) if c.reading_id == latest.id => {
            AdvisoryResponse::new(c.tds, c.assessment, Some(c.resolved_at))
        }
        _ => AdvisoryResponse::new(latest.tds, classify(latest.tds), None),
    };
    Ok(Json(response))
}
