use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{debug, info};

use crate::error::{AppError, HandlerResult};
use crate::models::{CommunityReport, Coordinate, NewReport};
use crate::AppState;

// ---

/// Longest accepted report description, in characters.
const MAX_DESCRIPTION_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/reports", get(list).post(submit))
}

async fn submit(
    State(state): State<AppState>,
    Json(report): Json<NewReport>,
) -> Result<(StatusCode, Json<CommunityReport>), AppError> {
    // ---
    let description = report.description.trim();
    if description.is_empty() {
        return Err(AppError::BadRequest("Description required".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::BadRequest(format!(
            "Description longer than {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Coordinate::from_payload(report.lat, report.lng).map_err(AppError::BadRequest)?;

    let stored = state
        .reports
        .insert_report(NewReport {
            description: description.to_string(),
            ..report
        })
        .await?;
    info!("POST /api/reports - stored {} report {}", stored.issue_type, stored.id);

    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list(State(state): State<AppState>) -> HandlerResult<Vec<CommunityReport>> {
    // ---
    let reports = state
        .reports
        .recent_reports(state.config.recent_limit)
        .await?;
    debug!("GET /api/reports - returning {} reports", reports.len());
    Ok(Json(reports))
}
