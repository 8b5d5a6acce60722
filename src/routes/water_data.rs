use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, HandlerResult};
use crate::models::{Coordinate, NewReading, Reading};
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/water-data", get(list).post(ingest))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    message: &'static str,
}

async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<NewReading>,
) -> HandlerResult<IngestResponse> {
    // ---
    info!("POST /api/water-data");
    record(&state, payload).await?;

    Ok(Json(IngestResponse {
        status: "success",
        message: "Data recorded",
    }))
}

async fn list(State(state): State<AppState>) -> HandlerResult<Vec<Reading>> {
    // ---
    let readings = state
        .readings
        .recent_readings(state.config.recent_limit)
        .await?;
    debug!("GET /api/water-data - returning {} readings", readings.len());
    Ok(Json(readings))
}

/// Validate, persist and broadcast an ingested value.
///
/// Shared by the located (`/api/water-data`) and gateway (`/api/tds`)
/// ingestion endpoints. Missing coordinates are stored as `0, 0`.
pub(super) async fn record(state: &AppState, payload: NewReading) -> Result<Reading, AppError> {
    // ---
    let tds = match payload.tds {
        None => return Err(AppError::BadRequest("TDS value required".into())),
        Some(tds) if !tds.is_finite() || tds < 0.0 => {
            return Err(AppError::BadRequest(format!(
                "TDS must be a non-negative number, got {tds}"
            )))
        }
        Some(tds) => tds,
    };

    let at = Coordinate::from_payload(payload.lat, payload.lng)
        .map_err(AppError::BadRequest)?
        .unwrap_or_else(|| Coordinate::new(0.0, 0.0));

    let reading = state.readings.insert_reading(tds, at).await?;
    let receivers = state.live.publish(reading.tds, reading.timestamp);
    info!(
        "Recorded reading {} ({} ppm), broadcast to {} subscribers",
        reading.id, reading.tds, receivers
    );

    // The baseline is served until the refresher lands a new advisory.
    state.request_refresh();

    Ok(reading)
}
