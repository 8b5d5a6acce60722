use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::heatmap::{heat_points, map_params};
use crate::models::{HeatPoint, HeatmapRenderParams};
use crate::AppState;

// ---

/// Zoom the map opens at.
const DEFAULT_ZOOM: u8 = 5;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/heatmap", get(handler))
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    zoom: Option<u8>,
}

#[derive(Debug, Serialize)]
struct HeatmapResponse {
    zoom: u8,
    params: HeatmapRenderParams,
    points: Vec<HeatPoint>,
}

async fn handler(
    Query(params): Query<HeatmapQuery>,
    State(state): State<AppState>,
) -> Json<HeatmapResponse> {
    // ---
    let zoom = params.zoom.unwrap_or(DEFAULT_ZOOM);
    let points = heat_points(&state.corpus.read().await);
    debug!("GET /api/heatmap - zoom {}, {} points", zoom, points.len());

    Json(HeatmapResponse {
        zoom,
        params: map_params(zoom),
        points,
    })
}
