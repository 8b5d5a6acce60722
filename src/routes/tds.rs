//! Gateway ingestion and live TDS updates.
//!
//! `POST /api/tds` accepts `{ "tds": value }` from a sensor gateway,
//! `GET /api/tds` returns the latest value, and `GET /api/tds/stream`
//! pushes every new value as a `tdsUpdate` Server-Sent Event.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use super::water_data::record;
use crate::error::HandlerResult;
use crate::live::TdsUpdate;
use crate::models::NewReading;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/tds", get(latest).post(ingest))
        .route("/api/tds/stream", get(stream))
}

#[derive(Debug, Serialize)]
struct GatewayResponse {
    success: bool,
    message: &'static str,
}

async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<NewReading>,
) -> HandlerResult<GatewayResponse> {
    // ---
    info!("POST /api/tds");
    record(&state, payload).await?;

    Ok(Json(GatewayResponse {
        success: true,
        message: "Data received",
    }))
}

async fn latest(State(state): State<AppState>) -> Json<TdsUpdate> {
    Json(state.live.latest())
}

fn update_event(update: &TdsUpdate) -> Event {
    // ---
    Event::default()
        .event("tdsUpdate")
        .data(serde_json::to_string(update).unwrap_or_default())
}

async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // ---
    // Subscribe before reading the latest value so nothing published in
    // between is lost.
    let mut rx = state.live.subscribe();
    let initial = state.live.latest();
    info!("SSE subscriber connected");

    let stream = async_stream::stream! {
        yield Ok(update_event(&initial));
        loop {
            match rx.recv().await {
                Ok(update) => yield Ok(update_event(&update)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("SSE subscriber lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
