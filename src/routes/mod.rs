//! Route gateway for the `watersafe-tds` HTTP API.
//!
//! Each sibling module exports a sub-router; this gateway merges them and
//! attaches the shared [`AppState`], so `main.rs` never needs to know about
//! individual endpoints.

use axum::Router;

use crate::AppState;

mod advisory;
mod dashboard;
mod health;
mod heatmap;
mod reports;
mod tds;
mod water_data;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(water_data::router())
        .merge(tds::router())
        .merge(reports::router())
        .merge(dashboard::router())
        .merge(advisory::router())
        .merge(heatmap::router())
        .merge(health::router())
        .with_state(state)
}
