//! Water-safety classification core and the HTTP service around it.
//!
//! The core is pure and synchronous apart from advisory resolution:
//! - [`classifier`]: deterministic TDS tiering (the baseline)
//! - [`advisory`]: enrichment by an external model with baseline fallback
//! - [`spatial`]: nearest-N selection in chronological order
//! - [`smoothing`]: causal moving-average trend
//! - [`heatmap`]: zoom-dependent heat layer parameters
//!
//! Everything else (stores, live feed, timers, routes) wires that core into
//! the service started by `main.rs`.

pub mod advisory;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod error;
pub mod heatmap;
pub mod live;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod smoothing;
pub mod spatial;
pub mod state;
pub mod store;

pub use config::Config;
pub use state::AppState;
