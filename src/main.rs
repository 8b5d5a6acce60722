//! Application entry point for the `watersafe-tds` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Selecting the PostgreSQL store (creating the schema if needed) or the
//!   in-memory store when `DATABASE_URL` is unset
//! - Generating the synthetic reading corpus
//! - Starting the advisory refresh and corpus drift timers
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `GEMINI_API_KEY` (optional) – enables enriched advisories
//! - `APP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `APP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the remaining settings.
use std::{env, io::IsTerminal, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use watersafe_tds::advisory::{Advisor, GeminiAdvisor, OfflineAdvisor};
use watersafe_tds::store::{self, MemoryStore, PgStore};
use watersafe_tds::{config, corpus, routes, schema, AppState, Config};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let advisor = build_advisor(&cfg);
    let readings = match cfg.corpus_seed {
        Some(seed) => corpus::generate(cfg.corpus_size, &mut StdRng::seed_from_u64(seed)),
        None => corpus::generate(cfg.corpus_size, &mut StdRng::from_entropy()),
    };
    tracing::info!("Generated synthetic corpus of {} readings", readings.len());

    let state = match cfg.db_url.clone() {
        Some(db_url) => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_pool_max)
                .connect(&db_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

            tracing::info!("Successfully connected to database");

            schema::create_schema(&pool).await?;
            store::seed_if_empty(&pool).await?;
            AppState::new(Arc::new(PgStore::new(pool)), advisor, readings, cfg.clone())
        }
        None => {
            tracing::warn!("DATABASE_URL not set, readings and reports are kept in memory");
            AppState::new(Arc::new(MemoryStore::seeded().await?), advisor, readings, cfg.clone())
        }
    };

    // Show an advisory as soon as possible instead of after the first period.
    state.refresh_advisory().await;
    let mut background = state.start_background_tasks();

    // Build app from routes gateway
    let app: Router = routes::router(state);

    tracing::info!("Listening on {}", cfg.bind_addr);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.cancel_all();
    tracing::info!("Shut down cleanly");
    Ok(())
}

// ---

fn build_advisor(cfg: &Config) -> Arc<dyn Advisor> {
    // ---
    match &cfg.gemini_api_key {
        Some(key) => Arc::new(GeminiAdvisor::new(
            cfg.gemini_api_url.clone(),
            cfg.gemini_model.clone(),
            key.clone(),
        )),
        None => Arc::new(OfflineAdvisor),
    }
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `APP_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `APP_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("APP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to APP_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("APP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
