//! Live fan-out of ingested TDS values to connected dashboards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

// ---

/// Buffered updates per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Payload of a `tdsUpdate` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TdsUpdate {
    // ---
    pub tds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TdsUpdate {
    // ---
    /// Value reported before anything has been received.
    pub fn idle() -> Self {
        Self {
            tds: 0.0,
            timestamp: None,
        }
    }
}

/// Latest value plus a broadcast channel of subsequent updates.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    // ---
    updates: broadcast::Sender<TdsUpdate>,
    latest: Arc<watch::Sender<TdsUpdate>>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveFeed {
    // ---
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (latest, _) = watch::channel(TdsUpdate::idle());
        Self {
            updates,
            latest: Arc::new(latest),
        }
    }

    /// Record a new value and fan it out. Returns the number of live
    /// subscribers that will receive it.
    pub fn publish(&self, tds: f64, timestamp: DateTime<Utc>) -> usize {
        // ---
        let update = TdsUpdate {
            tds,
            timestamp: Some(timestamp),
        };
        self.latest.send_replace(update.clone());
        // No receivers is not an error; the latest value is still kept.
        self.updates.send(update).unwrap_or(0)
    }

    pub fn latest(&self) -> TdsUpdate {
        self.latest.borrow().clone()
    }

    /// Subscribe to updates published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TdsUpdate> {
        self.updates.subscribe()
    }
}
