//! Owned timer tasks with explicit start/cancel pairs.
//!
//! A [`ScheduledTask`] aborts its tokio task when cancelled or dropped, so
//! no callback can outlive the state it was started for. A [`TaskGroup`]
//! cancels all of its tasks together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

// ---

/// A spawned periodic, one-shot or notification-driven task.
#[derive(Debug)]
pub struct ScheduledTask {
    // ---
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    // ---
    /// Run `tick` every `period`, first after one full period.
    ///
    /// A slow tick delays the following ones instead of bursting to catch
    /// up.
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        debug!("Starting task '{}' every {:?}", name, period);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        Self { name, handle }
    }

    /// Run `fire` once after `delay`.
    pub fn after<F, Fut>(name: &'static str, delay: Duration, fire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        debug!("Starting task '{}' after {:?}", name, delay);
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            fire().await;
        });
        Self { name, handle }
    }

    /// Run `fire` each time `signal` is notified.
    ///
    /// Runs never overlap. Notifications arriving while `fire` runs collapse
    /// into a single follow-up run.
    pub fn on_notify<F, Fut>(name: &'static str, signal: Arc<Notify>, mut fire: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        debug!("Starting task '{}' on notification", name);
        let handle = tokio::spawn(async move {
            loop {
                signal.notified().await;
                fire().await;
            }
        });
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        // ---
        if !self.handle.is_finished() {
            debug!("Cancelling task '{}'", self.name);
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Tasks sharing one owner's lifecycle.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Vec<ScheduledTask>,
}

impl TaskGroup {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ScheduledTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel and forget every task in the group.
    pub fn cancel_all(&mut self) {
        // ---
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}
