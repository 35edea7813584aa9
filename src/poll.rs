//! Polling scheduler: periodic refresh of the open thread.
//!
//! DESIGN
//! ======
//! There is no push channel, so a background task calls
//! [`MessageThreadStore::refresh_if`] on a fixed period while a thread view
//! is open. At most one task exists; `start` stops the previous one first.
//!
//! Each start takes a new value from a shared generation counter and hands
//! the task a [`PollToken`] holding it. `stop` bumps the counter, so a
//! refresh whose response arrives after teardown sees a dead token and drops
//! the result even if it was already past the abort point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::store::thread::{FetchOutcome, MessageThreadStore, ThreadMessage};

/// Liveness check handed to an in-flight refresh.
#[derive(Debug, Clone)]
pub struct PollToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl PollToken {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.issued
    }
}

pub struct PollingScheduler {
    period: Duration,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period, generation: Arc::new(AtomicU64::new(0)), task: Mutex::new(None) }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Begin refreshing `thread` every period, first tick one period from
    /// now. Any running timer is stopped first.
    pub fn start(&self, thread: Arc<MessageThreadStore>) -> PollToken {
        self.start_with(thread, |_| {})
    }

    /// [`Self::start`], calling `on_merge` with the thread's newest confirmed
    /// message whenever a refresh adds messages.
    pub fn start_with<F>(&self, thread: Arc<MessageThreadStore>, on_merge: F) -> PollToken
    where
        F: Fn(&ThreadMessage) + Send + Sync + 'static,
    {
        let mut task = self.task();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let issued = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = PollToken { generation: self.generation.clone(), issued };
        let period = self.period;

        let loop_token = token.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !loop_token.is_live() {
                    break;
                }
                match thread.refresh_if(|| loop_token.is_live()).await {
                    Ok(FetchOutcome::Applied { added, .. }) if added > 0 => {
                        debug!(added, "poll merged messages");
                        if let Some(latest) = thread.latest_confirmed() {
                            on_merge(&latest);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "poll refresh failed"),
                }
            }
        }));
        debug!(generation = issued, period_ms = period.as_millis(), "polling started");
        token
    }

    /// Stop polling. Takes effect immediately for any refresh in flight.
    pub fn stop(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.task().take() {
            handle.abort();
            debug!(generation, "polling stopped");
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;
