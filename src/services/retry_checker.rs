//! Retry Checker (§4.6, §C4): a periodic sweep that re-enqueues items whose
//! backoff window has elapsed.
//!
//! Grounded on the teacher's `services/event_scheduler.rs` tick-interval loop
//! pattern — a simple `tokio::time::interval` driving one Store read per tick, with
//! no internal state beyond the interval itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::ports::store::ItemRepository;

use super::task_engine::{ShutdownToken, TaskEngine};

/// How often the Retry Checker sweeps for due items (§4.6).
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Re-enqueues `pending` items whose `next_retry_at` has elapsed onto the owning
/// engine's ready queue.
pub struct RetryChecker {
    item_repo: Arc<dyn ItemRepository>,
    engine: Arc<TaskEngine>,
    sweep_interval: Duration,
}

impl RetryChecker {
    #[must_use]
    pub fn new(item_repo: Arc<dyn ItemRepository>, engine: Arc<TaskEngine>) -> Self {
        Self { item_repo, engine, sweep_interval: SWEEP_INTERVAL }
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Runs the sweep loop until `shutdown` is signalled.
    pub async fn run(&self, shutdown: ShutdownToken) {
        let track = self.engine.engine_track().to_string();
        tracing::info!(engine_track = %track, "retry checker starting");
        while !shutdown.is_cancelled() {
            if let Err(e) = self.sweep_once().await {
                tracing::warn!(engine_track = %track, error = %e, "retry checker sweep failed");
            }
            tokio::time::sleep(self.sweep_interval).await;
        }
        tracing::info!(engine_track = %track, "retry checker stopped");
    }

    async fn sweep_once(&self) -> Result<(), crate::domain::error::BrokerError> {
        let track = self.engine.engine_track();
        let due = self.item_repo.list_due_retries(track, Utc::now()).await?;
        for item in &due {
            self.engine.enqueue_item(item.mission_id, item.id).await;
        }
        if !due.is_empty() {
            tracing::debug!(engine_track = track, count = due.len(), "re-enqueued due retries");
        }
        Ok(())
    }
}
