//! Scheduler (§4.7, §C5): promotes `scheduled` missions to `queued` once their
//! `scheduled_time` is due, and expires missions whose scheduled time has elapsed
//! by more than [`STALE_CUTOFF`] at startup before any engine has had a chance to
//! see them (§4.7 startup expiry pass).
//!
//! Grounded on the teacher's `services/event_scheduler.rs`: a startup catch-up pass
//! followed by a steady-state `tokio::time::interval` sweep, both driven by plain
//! Store reads/writes with no engine-specific state of its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::error::BrokerResult;
use crate::domain::models::MissionStatus;
use crate::domain::ports::store::MissionRepository;

use super::task_engine::{ShutdownToken, TaskEngine};

/// How often the Scheduler sweeps for due missions (§4.7).
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// A `scheduled` mission whose `scheduled_time` is older than this at startup is
/// considered to have missed its window entirely (the process was down through it)
/// and is expired rather than started late (§4.7).
pub const STALE_CUTOFF: chrono::Duration = chrono::Duration::minutes(10);

/// Promotes due scheduled missions to `queued` and hands their items to the engine.
pub struct Scheduler {
    mission_repo: Arc<dyn MissionRepository>,
    engine: Arc<TaskEngine>,
    sweep_interval: Duration,
    stale_cutoff: chrono::Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(mission_repo: Arc<dyn MissionRepository>, engine: Arc<TaskEngine>) -> Self {
        Self { mission_repo, engine, sweep_interval: SWEEP_INTERVAL, stale_cutoff: STALE_CUTOFF }
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_stale_cutoff(mut self, cutoff: chrono::Duration) -> Self {
        self.stale_cutoff = cutoff;
        self
    }

    /// The startup expiry pass (§4.7): any mission still `scheduled` whose
    /// `scheduled_time` is older than `now - stale_cutoff` missed its window while
    /// this process (or its predecessor) was down, and is failed rather than run
    /// late. The reason isn't persisted on the mission row — `Mission` has no
    /// failure-reason field (only `Item` does) — so it's only observable in the log.
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store can't be read or written.
    pub async fn expire_stale_scheduled(&self) -> BrokerResult<usize> {
        let track = self.engine.engine_track();
        let cutoff = Utc::now() - self.stale_cutoff;
        let stale = self.mission_repo.list_stale_scheduled(track, cutoff).await?;
        for mission in &stale {
            tracing::warn!(
                mission_id = mission.id,
                scheduled_time = %mission.scheduled_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                "scheduled time elapsed before mission started, marking failed"
            );
            self.mission_repo.update_status(mission.id, MissionStatus::Failed).await?;
        }
        Ok(stale.len())
    }

    /// Runs the startup expiry pass once, then the steady-state sweep loop until
    /// `shutdown` is signalled.
    pub async fn run(&self, shutdown: ShutdownToken) {
        let track = self.engine.engine_track().to_string();
        if let Err(e) = self.expire_stale_scheduled().await {
            tracing::warn!(engine_track = %track, error = %e, "scheduler startup expiry pass failed");
        }

        tracing::info!(engine_track = %track, "scheduler starting");
        while !shutdown.is_cancelled() {
            if let Err(e) = self.sweep_once().await {
                tracing::warn!(engine_track = %track, error = %e, "scheduler sweep failed");
            }
            tokio::time::sleep(self.sweep_interval).await;
        }
        tracing::info!(engine_track = %track, "scheduler stopped");
    }

    async fn sweep_once(&self) -> BrokerResult<()> {
        let track = self.engine.engine_track();
        let due = self.mission_repo.list_due_scheduled(track, Utc::now()).await?;
        for mission in &due {
            if self.mission_repo.update_status(mission.id, MissionStatus::Queued).await? {
                let enqueued = self.engine.enqueue_pending_items_of_mission(mission.id).await?;
                tracing::info!(mission_id = mission.id, count = enqueued, "promoted scheduled mission to queued");
            }
        }
        Ok(())
    }
}
