//! Store ports (§4.1, §C1): the only component with I/O to the database.
//!
//! Concretely three repository traits — `MissionRepository`, `ItemRepository`,
//! `MediaRepository` — each backed in this crate by one SQLite connection pool. Every
//! other component (Engine, Retry Checker, Scheduler, Facade) serializes through
//! these traits; nothing else touches `sqlx` directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::BrokerResult;
use crate::domain::models::{Item, MediaRecord, Mission, MissionStatus, ParamMap, TaskKind};

/// Fields needed to insert a new mission; `id`/timestamps/counters are assigned by
/// the Store.
#[derive(Debug, Clone)]
pub struct NewMission {
    pub name: String,
    pub description: Option<String>,
    pub task_kind: TaskKind,
    pub model_id: Option<String>,
    pub fixed_config: ParamMap,
    pub status: MissionStatus,
    pub engine_track: String,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Fields needed to insert a new item; `id`/`mission_id`/timestamps are assigned by
/// the Store.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_index: u32,
    pub input_params: ParamMap,
}

/// A page of missions plus the total row count matching the filter.
#[derive(Debug, Clone)]
pub struct MissionPage {
    pub missions: Vec<Mission>,
    pub total: u64,
}

/// Repository for mission rows (§3 Mission).
#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// Inserts a mission and its items in one transaction, returning the new
    /// mission id with item ids assigned contiguously from `item_index = 0`.
    async fn create_with_items(&self, mission: NewMission, items: Vec<NewItem>) -> BrokerResult<i64>;

    async fn get(&self, id: i64) -> BrokerResult<Option<Mission>>;

    async fn list(
        &self,
        engine_track: &str,
        status: Option<MissionStatus>,
        page: u32,
        page_size: u32,
    ) -> BrokerResult<MissionPage>;

    /// Transitions a mission's status, stamping `started_at` the first time it
    /// becomes `running`. No-op (returns `Ok(false)`) if the mission is already
    /// terminal or not found.
    async fn update_status(&self, id: i64, status: MissionStatus) -> BrokerResult<bool>;

    /// Sets a mission's status unconditionally, bypassing the state-table guard
    /// `update_status` enforces. Used only by `retry_mission` (§4.8), which must move
    /// a terminal `failed` mission back to `running` — the one state-machine edge
    /// that isn't a forward transition. Mirrors [`crate::domain::models::Mission::force_status`].
    async fn force_status(&self, id: i64, status: MissionStatus) -> BrokerResult<()>;

    /// Adds `completed_delta`/`failed_delta` to the mission's counters.
    async fn increment_counters(&self, id: i64, completed_delta: u32, failed_delta: u32) -> BrokerResult<()>;

    /// Cancels the mission and every `pending` item of it in one transaction (§5
    /// cancellation semantics). Returns the number of items marked cancelled, or
    /// `Ok(0)` if the mission was already terminal or not found.
    async fn cancel(&self, id: i64) -> BrokerResult<u64>;

    /// Deletes a mission and cascades to its items. Idempotent: deleting a
    /// nonexistent id is `Ok(())`.
    async fn delete(&self, id: i64) -> BrokerResult<()>;

    /// Missions with `status = scheduled` and `scheduled_time <= now`, for the
    /// Scheduler's 10s sweep (§4.7).
    async fn list_due_scheduled(&self, engine_track: &str, now: DateTime<Utc>) -> BrokerResult<Vec<Mission>>;

    /// Missions with `status = scheduled` and `scheduled_time` older than `cutoff`,
    /// for the Scheduler's startup expiry pass.
    async fn list_stale_scheduled(&self, engine_track: &str, cutoff: DateTime<Utc>) -> BrokerResult<Vec<Mission>>;

    /// Every mission with at least one non-terminal item, for crash recovery
    /// (§4.4e.3).
    async fn list_with_nonterminal_items(&self, engine_track: &str) -> BrokerResult<Vec<Mission>>;
}

/// Repository for item rows (§3 Item).
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn get(&self, id: i64) -> BrokerResult<Option<Item>>;

    async fn list_by_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>>;

    /// Persists the full row; used by every item status transition.
    async fn save(&self, item: &Item) -> BrokerResult<()>;

    /// `pending` items (joined on mission `engine_track`) with `next_retry_at <= now`,
    /// for the Retry Checker's 10s sweep (§4.6). Does not clear `next_retry_at`.
    async fn list_due_retries(&self, engine_track: &str, now: DateTime<Utc>) -> BrokerResult<Vec<Item>>;

    /// `pending` items of one mission, for the Scheduler's "enqueue all pending
    /// items of mission" primitive (§4.7) and for `retry_mission` after reset.
    async fn list_pending_for_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>>;

    /// `pending` items whose mission is not `scheduled` and whose `next_retry_at` is
    /// null, for crash recovery step 1 (§4.4e.1).
    async fn list_recoverable_pending(&self, engine_track: &str) -> BrokerResult<Vec<Item>>;

    /// `processing` items with a non-null `platform_task_id`, for crash recovery
    /// step 2 (§4.4e.2).
    async fn list_recoverable_processing(&self, engine_track: &str) -> BrokerResult<Vec<Item>>;

    /// `failed` items of one mission, for `retry_mission` (§4.8).
    async fn list_failed_for_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>>;

    /// Count of items in `(pending, processing)` for one mission, for the
    /// completion monitor (§4.4d).
    async fn count_nonterminal(&self, mission_id: i64) -> BrokerResult<i64>;

    /// Marks every `pending` item of a mission `cancelled` in one statement
    /// (invoked inside `MissionRepository::cancel`'s transaction in the concrete
    /// implementation, but exposed here for direct use by tests).
    async fn cancel_pending_for_mission(&self, mission_id: i64) -> BrokerResult<u64>;
}

/// Repository for the media dedup index (§3 Media record). Out of scope for the
/// Engine, but owned by the Store since the upload HTTP surface (external) relies
/// on it.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn find_by_hash(&self, sha256: &str) -> BrokerResult<Option<MediaRecord>>;

    /// Inserts a new media record, or increments `usage_count` if `sha256` already
    /// exists (§5 resource policy).
    async fn record_upload(
        &self,
        sha256: &str,
        original_name: &str,
        local_path: &str,
        provider_handle: Option<&str>,
    ) -> BrokerResult<MediaRecord>;
}
