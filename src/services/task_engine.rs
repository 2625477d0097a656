//! Task Engine (§4.4, §C6) — the core of the core.
//!
//! Owns the in-memory ready queue, the concurrency gate, the submission path, the
//! per-item polling workers, and the completion monitors. Grounded on the teacher's
//! `services/swarm_orchestrator`: a long-lived struct holding `Arc`-shared
//! repositories plus `tokio::sync::Mutex`-guarded runtime state, with `tokio::spawn`
//! for every short-lived per-item/per-mission worker — generalized here from agent
//! tasks to generative-media submissions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::error::{AdapterError, BrokerError};
use crate::domain::models::{ItemStatus, MissionStatus};
use crate::domain::ports::adapter::RemoteJobStatus;
use crate::domain::ports::store::{ItemRepository, MissionRepository};

use super::platform_manager::{PlatformManager, SubmissionOutcome};

/// Shared cancellation flag (§9 re-architecture note: replaces the source's
/// module-level globals with an explicitly-passed, clonable handle).
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An item awaiting submission, identified only by id — the consumer loop always
/// re-reads the current row before acting on it, since the queue entry may be stale
/// by the time it's popped (cancelled mid-flight, already retried, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEntry {
    pub mission_id: i64,
    pub item_id: i64,
}

/// Snapshot of the Engine's queue/concurrency state, for the `/queue/status`
/// surface (§6) and for tests asserting I5.
#[derive(Debug, Clone, Copy)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub running_tasks: usize,
    pub current_inflight: u32,
    pub max_concurrent: u32,
}

struct QueueState {
    ready: VecDeque<ReadyEntry>,
    /// Items popped before their backoff elapsed; drained back to the front of
    /// `ready` at the start of every consumer tick once due (§4.4a).
    holding: VecDeque<ReadyEntry>,
    current_inflight: u32,
}

/// Tunables for one `TaskEngine` instance (§6, one per `engine_track`).
#[derive(Debug, Clone)]
pub struct TaskEngineConfig {
    pub engine_track: String,
    pub max_concurrent: u32,
    pub max_retry: u32,
    pub base_retry_delay_secs: i64,
    pub max_retry_delay_secs: i64,
    pub poll_interval: Duration,
    pub consumer_idle_interval: Duration,
    pub monitor_interval: Duration,
    pub transport_error_backoff: Duration,
}

impl Default for TaskEngineConfig {
    fn default() -> Self {
        Self {
            engine_track: "api".to_string(),
            max_concurrent: 50,
            max_retry: crate::domain::models::MAX_RETRY,
            base_retry_delay_secs: crate::domain::models::BASE_RETRY_DELAY_SECS,
            max_retry_delay_secs: crate::domain::models::MAX_RETRY_DELAY_SECS,
            poll_interval: Duration::from_secs(3),
            consumer_idle_interval: Duration::from_millis(500),
            monitor_interval: Duration::from_secs(2),
            transport_error_backoff: Duration::from_secs(10),
        }
    }
}

/// The task lifecycle engine (§C6): one instance per configured `engine_track`.
pub struct TaskEngine {
    config: TaskEngineConfig,
    mission_repo: Arc<dyn MissionRepository>,
    item_repo: Arc<dyn ItemRepository>,
    platform_manager: Arc<PlatformManager>,
    queue: Mutex<QueueState>,
    running_tasks: Mutex<HashMap<(i64, i64), JoinHandle<()>>>,
    monitored_missions: Mutex<HashSet<i64>>,
    shutdown: ShutdownToken,
}

impl TaskEngine {
    #[must_use]
    pub fn new(
        config: TaskEngineConfig,
        mission_repo: Arc<dyn MissionRepository>,
        item_repo: Arc<dyn ItemRepository>,
        platform_manager: Arc<PlatformManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            mission_repo,
            item_repo,
            platform_manager,
            queue: Mutex::new(QueueState {
                ready: VecDeque::new(),
                holding: VecDeque::new(),
                current_inflight: 0,
            }),
            running_tasks: Mutex::new(HashMap::new()),
            monitored_missions: Mutex::new(HashSet::new()),
            shutdown: ShutdownToken::new(),
        })
    }

    #[must_use]
    pub fn engine_track(&self) -> &str {
        &self.config.engine_track
    }

    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Pushes one item onto the ready queue. Used by the Mission Facade (new
    /// missions), the Scheduler (due missions), and the Retry Checker (due
    /// backoffs).
    pub async fn enqueue_item(&self, mission_id: i64, item_id: i64) {
        let mut queue = self.queue.lock().await;
        queue.ready.push_back(ReadyEntry { mission_id, item_id });
    }

    /// Enqueues every `pending` item of a mission — the Scheduler's "enqueue all
    /// pending items of mission" primitive (§4.7), also used by `retry_mission`.
    ///
    /// # Errors
    /// Returns `BrokerError` if the item list can't be read.
    pub async fn enqueue_pending_items_of_mission(&self, mission_id: i64) -> Result<usize, BrokerError> {
        let items = self.item_repo.list_pending_for_mission(mission_id).await?;
        let count = items.len();
        for item in items {
            self.enqueue_item(mission_id, item.id).await;
        }
        Ok(count)
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let queue = self.queue.lock().await;
        let running = self.running_tasks.lock().await;
        QueueStatus {
            queue_length: queue.ready.len() + queue.holding.len(),
            running_tasks: running.len(),
            current_inflight: queue.current_inflight,
            max_concurrent: self.config.max_concurrent,
        }
    }

    /// Crash recovery (§4.4e). Must run once, before [`Self::run_consumer_loop`].
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store can't be read during any recovery step.
    pub async fn recover(self: &Arc<Self>) -> Result<(), BrokerError> {
        let track = self.engine_track().to_string();

        let recoverable_pending = self.item_repo.list_recoverable_pending(&track).await?;
        for item in &recoverable_pending {
            self.enqueue_item(item.mission_id, item.id).await;
        }
        tracing::info!(engine_track = %track, count = recoverable_pending.len(), "recovered pending items onto ready queue");

        let recoverable_processing = self.item_repo.list_recoverable_processing(&track).await?;
        for item in &recoverable_processing {
            self.credit_inflight().await;
            self.spawn_polling_worker(item.mission_id, item.id).await;
        }
        tracing::info!(engine_track = %track, count = recoverable_processing.len(), "resumed polling workers for in-flight items");

        let nonterminal_missions = self.mission_repo.list_with_nonterminal_items(&track).await?;
        for mission in &nonterminal_missions {
            if mission.status == MissionStatus::Queued {
                self.mission_repo.update_status(mission.id, MissionStatus::Running).await?;
            }
            if matches!(mission.status, MissionStatus::Queued | MissionStatus::Running) {
                self.spawn_completion_monitor(mission.id);
            }
        }

        Ok(())
    }

    async fn credit_inflight(&self) {
        let mut queue = self.queue.lock().await;
        queue.current_inflight += 1;
    }

    async fn release_inflight(&self) {
        let mut queue = self.queue.lock().await;
        queue.current_inflight = queue.current_inflight.saturating_sub(1);
    }

    /// The consumer loop (§4.4a). Runs until [`Self::stop`] is called.
    pub async fn run_consumer_loop(self: &Arc<Self>) {
        tracing::info!(engine_track = self.engine_track(), "consumer loop starting");
        while !self.shutdown.is_cancelled() {
            let admitted = self.drain_one_ready_entry().await;
            if !admitted {
                tokio::time::sleep(self.config.consumer_idle_interval).await;
            }
        }
        tracing::info!(engine_track = self.engine_track(), "consumer loop stopped");
    }

    /// Pops and admits at most one item this tick. Returns whether an item was
    /// handed to the submission path (used to decide whether to idle-sleep).
    async fn drain_one_ready_entry(self: &Arc<Self>) -> bool {
        let now = Utc::now();
        let entry = {
            let mut queue = self.queue.lock().await;

            // Drain anything in the holding deque whose backoff has since elapsed
            // back onto the front of the ready queue (§4.4a).
            let held: VecDeque<ReadyEntry> = queue.holding.drain(..).collect();
            for h in held.into_iter().rev() {
                queue.ready.push_front(h);
            }

            if queue.current_inflight >= self.config.max_concurrent {
                return false;
            }
            queue.ready.pop_front()
        };

        let Some(entry) = entry else { return false };

        let item = match self.item_repo.get(entry.item_id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(item_id = entry.item_id, error = %e, "failed to read item while draining ready queue");
                return false;
            }
        };
        let Some(item) = item else { return false };

        if item.status != ItemStatus::Pending {
            // Already handled by another path (cancelled, already processing, etc).
            return false;
        }

        if !item.retry_is_due(now) {
            let mut queue = self.queue.lock().await;
            queue.holding.push_back(entry);
            return false;
        }

        {
            let mut queue = self.queue.lock().await;
            queue.current_inflight += 1;
        }

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            engine.submit_item(entry.mission_id, entry.item_id).await;
        });
        let mut running = self.running_tasks.lock().await;
        running.insert((entry.mission_id, entry.item_id), handle);

        true
    }

    /// The submission path (§4.4b).
    async fn submit_item(self: Arc<Self>, mission_id: i64, item_id: i64) {
        macro_rules! bail {
            () => {{
                self.release_inflight().await;
                self.running_tasks.lock().await.remove(&(mission_id, item_id));
                return;
            }};
        }

        let mission = match self.mission_repo.get(mission_id).await {
            Ok(Some(m)) => m,
            Ok(None) => bail!(),
            Err(e) => {
                tracing::warn!(mission_id, error = %e, "failed to read mission during submission");
                bail!();
            }
        };

        if mission.status == MissionStatus::Cancelled {
            bail!();
        }

        if mission.status == MissionStatus::Queued {
            if let Err(e) = self.mission_repo.update_status(mission_id, MissionStatus::Running).await {
                tracing::warn!(mission_id, error = %e, "failed to transition mission to running");
            }
            self.spawn_completion_monitor(mission_id);
        }

        let mut item = match self.item_repo.get(item_id).await {
            Ok(Some(i)) => i,
            Ok(None) => bail!(),
            Err(e) => {
                tracing::warn!(item_id, error = %e, "failed to read item during submission");
                bail!();
            }
        };

        if item.status != ItemStatus::Pending {
            bail!();
        }

        let merged_params = mission.fixed_config.merged_with(&item.input_params);

        let outcome = self
            .platform_manager
            .submit(item_id, mission.task_kind, &merged_params, mission.model_id.as_deref())
            .await;

        match outcome {
            Ok(SubmissionOutcome::Submitted { .. }) => {
                // The Platform Manager already persisted `processing` + ids on the
                // item row. Hand off to a polling worker; inflight stays charged
                // until that worker reaches a terminal outcome.
                self.running_tasks.lock().await.remove(&(mission_id, item_id));
                self.spawn_polling_worker(mission_id, item_id).await;
            }
            Ok(SubmissionOutcome::Failed(adapter_err)) => {
                item.apply_retry_or_fail_with(
                    adapter_err.to_string(),
                    self.config.max_retry,
                    self.config.base_retry_delay_secs,
                    self.config.max_retry_delay_secs,
                );
                let became_failed = item.status == ItemStatus::Failed;
                if let Err(e) = self.item_repo.save(&item).await {
                    tracing::warn!(item_id, error = %e, "failed to persist retry/fail decision after submission error");
                }
                if became_failed {
                    if let Err(e) = self.mission_repo.increment_counters(mission_id, 0, 1).await {
                        tracing::warn!(mission_id, error = %e, "failed to increment failed counter");
                    }
                }
                bail!();
            }
            Err(e) => {
                tracing::warn!(item_id, error = %e, "local error while submitting item, leaving pending for retry checker");
                bail!();
            }
        }
    }

    /// The polling worker (§4.4c): one per in-flight item, polling until a terminal
    /// outcome or shutdown/cancellation.
    async fn spawn_polling_worker(self: &Arc<Self>, mission_id: i64, item_id: i64) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            engine.poll_until_terminal(mission_id, item_id).await;
        });
        self.running_tasks.lock().await.insert((mission_id, item_id), handle);
    }

    async fn poll_until_terminal(self: Arc<Self>, mission_id: i64, item_id: i64) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let mission = match self.mission_repo.get(mission_id).await {
                Ok(Some(m)) => m,
                Ok(None) => return self.finish_polling(mission_id, item_id).await,
                Err(e) => {
                    tracing::warn!(mission_id, error = %e, "failed to read mission while polling");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };
            if mission.status == MissionStatus::Cancelled {
                return self.finish_polling(mission_id, item_id).await;
            }

            let mut item = match self.item_repo.get(item_id).await {
                Ok(Some(i)) => i,
                Ok(None) => return self.finish_polling(mission_id, item_id).await,
                Err(e) => {
                    tracing::warn!(item_id, error = %e, "failed to read item while polling");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };
            if item.status.is_terminal() {
                return self.finish_polling(mission_id, item_id).await;
            }

            let (Some(platform_id), Some(platform_task_id)) = (item.platform_id.clone(), item.platform_task_id.clone()) else {
                tracing::warn!(item_id, "processing item missing platform ids, abandoning poll");
                return self.finish_polling(mission_id, item_id).await;
            };
            let Some(adapter) = self.platform_manager.get_adapter(&platform_id) else {
                tracing::warn!(item_id, platform_id = %platform_id, "no adapter registered for platform id recorded on item");
                return self.finish_polling(mission_id, item_id).await;
            };

            match adapter.query(&platform_task_id).await {
                Ok(outcome) => match outcome.status {
                    RemoteJobStatus::Success => {
                        let result_url = extract_result_url(outcome.raw_result.as_ref());
                        match result_url {
                            Some(url) => {
                                item.mark_completed(url);
                                if let Err(e) = self.item_repo.save(&item).await {
                                    tracing::warn!(item_id, error = %e, "failed to persist completed item");
                                }
                                if let Err(e) = self.mission_repo.increment_counters(mission_id, 1, 0).await {
                                    tracing::warn!(mission_id, error = %e, "failed to increment completed counter");
                                }
                            }
                            None => {
                                item.apply_retry_or_fail_with(
                                    "provider reported success with no extractable result url",
                                    self.config.max_retry,
                                    self.config.base_retry_delay_secs,
                                    self.config.max_retry_delay_secs,
                                );
                                self.persist_retry_outcome(mission_id, &item).await;
                            }
                        }
                        return self.finish_polling(mission_id, item_id).await;
                    }
                    RemoteJobStatus::Failed => {
                        item.apply_retry_or_fail_with(
                            outcome.error.unwrap_or_else(|| "provider reported failure".to_string()),
                            self.config.max_retry,
                            self.config.base_retry_delay_secs,
                            self.config.max_retry_delay_secs,
                        );
                        self.persist_retry_outcome(mission_id, &item).await;
                        return self.finish_polling(mission_id, item_id).await;
                    }
                    RemoteJobStatus::Pending | RemoteJobStatus::Queued | RemoteJobStatus::Running => {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                },
                Err(AdapterError::Transport(msg)) => {
                    tracing::debug!(item_id, error = %msg, "transport error while polling, retrying after backoff");
                    tokio::time::sleep(self.config.transport_error_backoff).await;
                }
                Err(e @ (AdapterError::Rejected(_) | AdapterError::Unsupported(_))) => {
                    item.apply_retry_or_fail_with(
                        e.to_string(),
                        self.config.max_retry,
                        self.config.base_retry_delay_secs,
                        self.config.max_retry_delay_secs,
                    );
                    self.persist_retry_outcome(mission_id, &item).await;
                    return self.finish_polling(mission_id, item_id).await;
                }
            }
        }
    }

    async fn persist_retry_outcome(&self, mission_id: i64, item: &crate::domain::models::Item) {
        if let Err(e) = self.item_repo.save(item).await {
            tracing::warn!(item_id = item.id, error = %e, "failed to persist retry/fail decision after poll");
        }
        if item.status == ItemStatus::Failed {
            if let Err(e) = self.mission_repo.increment_counters(mission_id, 0, 1).await {
                tracing::warn!(mission_id, error = %e, "failed to increment failed counter");
            }
        }
    }

    /// Releases the inflight slot charged at submission time and removes the
    /// worker's own handle entry. Called exactly once per polling worker, on every
    /// path that ends the poll (terminal outcome, abandoned item, or the mission/item
    /// disappearing out from under it).
    async fn finish_polling(&self, mission_id: i64, item_id: i64) {
        self.release_inflight().await;
        self.running_tasks.lock().await.remove(&(mission_id, item_id));
    }

    /// The completion monitor (§4.4d): one per running mission, watching for every
    /// item to reach a terminal state.
    fn spawn_completion_monitor(self: &Arc<Self>, mission_id: i64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut monitored = engine.monitored_missions.lock().await;
                if !monitored.insert(mission_id) {
                    return;
                }
            }
            engine.watch_mission_completion(mission_id).await;
            engine.monitored_missions.lock().await.remove(&mission_id);
        });
    }

    async fn watch_mission_completion(&self, mission_id: i64) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            tokio::time::sleep(self.config.monitor_interval).await;

            let mission = match self.mission_repo.get(mission_id).await {
                Ok(Some(m)) => m,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(mission_id, error = %e, "failed to read mission in completion monitor");
                    continue;
                }
            };
            if mission.status.is_terminal() {
                return;
            }

            let nonterminal = match self.item_repo.count_nonterminal(mission_id).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(mission_id, error = %e, "failed to count nonterminal items");
                    continue;
                }
            };
            if nonterminal > 0 {
                continue;
            }

            let final_status = if mission.failed >= mission.total && mission.total > 0 {
                MissionStatus::Failed
            } else {
                MissionStatus::Completed
            };
            if let Err(e) = self.mission_repo.update_status(mission_id, final_status).await {
                tracing::warn!(mission_id, error = %e, "failed to persist final mission status");
            }
            return;
        }
    }
}

/// Interprets a provider's raw success payload into a single result URL (§9 Open
/// Question resolution: all four response shapes observed in the wild are tried, in
/// the spec-mandated order): an array of strings, an array of `{"url": "..."}`
/// objects, `{"data": {"fileUrl": "..."}}`, then `{"result": {"fileUrl": "..."}}`.
/// Takes the first non-empty candidate within each shape.
fn extract_result_url(raw: Option<&serde_json::Value>) -> Option<String> {
    let value = raw?;

    if let Some(arr) = value.as_array() {
        let from_strings = arr
            .iter()
            .find_map(serde_json::Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(url) = from_strings {
            return Some(url.to_string());
        }

        let from_objects = arr
            .iter()
            .find_map(|e| e.get("url").and_then(serde_json::Value::as_str))
            .filter(|s| !s.is_empty());
        if let Some(url) = from_objects {
            return Some(url.to_string());
        }
    }

    if let Some(url) = value
        .get("data")
        .and_then(|d| d.get("fileUrl"))
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return Some(url.to_string());
    }

    if let Some(url) = value
        .get("result")
        .and_then(|r| r.get("fileUrl"))
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return Some(url.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;
    use crate::domain::models::{ParamMap, TaskKind};
    use crate::domain::ports::adapter::PlatformAdapter;
    use crate::domain::ports::store::{MissionRepository as _, NewItem, NewMission};
    use crate::infrastructure::database::sqlite::{SqliteItemRepository, SqliteMissionRepository};
    use crate::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};
    use std::time::Duration as StdDuration;

    #[test]
    fn extract_result_url_tries_every_documented_shape_in_order() {
        // array of strings
        assert_eq!(
            extract_result_url(Some(&serde_json::json!(["https://a", "https://b"]))),
            Some("https://a".to_string())
        );
        // array of {"url": ...} objects
        assert_eq!(
            extract_result_url(Some(&serde_json::json!([{"url": "https://c"}]))),
            Some("https://c".to_string())
        );
        // data.fileUrl
        assert_eq!(
            extract_result_url(Some(&serde_json::json!({"data": {"fileUrl": "https://d"}}))),
            Some("https://d".to_string())
        );
        // result.fileUrl
        assert_eq!(
            extract_result_url(Some(&serde_json::json!({"result": {"fileUrl": "https://e"}}))),
            Some("https://e".to_string())
        );
        assert_eq!(extract_result_url(Some(&serde_json::json!({"nothing": true}))), None);
        assert_eq!(extract_result_url(None), None);
    }

    async fn setup(max_concurrent: u32, failure_rate: f64) -> (Arc<TaskEngine>, i64, Vec<i64>) {
        let pool = create_test_pool().await.expect("pool");
        Migrator::new(&pool).run_embedded_migrations(all_embedded_migrations()).await.expect("migrations");

        let mission_repo: Arc<dyn MissionRepository> = Arc::new(SqliteMissionRepository::new(pool.clone()));
        let item_repo: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));

        let mission_id = mission_repo
            .create_with_items(
                NewMission {
                    name: "m".into(),
                    description: None,
                    task_kind: TaskKind::TextToImage,
                    model_id: None,
                    fixed_config: ParamMap::new(),
                    status: MissionStatus::Queued,
                    engine_track: "api".into(),
                    scheduled_time: None,
                },
                vec![
                    NewItem { item_index: 0, input_params: ParamMap::new() },
                    NewItem { item_index: 1, input_params: ParamMap::new() },
                ],
            )
            .await
            .unwrap();
        let items = item_repo.list_by_mission(mission_id).await.unwrap();
        let item_ids: Vec<i64> = items.iter().map(|i| i.id).collect();

        let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::new("mock-a", 0, failure_rate, None));
        let platform_manager = Arc::new(PlatformManager::new(vec![mock], "mock-a", item_repo.clone()).unwrap());

        let mut config = TaskEngineConfig::default();
        config.max_concurrent = max_concurrent;
        config.poll_interval = StdDuration::from_millis(5);
        config.monitor_interval = StdDuration::from_millis(5);
        config.consumer_idle_interval = StdDuration::from_millis(5);

        let engine = TaskEngine::new(config, mission_repo, item_repo, platform_manager);
        (engine, mission_id, item_ids)
    }

    #[tokio::test]
    async fn enqueue_then_drain_submits_item() {
        let (engine, mission_id, item_ids) = setup(10, 0.0).await;
        engine.enqueue_item(mission_id, item_ids[0]).await;
        let admitted = engine.drain_one_ready_entry().await;
        assert!(admitted);
        let status = engine.queue_status().await;
        assert_eq!(status.current_inflight, 1);
    }

    #[tokio::test]
    async fn consumer_loop_drives_mission_to_completion() {
        let (engine, mission_id, item_ids) = setup(10, 0.0).await;
        for id in &item_ids {
            engine.enqueue_item(mission_id, *id).await;
        }

        let loop_engine = Arc::clone(&engine);
        let handle = tokio::spawn(async move { loop_engine.run_consumer_loop().await });

        let mut settled = false;
        for _ in 0..200 {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            let mission = engine.mission_repo.get(mission_id).await.unwrap().unwrap();
            if mission.status == MissionStatus::Completed {
                settled = true;
                break;
            }
        }
        engine.stop();
        let _ = handle.await;
        assert!(settled, "mission did not reach completed within the test window");
    }

    #[tokio::test]
    async fn queue_status_reflects_holding_entries_in_length() {
        let (engine, mission_id, item_ids) = setup(10, 0.0).await;
        {
            let mut item = engine.item_repo.get(item_ids[0]).await.unwrap().unwrap();
            item.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(60));
            engine.item_repo.save(&item).await.unwrap();
        }
        engine.enqueue_item(mission_id, item_ids[0]).await;
        let admitted = engine.drain_one_ready_entry().await;
        assert!(!admitted);
        let status = engine.queue_status().await;
        assert_eq!(status.queue_length, 1);
        assert_eq!(status.current_inflight, 0);
    }
}
