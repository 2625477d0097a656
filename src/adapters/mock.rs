//! Deterministic mock `PlatformAdapter` (§4.2 implementation notes).
//!
//! Used for tests and local operation when `USE_MOCK` is set. Task ids are assigned
//! from a monotonic counter, and each task's eventual outcome (success vs. simulated
//! failure) is decided once, at submit time, from a hash of its own id rather than
//! any source of randomness — so replaying the same persisted state file after a
//! restart reproduces exactly the same outcomes (R1, S5).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::error::AdapterError;
use crate::domain::models::TaskKind;
use crate::domain::ports::adapter::{PlatformAdapter, QueryOutcome, RemoteJobStatus, SubmitOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockTaskRecord {
    submitted_at: DateTime<Utc>,
    will_fail: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MockState {
    next_id: u64,
    tasks: std::collections::HashMap<String, MockTaskRecord>,
}

/// A deterministic stand-in for a real generative-media provider.
///
/// `completion_delay` is how long a submitted task takes (simulated) to reach a
/// terminal state; `failure_rate` is the fraction (`0.0..=1.0`) of tasks that
/// deterministically resolve to `FAILED` rather than `SUCCESS`.
pub struct MockAdapter {
    platform_id: String,
    completion_delay: chrono::Duration,
    failure_rate: f64,
    supported_kinds: HashSet<TaskKind>,
    state_path: Option<PathBuf>,
    state: Mutex<MockState>,
}

impl MockAdapter {
    /// Builds a mock adapter supporting every task kind, loading any
    /// previously-persisted task state from `state_path` if it exists (enabling
    /// end-to-end restart tests, S5).
    #[must_use]
    pub fn new(platform_id: impl Into<String>, completion_delay_secs: i64, failure_rate: f64, state_path: Option<PathBuf>) -> Self {
        Self::with_supported_kinds(
            platform_id,
            completion_delay_secs,
            failure_rate,
            state_path,
            [TaskKind::TextToImage, TaskKind::ImageToImage, TaskKind::TextToVideo, TaskKind::ImageToVideo]
                .into_iter()
                .collect(),
        )
    }

    /// Builds a mock adapter restricted to `supported_kinds`, for exercising the
    /// Platform Manager's multi-adapter routing path with distinct `mock-a`/`mock-b`
    /// ids that each only handle part of the task-kind space.
    #[must_use]
    pub fn with_supported_kinds(
        platform_id: impl Into<String>,
        completion_delay_secs: i64,
        failure_rate: f64,
        state_path: Option<PathBuf>,
        supported_kinds: HashSet<TaskKind>,
    ) -> Self {
        let state = state_path
            .as_deref()
            .and_then(Self::load_state)
            .unwrap_or_default();
        Self {
            platform_id: platform_id.into(),
            completion_delay: chrono::Duration::seconds(completion_delay_secs),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            supported_kinds,
            state_path,
            state: Mutex::new(state),
        }
    }

    fn load_state(path: &Path) -> Option<MockState> {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn persist(&self, state: &MockState) {
        let Some(path) = &self.state_path else { return };
        let Ok(json) = serde_json::to_string_pretty(state) else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, json) {
            tracing::warn!(platform_id = %self.platform_id, error = %e, "failed to persist mock adapter state");
        }
    }

    /// Deterministic pass/fail decision from the task id's hash, so the outcome is
    /// stable across a process restart that replays the same persisted state.
    fn decide_outcome(&self, task_id: &str) -> bool {
        if self.failure_rate <= 0.0 {
            return false;
        }
        if self.failure_rate >= 1.0 {
            return true;
        }
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in task_id.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
        let bucket = hash % 10_000;
        let threshold = (self.failure_rate * 10_000.0) as u64;
        bucket < threshold
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    fn supported_task_kinds(&self) -> HashSet<TaskKind> {
        self.supported_kinds.clone()
    }

    async fn submit(
        &self,
        task_kind: TaskKind,
        _params: &crate::domain::models::ParamMap,
        _model_id: Option<&str>,
    ) -> Result<SubmitOutcome, AdapterError> {
        if !self.supported_task_kinds().contains(&task_kind) {
            return Err(AdapterError::Unsupported(format!(
                "{} does not support {}",
                self.platform_id,
                task_kind.as_str()
            )));
        }

        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let task_id = format!("{}-{id}", self.platform_id);

        let will_fail = self.decide_outcome(&task_id);
        state.tasks.insert(
            task_id.clone(),
            MockTaskRecord { submitted_at: Utc::now(), will_fail },
        );
        self.persist(&state);

        Ok(SubmitOutcome { platform_task_id: task_id })
    }

    async fn query(&self, platform_task_id: &str) -> Result<QueryOutcome, AdapterError> {
        let state = self.state.lock().await;
        let Some(record) = state.tasks.get(platform_task_id) else {
            return Ok(QueryOutcome {
                status: RemoteJobStatus::Failed,
                raw_result: None,
                error: Some(format!("mock adapter has no record of task {platform_task_id}")),
            });
        };

        let elapsed = Utc::now() - record.submitted_at;
        if elapsed < self.completion_delay / 3 {
            return Ok(QueryOutcome { status: RemoteJobStatus::Pending, raw_result: None, error: None });
        }
        if elapsed < self.completion_delay * 2 / 3 {
            return Ok(QueryOutcome { status: RemoteJobStatus::Queued, raw_result: None, error: None });
        }
        if elapsed < self.completion_delay {
            return Ok(QueryOutcome { status: RemoteJobStatus::Running, raw_result: None, error: None });
        }

        if record.will_fail {
            Ok(QueryOutcome {
                status: RemoteJobStatus::Failed,
                raw_result: None,
                error: Some("mock: simulated provider failure".to_string()),
            })
        } else {
            let url = format!("https://mock.local/results/{platform_task_id}.bin");
            Ok(QueryOutcome {
                status: RemoteJobStatus::Success,
                raw_result: Some(serde_json::json!([url])),
                error: None,
            })
        }
    }
}
