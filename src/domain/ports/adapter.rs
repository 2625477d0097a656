//! Platform adapter port (§4.2, §C2): the narrow interface every generative-media
//! provider implementation is built against.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::AdapterError;
use crate::domain::models::{ParamMap, TaskKind};

/// The provider's reported job status (§4.2 `query`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteJobStatus {
    Pending,
    Queued,
    Running,
    Success,
    Failed,
}

/// Outcome of `PlatformAdapter::submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub platform_task_id: String,
}

/// Outcome of `PlatformAdapter::query`. `raw_result` carries the provider's
/// unnormalized success payload; the Task Engine's result-URL extraction helper
/// (§4.2 implementation notes) interprets its shape, not the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub status: RemoteJobStatus,
    pub raw_result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Contract every generative-media provider implementation must satisfy (§4.2).
///
/// `submit`/`query` return `Result<_, AdapterError>` rather than raising — the spec's
/// "exception-for-control-flow in submit path" re-architecture note (§9) — so the
/// Task Engine can make its retry decision from an ordinary `match` instead of a
/// caught panic.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// A stable identifier for this adapter instance (e.g. `"mock-a"`), used as the
    /// `platform_id` recorded on an item row.
    fn platform_id(&self) -> &str;

    /// Task kinds this adapter can serve.
    fn supported_task_kinds(&self) -> HashSet<TaskKind>;

    /// Normalizes a provider-agnostic parameter map into whatever shape this
    /// provider's wire format expects. A pure transform; the identity function is a
    /// valid implementation.
    fn normalize_params(&self, task_kind: TaskKind, params: &ParamMap) -> ParamMap {
        let _ = task_kind;
        params.clone()
    }

    /// Submits a job. Returns `AdapterError::Unsupported` for an unsupported
    /// `(task_kind, model_id)` combination, `AdapterError::Rejected` for an HTTP 4xx
    /// or similar terminal failure, `AdapterError::Transport` for a 5xx/network
    /// failure.
    async fn submit(
        &self,
        task_kind: TaskKind,
        params: &ParamMap,
        model_id: Option<&str>,
    ) -> Result<SubmitOutcome, AdapterError>;

    /// Polls a previously submitted job. Transport errors are modeled as
    /// `Err(AdapterError::Transport(_))`; everything else (including `FAILED`) is an
    /// `Ok(QueryOutcome)` — a provider declaring a job failed is not itself a
    /// transport-level error.
    async fn query(&self, platform_task_id: &str) -> Result<QueryOutcome, AdapterError>;
}
