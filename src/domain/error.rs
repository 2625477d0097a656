//! Domain error types for the task broker.
//!
//! Two hierarchies, matching the recovery policies in spec §7: `BrokerError` for
//! local errors (store/config/validation/serialization), and `AdapterError` for the
//! two provider-facing error kinds (transient vs. terminal).

use thiserror::Error;

/// Errors surfaced by the Store, configuration loading, and mission validation.
///
/// This is the spec's "Local error" kind (§7.3): logged by the caller, never
/// propagated as a panic. Every fallible Store/Facade operation returns this type.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A value failed to (de)serialize to/from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A mission or item id did not resolve to a row.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mission-creation request failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// A mission or item state transition was attempted that the state machine
    /// forbids.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// The platform registry has no adapter for the requested id, or construction
    /// left the registry empty.
    #[error("platform adapter error: {0}")]
    Adapter(String),
}

/// A convenience alias for fallible broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors a [`crate::domain::ports::adapter::PlatformAdapter`] returns from `submit`
/// or `query`.
///
/// The two variants carry different recovery policies (§7.1/§7.2): `Transport`
/// retries indefinitely on poll and counts toward `retry_count` on submit;
/// `Rejected` always counts toward `retry_count` until the item is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// A transient failure: network error, HTTP 5xx, or a provider outage. Never
    /// counts against `retry_count` when encountered while polling.
    #[error("transient provider error: {0}")]
    Transport(String),

    /// A terminal failure: HTTP 4xx on submit, or the provider's own `FAILED`
    /// status with a message. Counts against `retry_count`.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The adapter has no support for the requested `(task_kind, model_id)`
    /// combination.
    #[error("unsupported task kind/model combination: {0}")]
    Unsupported(String),
}
