//! mediabroker — a batch generative-media task broker.
//!
//! Accepts missions (named batches of generation requests against one provider,
//! model, and task kind), dispatches their items to a configured platform adapter
//! under a per-track concurrency cap, polls in-flight jobs to completion, and
//! retries transient failures with exponential backoff.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
