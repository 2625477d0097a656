//! Domain layer: mission/item models, ports, and the error hierarchy.
//!
//! Contains core business logic and domain models. This layer has no dependency on
//! `sqlx`, `tokio`, or any other infrastructure crate beyond `serde`/`chrono`.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{AdapterError, BrokerError, BrokerResult};
