//! Structured logging (§4.9 ambient stack).

pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::{init, parse_log_level, LoggerHandle};
pub use secret_scrubbing::{scrub_message, SecretScrubbingLayer};
