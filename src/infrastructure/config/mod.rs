//! Configuration (§4.9 ambient stack, §6 config keys).

pub mod loader;
pub mod settings;

pub use loader::{ConfigError, ConfigLoader};
pub use settings::Config;
