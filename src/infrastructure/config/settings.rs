use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LogConfig;

/// Every tunable named in §6's config table, plus the logging settings (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file (`DATABASE_PATH`).
    pub database_path: String,

    /// Concurrency cap for the `api` engine track (`MAX_CONCURRENT_API`).
    pub max_concurrent_api: u32,

    /// Concurrency cap for the `app` engine track (`MAX_CONCURRENT_APP`).
    pub max_concurrent_app: u32,

    /// Maximum retry attempts before an item is marked permanently failed
    /// (`MAX_RETRY`).
    pub max_retry: u32,

    /// Base delay, in seconds, for the exponential backoff formula
    /// (`BASE_RETRY_DELAY`).
    pub base_retry_delay_secs: i64,

    /// Ceiling on the exponential backoff delay, in seconds (`MAX_RETRY_DELAY`).
    pub max_retry_delay_secs: i64,

    /// Polling worker tick interval, in seconds (`POLL_INTERVAL`).
    pub poll_interval_secs: u64,

    /// Retry Checker sweep interval, in seconds (`RETRY_CHECK_INTERVAL`).
    pub retry_check_interval_secs: u64,

    /// Scheduler sweep interval, in seconds (`SCHEDULER_CHECK_INTERVAL`).
    pub scheduler_check_interval_secs: u64,

    /// When true, the Platform Manager registers only mock adapters regardless of
    /// which provider API keys are configured (`USE_MOCK`).
    pub use_mock: bool,

    /// Logging configuration.
    pub logging: LogConfig,

    /// Provider API keys, keyed by lowercased provider name (e.g. `"replicate"` for
    /// `REPLICATE_API_KEY`). Populated by `ConfigLoader` from the process
    /// environment directly since the set of providers isn't known statically; never
    /// read from the YAML config file.
    #[serde(skip)]
    pub provider_api_keys: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "mediabroker.db".to_string(),
            max_concurrent_api: 50,
            max_concurrent_app: 2,
            max_retry: 7,
            base_retry_delay_secs: 60,
            max_retry_delay_secs: 3600,
            poll_interval_secs: 3,
            retry_check_interval_secs: 10,
            scheduler_check_interval_secs: 10,
            use_mock: false,
            logging: LogConfig::default(),
            provider_api_keys: HashMap::new(),
        }
    }
}

impl Config {
    /// Looks up a provider's API key by its task-kind/platform name, lowercased.
    #[must_use]
    pub fn provider_api_key(&self, provider: &str) -> Option<&str> {
        self.provider_api_keys
            .get(&provider.to_lowercase())
            .map(String::as_str)
    }
}
