//! Hierarchical config loading: built-in defaults, then an optional YAML file, then
//! `MEDIABROKER_`-prefixed environment variables, each layer overriding the last.
//! Grounded on the defaults-then-file-then-env merge order the teacher's own config
//! loader uses, generalized to this crate's own settings.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::settings::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Builds a `Config` from defaults, an optional YAML file, and the environment.
pub struct ConfigLoader {
    yaml_path: Option<PathBuf>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self { yaml_path: None }
    }

    /// Sets the YAML config file path. Missing files are silently skipped (`Yaml`'s
    /// provider already tolerates a nonexistent path); an invalid file is an error.
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.yaml_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the YAML file exists but fails to parse, or if
    /// an environment variable can't be coerced into its field's type.
    /// Returns `ConfigError::Invalid` if the loaded values fail `validate`.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = &self.yaml_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("MEDIABROKER_").split("__"));

        let mut config: Config = figment.extract()?;
        config.provider_api_keys = collect_provider_api_keys();

        validate(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Scans the process environment for `<PROVIDER>_API_KEY` variables and returns them
/// keyed by lowercased provider name. These are intentionally read straight from
/// `std::env` rather than through `figment`'s prefixed-env provider, since the set of
/// provider names is open-ended and not a fixed struct field.
fn collect_provider_api_keys() -> std::collections::HashMap<String, String> {
    std::env::vars()
        .filter_map(|(key, value)| {
            let provider = key.strip_suffix("_API_KEY")?;
            if provider.is_empty() || provider.starts_with("MEDIABROKER") {
                return None;
            }
            Some((provider.to_lowercase(), value))
        })
        .collect()
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Invalid("database_path must not be empty".into()));
    }
    if config.max_concurrent_api == 0 {
        return Err(ConfigError::Invalid("max_concurrent_api must be > 0".into()));
    }
    if config.max_concurrent_app == 0 {
        return Err(ConfigError::Invalid("max_concurrent_app must be > 0".into()));
    }
    if config.max_retry == 0 {
        return Err(ConfigError::Invalid("max_retry must be > 0".into()));
    }
    if config.base_retry_delay_secs <= 0 {
        return Err(ConfigError::Invalid("base_retry_delay_secs must be > 0".into()));
    }
    if config.max_retry_delay_secs < config.base_retry_delay_secs {
        return Err(ConfigError::Invalid(
            "max_retry_delay_secs must be >= base_retry_delay_secs".into(),
        ));
    }
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid("poll_interval_secs must be > 0".into()));
    }
    crate::infrastructure::logging::parse_log_level(&config.logging.level)
        .map_err(|e| ConfigError::Invalid(format!("logging.level: {e}")))?;
    Ok(())
}
