//! Structured logging setup (§4.9 ambient stack: logging).
//!
//! Builds a `tracing_subscriber::Registry` with a stdout layer and, if `log_dir` is
//! set, a file layer using `tracing-appender`'s rolling writer. Both layers format
//! through the same secret-scrubbing filter so a stray `{api_key}` in a submit-path
//! log line never reaches a sink verbatim.

use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer as _};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::config::{LogConfig, LogFormat, RotationPolicy};
use super::secret_scrubbing::SecretScrubbingLayer;

/// Holds the non-blocking file appender's flush guard. Must be kept alive for the
/// lifetime of the process — dropping it stops log flushing.
pub struct LoggerHandle {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global `tracing` subscriber from `config`. Must be called exactly
/// once, before any other component emits a log. Returns a handle that must be held
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if `config.level` does not parse as a `tracing::Level`, or if the
/// global subscriber was already installed.
pub fn init(config: &LogConfig) -> Result<LoggerHandle, anyhow::Error> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (file_layer, file_guard) = if let Some(dir) = &config.log_dir {
        let file_appender = match config.rotation {
            RotationPolicy::Daily => tracing_appender::rolling::daily(dir, "mediabroker.log"),
            RotationPolicy::Hourly => tracing_appender::rolling::hourly(dir, "mediabroker.log"),
            RotationPolicy::Never => tracing_appender::rolling::never(dir, "mediabroker.log"),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = build_fmt_layer(config.format, non_blocking, false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let stdout_layer = config
        .enable_stdout
        .then(|| build_fmt_layer(config.format, std::io::stdout, true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(SecretScrubbingLayer)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggerHandle {
        _file_guard: file_guard,
    })
}

fn build_fmt_layer<S, W>(
    format: LogFormat,
    writer: W,
    ansi: bool,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    }
}

/// Parses a log level string, defaulting to `info` on empty input.
///
/// # Errors
///
/// Returns an error if `level` is non-empty and not a recognized `tracing::Level`.
pub fn parse_log_level(level: &str) -> Result<Level, anyhow::Error> {
    if level.trim().is_empty() {
        return Ok(Level::INFO);
    }
    Level::from_str(level.trim()).map_err(|e| anyhow::anyhow!("invalid log level {level:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
    }

    #[test]
    fn empty_level_defaults_to_info() {
        assert_eq!(parse_log_level("").unwrap(), Level::INFO);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_log_level("verbose").is_err());
    }
}
