//! A `tracing_subscriber::Layer` that redacts secrets before they reach a sink.
//!
//! Provider API keys flow through log fields constantly (submit/query request logging,
//! config validation errors). This layer never sees the structured fields directly —
//! `tracing-subscriber`'s layer API doesn't expose formatted output at the `Layer`
//! level without a custom visitor — so `scrub_message` is applied by the formatting
//! layer's `FormatEvent` wiring in `logger.rs`. It is kept as its own type so the
//! patterns live in one place and are unit-testable in isolation.

use std::sync::LazyLock;

use regex::Regex;
use tracing::Subscriber;
use tracing_subscriber::Layer;

static API_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(api[_-]?key|secret|password)(["']?\s*[:=]\s*["']?)[A-Za-z0-9._-]{8,}"#)
        .expect("static regex")
});

static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]{8,}").expect("static regex"));

static PROVIDER_TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(sk|pk|rk)-[A-Za-z0-9]{16,}\b").expect("static regex"));

const REDACTED: &str = "[REDACTED]";

/// Replaces any secret-shaped substring of `input` with `[REDACTED]`.
#[must_use]
pub fn scrub_message(input: &str) -> String {
    let scrubbed = API_KEY_PATTERN.replace_all(input, |caps: &regex::Captures| {
        format!("{}{}{REDACTED}", &caps[1], &caps[2])
    });
    let scrubbed = BEARER_PATTERN.replace_all(&scrubbed, format!("Bearer {REDACTED}"));
    let scrubbed = PROVIDER_TOKEN_PATTERN.replace_all(&scrubbed, REDACTED);
    scrubbed.into_owned()
}

/// Marker layer registered alongside the formatting layer. The actual scrubbing
/// happens in the `FormatEvent` implementation in `logger.rs`; this layer exists so
/// the subscriber stack has a single named place documenting that scrubbing is wired
/// in, and as a seam for a future structured (per-field) scrubbing pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretScrubbingLayer;

impl<S: Subscriber> Layer<S> for SecretScrubbingLayer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key_field() {
        let msg = r#"submitting job api_key="sk-live-abcdef1234567890""#;
        let out = scrub_message(msg);
        assert!(!out.contains("abcdef1234567890"));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn redacts_bearer_token() {
        let msg = "Authorization: Bearer abc123def456ghi789";
        let out = scrub_message(msg);
        assert!(!out.contains("abc123def456ghi789"));
    }

    #[test]
    fn redacts_provider_style_token() {
        let msg = "using token sk-proj1234567890abcdef for request";
        let out = scrub_message(msg);
        assert!(!out.contains("sk-proj1234567890abcdef"));
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let msg = "mission 42 item 3 transitioned pending -> processing";
        assert_eq!(scrub_message(msg), msg);
    }
}
