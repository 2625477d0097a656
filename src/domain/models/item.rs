//! Item domain model: one sub-request of a mission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::ParamMap;

/// Maximum number of retries allowed per item before it becomes terminally `failed`.
pub const MAX_RETRY: u32 = 7;

/// Base exponential-backoff delay, in seconds.
pub const BASE_RETRY_DELAY_SECS: i64 = 60;

/// Cap on the exponential-backoff delay, in seconds.
pub const MAX_RETRY_DELAY_SECS: i64 = 3600;

/// Item-level state machine (§4.3).
///
/// ```text
///   pending ──► processing ──► completed
///      ▲            │
///      │            └──► (retryable) pending(+next_retry_at) [if retry_count < MAX]
///      │            └──► failed                              [otherwise]
///      │
///      └── (submit error, retryable path) ── pending(+next_retry_at)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ItemStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One sub-request of a mission, submitted to exactly one platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub mission_id: i64,
    pub item_index: u32,
    pub input_params: ParamMap,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub platform_id: Option<String>,
    pub platform_task_id: Option<String>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Computes the exponential backoff delay for the given retry count (B3):
    /// `min(BASE * 2^retry_count, MAX_DELAY)`, using this crate's default constants.
    #[must_use]
    pub fn backoff_delay_secs(retry_count: u32) -> i64 {
        Self::backoff_delay_secs_with(retry_count, BASE_RETRY_DELAY_SECS, MAX_RETRY_DELAY_SECS)
    }

    /// Computes the exponential backoff delay for the given retry count against
    /// caller-supplied base/cap values, for engines configured with a non-default
    /// `BASE_RETRY_DELAY`/`MAX_RETRY_DELAY` (§6).
    #[must_use]
    pub fn backoff_delay_secs_with(retry_count: u32, base_delay_secs: i64, max_delay_secs: i64) -> i64 {
        let Some(multiplier) = 2i64.checked_pow(retry_count) else {
            return max_delay_secs;
        };
        let Some(delay) = base_delay_secs.checked_mul(multiplier) else {
            return max_delay_secs;
        };
        delay.min(max_delay_secs)
    }

    /// Applies the retry decision for a failed submission or poll (§4.4b/c) using
    /// this crate's default `MAX_RETRY`/backoff constants. See
    /// [`Self::apply_retry_or_fail_with`] for the configurable form an engine with
    /// non-default settings uses.
    pub fn apply_retry_or_fail(&mut self, error_message: impl Into<String>) {
        self.apply_retry_or_fail_with(error_message, MAX_RETRY, BASE_RETRY_DELAY_SECS, MAX_RETRY_DELAY_SECS);
    }

    /// Applies the retry decision for a failed submission or poll (§4.4b/c): if
    /// `retry_count < max_retry`, schedules a backoff retry; otherwise moves the item
    /// to terminal `failed`. `next_retry_at`/`platform_task_id` are cleared on the
    /// retry path, consistent with the item returning to `pending`.
    pub fn apply_retry_or_fail_with(
        &mut self,
        error_message: impl Into<String>,
        max_retry: u32,
        base_delay_secs: i64,
        max_delay_secs: i64,
    ) {
        let message = error_message.into();
        if self.retry_count < max_retry {
            let delay = Self::backoff_delay_secs_with(self.retry_count, base_delay_secs, max_delay_secs);
            self.retry_count += 1;
            self.status = ItemStatus::Pending;
            self.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(delay));
            self.platform_task_id = None;
            self.platform_id = None;
            self.error_message = Some(message);
        } else {
            self.status = ItemStatus::Failed;
            self.error_message = Some(message);
        }
        self.updated_at = Utc::now();
    }

    /// Marks the item as successfully submitted and in flight with a provider.
    pub fn mark_processing(&mut self, platform_id: impl Into<String>, platform_task_id: impl Into<String>) {
        self.status = ItemStatus::Processing;
        self.platform_id = Some(platform_id.into());
        self.platform_task_id = Some(platform_task_id.into());
        self.updated_at = Utc::now();
    }

    /// Marks the item as completed with a result URL.
    pub fn mark_completed(&mut self, result_url: impl Into<String>) {
        self.status = ItemStatus::Completed;
        self.result_url = Some(result_url.into());
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Resets a terminally-failed item back to `pending` for a retry-mission call
    /// (§4.8 `retry_mission`).
    pub fn reset_for_retry(&mut self) {
        self.status = ItemStatus::Pending;
        self.retry_count = 0;
        self.next_retry_at = None;
        self.error_message = None;
        self.platform_id = None;
        self.platform_task_id = None;
        self.updated_at = Utc::now();
    }

    /// Whether this item's backoff window has elapsed (or it has none set).
    #[must_use]
    pub fn retry_is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.is_none_or(|t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: 1,
            mission_id: 1,
            item_index: 0,
            input_params: ParamMap::new(),
            status: ItemStatus::Pending,
            retry_count: 0,
            next_retry_at: None,
            platform_id: None,
            platform_task_id: None,
            result_url: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn backoff_sequence_matches_b3() {
        let expected = [60, 120, 240, 480, 960, 1920, 3600];
        for (retry_count, exp) in expected.iter().enumerate() {
            assert_eq!(Item::backoff_delay_secs(retry_count as u32), *exp);
        }
    }

    #[test]
    fn backoff_never_exceeds_cap_for_large_retry_counts() {
        assert_eq!(Item::backoff_delay_secs(20), MAX_RETRY_DELAY_SECS);
        assert_eq!(Item::backoff_delay_secs(1000), MAX_RETRY_DELAY_SECS);
    }

    #[test]
    fn apply_retry_or_fail_schedules_backoff_under_max() {
        let mut it = item();
        it.status = ItemStatus::Processing;
        it.platform_task_id = Some("abc".into());
        it.apply_retry_or_fail("transient failure");

        assert_eq!(it.status, ItemStatus::Pending);
        assert_eq!(it.retry_count, 1);
        assert!(it.next_retry_at.is_some());
        assert!(it.platform_task_id.is_none());
        assert_eq!(it.error_message.as_deref(), Some("transient failure"));
    }

    #[test]
    fn apply_retry_or_fail_terminates_at_max_retry() {
        let mut it = item();
        it.retry_count = MAX_RETRY;
        it.apply_retry_or_fail("terminal failure");

        assert_eq!(it.status, ItemStatus::Failed);
        assert_eq!(it.retry_count, MAX_RETRY);
    }

    #[test]
    fn retry_is_due_true_when_unset_or_past() {
        let mut it = item();
        assert!(it.retry_is_due(Utc::now()));
        it.next_retry_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(it.retry_is_due(Utc::now()));
    }

    #[test]
    fn retry_is_due_false_when_in_future() {
        let mut it = item();
        it.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(60));
        assert!(!it.retry_is_due(Utc::now()));
    }

    #[test]
    fn reset_for_retry_clears_failure_state() {
        let mut it = item();
        it.status = ItemStatus::Failed;
        it.retry_count = MAX_RETRY;
        it.error_message = Some("oops".into());
        it.reset_for_retry();

        assert_eq!(it.status, ItemStatus::Pending);
        assert_eq!(it.retry_count, 0);
        assert!(it.next_retry_at.is_none());
        assert!(it.error_message.is_none());
    }
}
