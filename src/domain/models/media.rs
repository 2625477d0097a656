//! Media dedup index: content-addressed uploads the core reads opaquely.
//!
//! The upload HTTP surface itself is out of scope (§1); this record is in scope
//! because the Store owns the table, and `find_by_hash`/`record_upload` are
//! first-class Store operations even though nothing in the engine calls them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content-addressed media upload: hash → (original name, local path, provider
/// handle, usage count).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub sha256: String,
    pub original_name: String,
    pub local_path: String,
    pub provider_handle: Option<String>,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
}
