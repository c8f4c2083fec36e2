//! Local cache metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Describes which remote a local cache was built from.
///
/// Any mismatch in endpoint, database or schema against the currently
/// configured remote invalidates the whole cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub remote_endpoint: String,
    pub database_name: String,
    pub schema_version: String,
    pub total_count_at_fetch: u64,
    pub last_cached_sortable_unique_id: Option<String>,
    pub last_safe_window_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
