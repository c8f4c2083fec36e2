//! Cold tier catalog types
//!
//! The manifest is the single source of truth for what has been archived.
//! It is never edited in place: every export cycle builds a new value and
//! replaces the stored object wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manifest version reported before the first export
pub const INITIAL_MANIFEST_VERSION: &str = "0";

/// One immutable archive file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdSegmentInfo {
    pub path: String,
    /// Inclusive lower bound
    pub from_sortable_unique_id: String,
    /// Inclusive upper bound
    pub to_sortable_unique_id: String,
    pub event_count: u64,
    pub size_bytes: u64,
    pub sha256: String,
    pub created_at_utc: DateTime<Utc>,
}

impl ColdSegmentInfo {
    /// True if any part of this segment lies strictly after `since`
    pub fn ends_after(&self, since: &str) -> bool {
        self.to_sortable_unique_id.as_str() > since
    }
}

/// Per-service catalog root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdManifest {
    pub service_id: String,
    #[serde(with = "version_string")]
    pub manifest_version: u64,
    /// Archival watermark: highest ID durably archived
    pub latest_safe_sortable_unique_id: Option<String>,
    pub segments: Vec<ColdSegmentInfo>,
    pub updated_at_utc: DateTime<Utc>,
}

impl ColdManifest {
    /// Empty manifest used as the base of the first export
    pub fn empty(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            manifest_version: 0,
            latest_safe_sortable_unique_id: None,
            segments: Vec::new(),
            updated_at_utc: Utc::now(),
        }
    }

    /// Build the successor manifest: old segments followed by `new_segments`
    pub fn with_appended(
        &self,
        new_segments: Vec<ColdSegmentInfo>,
        latest_safe: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(new_segments);
        Self {
            service_id: self.service_id.clone(),
            manifest_version: self.manifest_version + 1,
            latest_safe_sortable_unique_id: Some(latest_safe),
            segments,
            updated_at_utc: now,
        }
    }

    /// To-bound of the last segment
    pub fn latest_exported(&self) -> Option<&str> {
        self.segments
            .last()
            .map(|s| s.to_sortable_unique_id.as_str())
    }

    pub fn total_event_count(&self) -> u64 {
        self.segments.iter().map(|s| s.event_count).sum()
    }
}

/// Advisory export cursor written after each committed manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdCheckpoint {
    pub service_id: String,
    pub next_since_sortable_unique_id: Option<String>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Ephemeral ownership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdLease {
    pub lease_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ColdLease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Whether the cold tier is configured and switched on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdFeatureStatus {
    pub is_supported: bool,
    pub is_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ColdFeatureStatus {
    pub fn not_supported(reason: impl Into<String>) -> Self {
        Self {
            is_supported: false,
            is_enabled: false,
            reason: Some(reason.into()),
        }
    }

    pub fn supported(enabled: bool) -> Self {
        let reason = if enabled {
            "Cold event store is active"
        } else {
            "Cold event store is disabled"
        };
        Self {
            is_supported: true,
            is_enabled: enabled,
            reason: Some(reason.to_string()),
        }
    }
}

/// Public view of a segment: bounds and count only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdSegmentSummary {
    pub path: String,
    pub from_sortable_unique_id: String,
    pub to_sortable_unique_id: String,
    pub event_count: u64,
}

impl From<&ColdSegmentInfo> for ColdSegmentSummary {
    fn from(info: &ColdSegmentInfo) -> Self {
        Self {
            path: info.path.clone(),
            from_sortable_unique_id: info.from_sortable_unique_id.clone(),
            to_sortable_unique_id: info.to_sortable_unique_id.clone(),
            event_count: info.event_count,
        }
    }
}

/// Aggregate view over a service's archived range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdDataRangeSummary {
    pub service_id: String,
    pub oldest_sortable_unique_id: Option<String>,
    pub latest_sortable_unique_id: Option<String>,
    pub total_event_count: u64,
    pub segment_count: usize,
    pub segments: Vec<ColdSegmentSummary>,
}

impl ColdDataRangeSummary {
    pub fn empty(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            oldest_sortable_unique_id: None,
            latest_sortable_unique_id: None,
            total_event_count: 0,
            segment_count: 0,
            segments: Vec::new(),
        }
    }
}

/// Export progress for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdStoreProgress {
    pub service_id: String,
    pub latest_safe_sortable_unique_id: Option<String>,
    pub latest_exported_sortable_unique_id: Option<String>,
    pub next_since_sortable_unique_id: Option<String>,
    pub last_exported_at_utc: Option<DateTime<Utc>>,
    pub manifest_version: String,
}

/// Outcome of one export cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub exported_event_count: u64,
    pub new_segments: Vec<ColdSegmentInfo>,
    pub updated_manifest_version: String,
}

impl ExportResult {
    /// Nothing exported: lease skip, empty hot tail or nothing past the safe window
    pub fn nothing() -> Self {
        Self {
            exported_event_count: 0,
            new_segments: Vec::new(),
            updated_manifest_version: INITIAL_MANIFEST_VERSION.to_string(),
        }
    }
}

/// The manifest version is a counter but travels as a JSON string
mod version_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(version: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid manifest version '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(from: &str, to: &str, count: u64) -> ColdSegmentInfo {
        ColdSegmentInfo {
            path: format!("segments/svc/{}_{}_0000.jsonl", from, to),
            from_sortable_unique_id: from.to_string(),
            to_sortable_unique_id: to.to_string(),
            event_count: count,
            size_bytes: 1024,
            sha256: "abc".to_string(),
            created_at_utc: Utc::now(),
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = ColdManifest::empty("svc").with_appended(
            vec![segment("id-100", "id-200", 50), segment("id-201", "id-300", 75)],
            "id-300".to_string(),
            Utc::now(),
        );

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"manifestVersion\":\"1\""));
        assert!(json.contains("\"latestSafeSortableUniqueId\":\"id-300\""));

        let parsed: ColdManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.segments[1].from_sortable_unique_id, "id-201");
        assert_eq!(parsed.total_event_count(), 125);
    }

    #[test]
    fn test_with_appended_does_not_touch_original() {
        let base = ColdManifest::empty("svc").with_appended(
            vec![segment("a", "b", 1)],
            "b".to_string(),
            Utc::now(),
        );
        let next = base.with_appended(vec![segment("c", "d", 2)], "d".to_string(), Utc::now());

        assert_eq!(base.segments.len(), 1);
        assert_eq!(base.manifest_version, 1);
        assert_eq!(next.segments.len(), 2);
        assert_eq!(next.manifest_version, 2);
        assert_eq!(next.latest_exported(), Some("d"));
    }

    #[test]
    fn test_non_numeric_version_is_rejected() {
        let json = r#"{"serviceId":"svc","manifestVersion":"v1","latestSafeSortableUniqueId":null,"segments":[],"updatedAtUtc":"2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<ColdManifest>(json).is_err());
    }

    #[test]
    fn test_segment_summary_omits_internals() {
        let summary = ColdSegmentSummary::from(&segment("a", "b", 3));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("sha256"));
        assert!(!json.contains("sizeBytes"));
        assert!(!json.contains("createdAtUtc"));
    }
}
