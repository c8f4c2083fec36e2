//! Read-only view of the cold catalog for status and range queries

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::control::load_manifest;
use super::error::{check_cancelled, ColdError, ColdResult};
use super::options::ColdEventStoreOptions;
use super::storage::ColdObjectStorage;
use crate::types::{ColdDataRangeSummary, ColdFeatureStatus, ColdSegmentSummary};

const NO_STORAGE_REASON: &str = "No cold object storage is configured";

pub struct ColdCatalogReader {
    storage: Option<Arc<dyn ColdObjectStorage>>,
    options: ColdEventStoreOptions,
}

impl ColdCatalogReader {
    pub fn new(storage: Option<Arc<dyn ColdObjectStorage>>, options: ColdEventStoreOptions) -> Self {
        Self { storage, options }
    }

    pub fn status(&self) -> ColdFeatureStatus {
        match self.storage {
            Some(_) => ColdFeatureStatus::supported(self.options.enabled),
            None => ColdFeatureStatus::not_supported(NO_STORAGE_REASON),
        }
    }

    pub async fn get_status(&self, cancel: &CancellationToken) -> ColdResult<ColdFeatureStatus> {
        check_cancelled(cancel)?;
        Ok(self.status())
    }

    /// Range and segment listing from the current manifest; an empty
    /// summary if nothing has been exported yet
    pub async fn get_data_range_summary(
        &self,
        service_id: &str,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdDataRangeSummary> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| ColdError::NotSupported(NO_STORAGE_REASON.to_string()))?;

        let Some(manifest) = load_manifest(storage.as_ref(), service_id, cancel).await? else {
            return Ok(ColdDataRangeSummary::empty(service_id));
        };
        let manifest = manifest.value;

        Ok(ColdDataRangeSummary {
            service_id: service_id.to_string(),
            oldest_sortable_unique_id: manifest
                .segments
                .iter()
                .map(|s| s.from_sortable_unique_id.clone())
                .min(),
            latest_sortable_unique_id: manifest
                .segments
                .iter()
                .map(|s| s.to_sortable_unique_id.clone())
                .max(),
            total_event_count: manifest.total_event_count(),
            segment_count: manifest.segments.len(),
            segments: manifest.segments.iter().map(ColdSegmentSummary::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cold::control::store;
    use crate::cold::paths::manifest_path;
    use crate::cold::storage::InMemoryColdObjectStorage;
    use crate::types::{ColdManifest, ColdSegmentInfo};
    use chrono::Utc;

    fn segment(from: &str, to: &str, count: u64) -> ColdSegmentInfo {
        ColdSegmentInfo {
            path: format!("segments/svc/{}_{}_0000.jsonl", from, to),
            from_sortable_unique_id: from.to_string(),
            to_sortable_unique_id: to.to_string(),
            event_count: count,
            size_bytes: 10,
            sha256: "abc".to_string(),
            created_at_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_status_without_storage() {
        let reader = ColdCatalogReader::new(None, ColdEventStoreOptions::enabled());
        let cancel = CancellationToken::new();
        let status = reader.get_status(&cancel).await.unwrap();
        assert!(!status.is_supported);
        assert!(status.reason.is_some());
        assert!(matches!(
            reader.get_data_range_summary("svc", &cancel).await,
            Err(ColdError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_status_reports_flag() {
        let storage: Arc<dyn ColdObjectStorage> = Arc::new(InMemoryColdObjectStorage::new());
        let reader = ColdCatalogReader::new(Some(storage), ColdEventStoreOptions::default());
        let status = reader.status();
        assert!(status.is_supported);
        assert!(!status.is_enabled);
    }

    #[tokio::test]
    async fn test_summary() {
        let storage = Arc::new(InMemoryColdObjectStorage::new());
        let cancel = CancellationToken::new();
        let reader = ColdCatalogReader::new(Some(storage.clone()), ColdEventStoreOptions::enabled());

        let empty = reader.get_data_range_summary("svc", &cancel).await.unwrap();
        assert_eq!(empty.segment_count, 0);
        assert!(empty.oldest_sortable_unique_id.is_none());

        let manifest = ColdManifest::empty("svc").with_appended(
            vec![segment("100", "199", 3), segment("200", "299", 4)],
            "299".to_string(),
            Utc::now(),
        );
        store(storage.as_ref(), &manifest_path("svc"), &manifest, None, &cancel)
            .await
            .unwrap();

        let summary = reader.get_data_range_summary("svc", &cancel).await.unwrap();
        assert_eq!(summary.oldest_sortable_unique_id.as_deref(), Some("100"));
        assert_eq!(summary.latest_sortable_unique_id.as_deref(), Some("299"));
        assert_eq!(summary.total_event_count, 7);
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.segments[1].event_count, 4);
    }
}
