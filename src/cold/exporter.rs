//! Incremental cold export
//!
//! One cycle per call, under the per-service export lease:
//!
//! 1. Read hot events after the manifest watermark
//! 2. Keep only those at or before `now - safe_window`
//! 3. Split into segments and upload each
//! 4. Renew the lease, then commit a new manifest conditioned on its ETag
//! 5. Write the advisory checkpoint
//!
//! The manifest is the commit point. Segments uploaded by a cycle that fails
//! before step 4 stay unreferenced and are invisible to readers.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::control::{self, Versioned};
use super::error::{check_cancelled, ColdError, ColdResult};
use super::lease::ColdLeaseManager;
use super::options::ColdEventStoreOptions;
use super::paths::{checkpoint_path, export_lease_id, manifest_path, segment_path};
use super::safe_window;
use super::segment::write_segment;
use super::splitter;
use super::storage::ColdObjectStorage;
use crate::event_store::EventStore;
use crate::types::{
    ColdCheckpoint, ColdFeatureStatus, ColdLease, ColdManifest, ColdSegmentInfo,
    ColdStoreProgress, ExportResult, SerializableEvent, SortableUniqueId,
    INITIAL_MANIFEST_VERSION,
};
use crate::utils::time::Clock;
use crate::utils::system_clock;

/// Attempts at the conditional manifest write before giving up
pub const MAX_MANIFEST_RETRIES: usize = 3;

pub struct ColdExporter {
    hot: Arc<dyn EventStore>,
    storage: Arc<dyn ColdObjectStorage>,
    leases: Arc<dyn ColdLeaseManager>,
    options: ColdEventStoreOptions,
    clock: Arc<dyn Clock>,
}

impl ColdExporter {
    pub fn new(
        hot: Arc<dyn EventStore>,
        storage: Arc<dyn ColdObjectStorage>,
        leases: Arc<dyn ColdLeaseManager>,
        options: ColdEventStoreOptions,
    ) -> Self {
        Self {
            hot,
            storage,
            leases,
            options,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &ColdEventStoreOptions {
        &self.options
    }

    pub async fn get_status(&self, cancel: &CancellationToken) -> ColdResult<ColdFeatureStatus> {
        check_cancelled(cancel)?;
        Ok(ColdFeatureStatus::supported(self.options.enabled))
    }

    /// Export progress from the manifest and checkpoint; "0" version and no
    /// IDs before the first export
    pub async fn get_progress(
        &self,
        service_id: &str,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdStoreProgress> {
        let manifest = control::load_manifest(self.storage.as_ref(), service_id, cancel)
            .await?
            .map(|v| v.value);
        let checkpoint = control::load_checkpoint(self.storage.as_ref(), service_id, cancel)
            .await?
            .map(|v| v.value);

        let latest_safe = manifest
            .as_ref()
            .and_then(|m| m.latest_safe_sortable_unique_id.clone());
        Ok(ColdStoreProgress {
            service_id: service_id.to_string(),
            latest_exported_sortable_unique_id: manifest
                .as_ref()
                .and_then(|m| m.latest_exported().map(str::to_string)),
            next_since_sortable_unique_id: checkpoint
                .and_then(|c| c.next_since_sortable_unique_id)
                .or_else(|| latest_safe.clone()),
            latest_safe_sortable_unique_id: latest_safe,
            last_exported_at_utc: manifest.as_ref().map(|m| m.updated_at_utc),
            manifest_version: manifest
                .map(|m| m.manifest_version.to_string())
                .unwrap_or_else(|| INITIAL_MANIFEST_VERSION.to_string()),
        })
    }

    /// Run one export cycle for `service_id`.
    ///
    /// Returns an empty result if another exporter holds the lease or no
    /// event is both new and outside the safe window.
    #[instrument(skip(self, cancel))]
    pub async fn export_incremental(
        &self,
        service_id: &str,
        cancel: &CancellationToken,
    ) -> ColdResult<ExportResult> {
        if !self.options.enabled {
            return Err(ColdError::Disabled);
        }
        check_cancelled(cancel)?;

        let lease_id = export_lease_id(service_id);
        let lease = match self
            .leases
            .acquire(&lease_id, self.options.pull_interval, cancel)
            .await
        {
            Ok(lease) => lease,
            Err(ColdError::LeaseContended { .. }) => {
                info!(lease_id = %lease_id, "export lease held elsewhere, skipping cycle");
                return Ok(ExportResult::nothing());
            }
            Err(e) => return Err(e),
        };

        let outcome = self.export_under_lease(service_id, &lease, cancel).await;

        // Release even when the caller cancelled the cycle itself
        if let Err(e) = self.leases.release(&lease, &CancellationToken::new()).await {
            warn!(lease_id = %lease_id, error = %e, "failed to release export lease");
        }

        match &outcome {
            Ok(result) if result.exported_event_count > 0 => info!(
                exported = result.exported_event_count,
                segments = result.new_segments.len(),
                manifest_version = %result.updated_manifest_version,
                "cold export committed"
            ),
            Ok(_) => debug!("nothing to export"),
            Err(e) => warn!(error = %e, retryable = e.is_retryable(), "cold export failed"),
        }
        outcome
    }

    async fn export_under_lease(
        &self,
        service_id: &str,
        lease: &ColdLease,
        cancel: &CancellationToken,
    ) -> ColdResult<ExportResult> {
        let current = control::load_manifest(self.storage.as_ref(), service_id, cancel).await?;
        let since = current
            .as_ref()
            .and_then(|v| v.value.latest_safe_sortable_unique_id.clone())
            .map(SortableUniqueId::parse)
            .transpose()?;

        let events = self
            .hot
            .read_all_serializable_events(since.as_ref(), None)
            .await?;
        if events.is_empty() {
            return Ok(ExportResult::nothing());
        }

        let cutoff = safe_window::cutoff(self.clock.now(), self.options.safe_window);
        let safe = safe_window::apply(events, cutoff)?;
        let (Some(first), Some(last)) = (safe.first(), safe.last()) else {
            debug!(cutoff = %cutoff, "all new events are inside the safe window");
            return Ok(ExportResult::nothing());
        };
        let first_id = first.sortable_unique_id_value.clone();
        let last_id = last.sortable_unique_id_value.clone();
        let exported_event_count = safe.len() as u64;
        check_cancelled(cancel)?;

        let chunks = splitter::split(
            safe,
            self.options.segment_max_events,
            self.options.segment_max_bytes,
        );
        let new_segments = self.upload_segments(service_id, &chunks, cancel).await?;
        check_cancelled(cancel)?;

        // A lease lost while uploading means another exporter may be running
        self.leases
            .renew(lease, self.options.pull_interval, cancel)
            .await?;

        let manifest = self
            .commit_manifest(service_id, current, &new_segments, &first_id, &last_id, cancel)
            .await?;

        let checkpoint = ColdCheckpoint {
            service_id: service_id.to_string(),
            next_since_sortable_unique_id: Some(last_id),
            updated_at_utc: self.clock.now(),
        };
        self.write_checkpoint(service_id, &checkpoint, cancel).await?;

        Ok(ExportResult {
            exported_event_count,
            new_segments,
            updated_manifest_version: manifest.manifest_version.to_string(),
        })
    }

    async fn upload_segments(
        &self,
        service_id: &str,
        chunks: &[Vec<SerializableEvent>],
        cancel: &CancellationToken,
    ) -> ColdResult<Vec<ColdSegmentInfo>> {
        let mut segments = Vec::with_capacity(chunks.len());
        for (seq, chunk) in chunks.iter().enumerate() {
            let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
                continue;
            };
            let from = first.sortable_unique_id_value.clone();
            let to = last.sortable_unique_id_value.clone();
            let path = segment_path(service_id, &from, &to, seq);

            let data = write_segment(chunk).map_err(|source| ColdError::Corruption {
                path: path.clone(),
                source,
            })?;
            let info = ColdSegmentInfo {
                path: path.clone(),
                from_sortable_unique_id: from,
                to_sortable_unique_id: to,
                event_count: chunk.len() as u64,
                size_bytes: data.len() as u64,
                sha256: hex::encode(Sha256::digest(&data)),
                created_at_utc: self.clock.now(),
            };

            self.storage.put(&path, data, None, cancel).await?;
            debug!(path = %path, events = info.event_count, bytes = info.size_bytes, "uploaded segment");
            segments.push(info);
        }
        Ok(segments)
    }

    async fn commit_manifest(
        &self,
        service_id: &str,
        mut base: Option<Versioned<ColdManifest>>,
        new_segments: &[ColdSegmentInfo],
        first_id: &str,
        last_id: &str,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdManifest> {
        let path = manifest_path(service_id);

        for attempt in 1..=MAX_MANIFEST_RETRIES {
            let (previous, etag) = match base {
                Some(v) => (v.value, Some(v.etag)),
                None => (ColdManifest::empty(service_id), None),
            };

            // Another exporter committed past our first event; appending would overlap
            if let Some(watermark) = previous.latest_safe_sortable_unique_id.as_deref() {
                if watermark >= first_id {
                    return Err(ColdError::ManifestConflict {
                        service_id: service_id.to_string(),
                        reason: format!(
                            "watermark {} already covers new segments starting at {}",
                            watermark, first_id
                        ),
                    });
                }
            }

            let next = previous.with_appended(new_segments.to_vec(), last_id.to_string(), self.clock.now());
            match control::store(self.storage.as_ref(), &path, &next, etag.as_deref(), cancel).await
            {
                Ok(_) => return Ok(next),
                Err(ColdError::PreconditionFailed { .. }) => {
                    warn!(attempt, "manifest changed concurrently, reloading");
                    base = control::load_manifest(self.storage.as_ref(), service_id, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ColdError::ManifestConflict {
            service_id: service_id.to_string(),
            reason: format!("manifest update failed after {} attempts", MAX_MANIFEST_RETRIES),
        })
    }

    async fn write_checkpoint(
        &self,
        service_id: &str,
        checkpoint: &ColdCheckpoint,
        cancel: &CancellationToken,
    ) -> ColdResult<()> {
        let path = checkpoint_path(service_id);
        let etag = control::load_checkpoint(self.storage.as_ref(), service_id, cancel)
            .await?
            .map(|v| v.etag);
        control::store(self.storage.as_ref(), &path, checkpoint, etag.as_deref(), cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cold::lease::InMemoryColdLeaseManager;
    use crate::cold::segment::read_segment;
    use crate::cold::storage::InMemoryColdObjectStorage;
    use crate::event_store::InMemoryEventStore;
    use crate::types::EventMetadata;
    use crate::utils::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::time::Duration as StdDuration;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn event_at(time: DateTime<Utc>, name: &str) -> SerializableEvent {
        SerializableEvent {
            payload: format!("{{\"name\":\"{}\"}}", name).into_bytes(),
            sortable_unique_id_value: SortableUniqueId::generate(time, Uuid::new_v4()).into_string(),
            id: Uuid::new_v4(),
            event_metadata: EventMetadata::default(),
            tags: vec!["order:1".to_string()],
            event_payload_name: name.to_string(),
        }
    }

    struct Fixture {
        hot: Arc<InMemoryEventStore>,
        storage: Arc<InMemoryColdObjectStorage>,
        leases: Arc<InMemoryColdLeaseManager>,
        clock: Arc<ManualClock>,
        exporter: ColdExporter,
    }

    fn fixture(options: ColdEventStoreOptions, events: Vec<SerializableEvent>) -> Fixture {
        let hot = Arc::new(InMemoryEventStore::with_events(events));
        let storage = Arc::new(InMemoryColdObjectStorage::new());
        let clock = Arc::new(ManualClock::new(now()));
        let leases = Arc::new(InMemoryColdLeaseManager::with_clock(clock.clone()));
        let exporter = ColdExporter::new(hot.clone(), storage.clone(), leases.clone(), options)
            .with_clock(clock.clone());
        Fixture {
            hot,
            storage,
            leases,
            clock,
            exporter,
        }
    }

    fn options() -> ColdEventStoreOptions {
        ColdEventStoreOptions::enabled().with_safe_window(StdDuration::from_secs(120))
    }

    #[tokio::test]
    async fn test_exports_only_safe_events() {
        let f = fixture(
            options(),
            vec![
                event_at(now() - Duration::minutes(10), "A"),
                event_at(now() - Duration::minutes(9), "B"),
                event_at(now() - Duration::seconds(30), "C"),
            ],
        );
        let cancel = CancellationToken::new();

        let result = f.exporter.export_incremental("svc", &cancel).await.unwrap();
        assert_eq!(result.exported_event_count, 2);
        assert_eq!(result.new_segments.len(), 1);
        assert_eq!(result.updated_manifest_version, "1");

        let segment = f
            .storage
            .get(&result.new_segments[0].path, &cancel)
            .await
            .unwrap();
        let archived = read_segment(&segment.data).unwrap();
        assert_eq!(
            archived.iter().map(|e| e.event_payload_name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );

        let progress = f.exporter.get_progress("svc", &cancel).await.unwrap();
        assert_eq!(progress.manifest_version, "1");
        assert_eq!(
            progress.latest_safe_sortable_unique_id.as_deref(),
            Some(archived[1].sortable_unique_id_value.as_str())
        );
        assert_eq!(
            progress.next_since_sortable_unique_id,
            progress.latest_safe_sortable_unique_id
        );
    }

    #[tokio::test]
    async fn test_second_cycle_picks_up_newly_safe_events() {
        let f = fixture(
            options(),
            vec![
                event_at(now() - Duration::minutes(10), "A"),
                event_at(now() - Duration::seconds(30), "B"),
            ],
        );
        let cancel = CancellationToken::new();

        assert_eq!(
            f.exporter
                .export_incremental("svc", &cancel)
                .await
                .unwrap()
                .exported_event_count,
            1
        );
        // Nothing newly safe yet
        let idle = f.exporter.export_incremental("svc", &cancel).await.unwrap();
        assert_eq!(idle, ExportResult::nothing());

        f.clock.advance(Duration::minutes(5));
        let result = f.exporter.export_incremental("svc", &cancel).await.unwrap();
        assert_eq!(result.exported_event_count, 1);
        assert_eq!(result.updated_manifest_version, "2");

        let manifest = control::load_manifest(f.storage.as_ref(), "svc", &cancel)
            .await
            .unwrap()
            .unwrap()
            .value;
        assert_eq!(manifest.segments.len(), 2);
        assert!(manifest.segments[0].to_sortable_unique_id < manifest.segments[1].from_sortable_unique_id);
    }

    #[tokio::test]
    async fn test_splits_into_bounded_segments() {
        let events = (0..7)
            .map(|i| event_at(now() - Duration::minutes(30) + Duration::seconds(i), "E"))
            .collect();
        let f = fixture(
            options().with_segment_limits(3, u64::MAX),
            events,
        );
        let cancel = CancellationToken::new();

        let result = f.exporter.export_incremental("svc", &cancel).await.unwrap();
        assert_eq!(result.exported_event_count, 7);
        assert_eq!(
            result.new_segments.iter().map(|s| s.event_count).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert_eq!(f.storage.list("segments/svc/", &cancel).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_is_an_error() {
        let f = fixture(ColdEventStoreOptions::default(), Vec::new());
        assert!(matches!(
            f.exporter
                .export_incremental("svc", &CancellationToken::new())
                .await,
            Err(ColdError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_skips_when_lease_is_held() {
        let f = fixture(
            options(),
            vec![event_at(now() - Duration::minutes(10), "A")],
        );
        let cancel = CancellationToken::new();
        let _held = f
            .leases
            .acquire(&export_lease_id("svc"), StdDuration::from_secs(600), &cancel)
            .await
            .unwrap();

        let result = f.exporter.export_incremental("svc", &cancel).await.unwrap();
        assert_eq!(result, ExportResult::nothing());
        assert!(f.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_lease_released_after_cycle() {
        let f = fixture(
            options(),
            vec![event_at(now() - Duration::minutes(10), "A")],
        );
        let cancel = CancellationToken::new();
        f.exporter.export_incremental("svc", &cancel).await.unwrap();
        f.leases
            .acquire(&export_lease_id("svc"), StdDuration::from_secs(60), &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_progress_before_first_export() {
        let f = fixture(options(), Vec::new());
        let progress = f
            .exporter
            .get_progress("svc", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(progress.manifest_version, INITIAL_MANIFEST_VERSION);
        assert!(progress.latest_safe_sortable_unique_id.is_none());
        assert!(progress.latest_exported_sortable_unique_id.is_none());
        assert!(progress.last_exported_at_utc.is_none());
    }

    #[tokio::test]
    async fn test_conflicting_watermark_aborts() {
        let old = event_at(now() - Duration::minutes(10), "A");
        let f = fixture(options(), vec![old.clone()]);
        let cancel = CancellationToken::new();

        // Stale view of the manifest: someone else already archived past `old`
        let stale = ColdManifest::empty("svc");
        let committed = stale.with_appended(Vec::new(), old.sortable_unique_id_value.clone(), now());
        control::store(f.storage.as_ref(), &manifest_path("svc"), &committed, None, &cancel)
            .await
            .unwrap();

        let err = f
            .exporter
            .commit_manifest(
                "svc",
                None,
                &[],
                &old.sortable_unique_id_value,
                &old.sortable_unique_id_value,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ColdError::ManifestConflict { .. }));
        assert_eq!(f.hot.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let f = fixture(options(), Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            f.exporter.export_incremental("svc", &cancel).await,
            Err(ColdError::Cancelled)
        ));
    }
}
