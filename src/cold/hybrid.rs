//! Hybrid read path over the hot store and the cold archive
//!
//! Serialized reads consult the manifest: events up to the watermark come
//! from cold segments, the tail after it from the hot store. Any cold-side
//! failure degrades to a hot-only read rather than failing the caller.
//! Typed and tag reads always go to the hot store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::control::load_manifest;
use super::error::{check_cancelled, ColdError, ColdResult};
use super::options::ColdEventStoreOptions;
use super::segment::read_segment;
use super::service_id::{DefaultServiceIdProvider, ServiceIdProvider};
use super::storage::ColdObjectStorage;
use crate::event_store::{EventStore, EventStoreError, EventStoreResult};
use crate::types::{ColdSegmentInfo, Event, SerializableEvent, SortableUniqueId, Tag};

/// Segments fetched concurrently during one read
const SEGMENT_FETCH_CONCURRENCY: usize = 4;

/// Why a serialized read did not touch the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotOnlyReason {
    Disabled,
    NotSupported,
    NoManifest,
    SinceAfterWatermark,
    ColdReadFailed,
}

/// Which tiers served the most recent serialized read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPath {
    HotOnly(HotOnlyReason),
    Hybrid { segments_read: usize },
}

pub struct HybridEventStore {
    hot: Arc<dyn EventStore>,
    cold: Option<Arc<dyn ColdObjectStorage>>,
    service_ids: Arc<dyn ServiceIdProvider>,
    options: ColdEventStoreOptions,
    last_read_path: Mutex<Option<ReadPath>>,
}

impl HybridEventStore {
    pub fn new(
        hot: Arc<dyn EventStore>,
        cold: Option<Arc<dyn ColdObjectStorage>>,
        options: ColdEventStoreOptions,
    ) -> Self {
        Self {
            hot,
            cold,
            service_ids: Arc::new(DefaultServiceIdProvider),
            options,
            last_read_path: Mutex::new(None),
        }
    }

    pub fn with_service_id_provider(mut self, provider: Arc<dyn ServiceIdProvider>) -> Self {
        self.service_ids = provider;
        self
    }

    pub fn hot(&self) -> &Arc<dyn EventStore> {
        &self.hot
    }

    /// Path taken by the last serialized read, if any
    pub fn last_read_path(&self) -> Option<ReadPath> {
        *self.last_read_path.lock()
    }

    fn record(&self, path: ReadPath) {
        debug!(?path, "serialized read path");
        *self.last_read_path.lock() = Some(path);
    }

    async fn hot_only(
        &self,
        reason: HotOnlyReason,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> ColdResult<Vec<SerializableEvent>> {
        self.record(ReadPath::HotOnly(reason));
        Ok(self.hot.read_all_serializable_events(since, max_count).await?)
    }

    /// Serialized read across both tiers.
    ///
    /// Only hot-store failures and cancellation surface as errors.
    pub async fn read_serializable_with_cancel(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
        cancel: &CancellationToken,
    ) -> ColdResult<Vec<SerializableEvent>> {
        check_cancelled(cancel)?;
        if !self.options.enabled {
            return self.hot_only(HotOnlyReason::Disabled, since, max_count).await;
        }
        let Some(storage) = self.cold.as_ref() else {
            return self.hot_only(HotOnlyReason::NotSupported, since, max_count).await;
        };

        let service_id = self.service_ids.current_service_id();
        let manifest = match load_manifest(storage.as_ref(), &service_id, cancel).await {
            Ok(Some(v)) => v.value,
            Ok(None) => return self.hot_only(HotOnlyReason::NoManifest, since, max_count).await,
            Err(ColdError::Cancelled) => return Err(ColdError::Cancelled),
            Err(e) => {
                warn!(service_id = %service_id, error = %e, "manifest unreadable, reading hot store only");
                return self.hot_only(HotOnlyReason::ColdReadFailed, since, max_count).await;
            }
        };
        let Some(watermark) = manifest.latest_safe_sortable_unique_id.as_deref() else {
            return self.hot_only(HotOnlyReason::NoManifest, since, max_count).await;
        };
        let watermark_id = match SortableUniqueId::parse(watermark) {
            Ok(id) => id,
            Err(e) => {
                warn!(service_id = %service_id, watermark, error = %e, "manifest watermark malformed, reading hot store only");
                return self.hot_only(HotOnlyReason::ColdReadFailed, since, max_count).await;
            }
        };
        if since.is_some_and(|s| s.as_str() > watermark) {
            return self
                .hot_only(HotOnlyReason::SinceAfterWatermark, since, max_count)
                .await;
        }

        let selected: Vec<&ColdSegmentInfo> = manifest
            .segments
            .iter()
            .filter(|s| since.map_or(true, |since| s.ends_after(since.as_str())))
            .filter(|s| s.from_sortable_unique_id.as_str() <= watermark)
            .collect();

        let cold_events = match self.read_segments(storage.as_ref(), &selected, cancel).await {
            Ok(events) => events,
            Err(ColdError::Cancelled) => return Err(ColdError::Cancelled),
            Err(e) => {
                warn!(service_id = %service_id, error = %e, "cold segment read failed, reading hot store only");
                return self.hot_only(HotOnlyReason::ColdReadFailed, since, max_count).await;
            }
        };

        // Every hot event sorts after every kept cold event, so the page bound applies
        let hot_events = self
            .hot
            .read_all_serializable_events(Some(&watermark_id), max_count)
            .await?;

        let merged = merge(cold_events, hot_events, since, watermark, max_count);
        self.record(ReadPath::Hybrid {
            segments_read: selected.len(),
        });
        Ok(merged)
    }

    async fn read_segments<'a>(
        &self,
        storage: &'a dyn ColdObjectStorage,
        segments: &[&'a ColdSegmentInfo],
        cancel: &'a CancellationToken,
    ) -> ColdResult<Vec<Vec<SerializableEvent>>> {
        let fetches: Vec<BoxFuture<'a, ColdResult<Vec<SerializableEvent>>>> = segments
            .iter()
            .copied()
            .map(|segment| fetch_segment(storage, segment, cancel).boxed())
            .collect();
        stream::iter(fetches)
            .buffered(SEGMENT_FETCH_CONCURRENCY)
            .try_collect()
            .await
    }
}

async fn fetch_segment(
    storage: &dyn ColdObjectStorage,
    segment: &ColdSegmentInfo,
    cancel: &CancellationToken,
) -> ColdResult<Vec<SerializableEvent>> {
    let object = storage.get(&segment.path, cancel).await?;
    read_segment(&object.data).map_err(|(line, source)| ColdError::CorruptSegment {
        path: segment.path.clone(),
        line,
        source,
    })
}

/// Combine cold and hot events into one ordered, bounded stream.
///
/// Cold events are kept within `(since, watermark]`. Hot events are the tail
/// after the watermark. An event ID seen in both tiers is kept once.
fn merge(
    cold: Vec<Vec<SerializableEvent>>,
    hot: Vec<SerializableEvent>,
    since: Option<&SortableUniqueId>,
    watermark: &str,
    max_count: Option<usize>,
) -> Vec<SerializableEvent> {
    let after_since =
        |e: &SerializableEvent| since.map_or(true, |s| e.sortable_unique_id_value.as_str() > s.as_str());

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut merged: Vec<SerializableEvent> = cold
        .into_iter()
        .flatten()
        .filter(|e| after_since(e) && e.sortable_unique_id_value.as_str() <= watermark)
        .chain(hot.into_iter().filter(|e| after_since(e)))
        .filter(|e| seen.insert(e.id))
        .collect();

    merged.sort_by(|a, b| a.sortable_unique_id_value.cmp(&b.sortable_unique_id_value));
    if let Some(max) = max_count {
        merged.truncate(max);
    }
    merged
}

fn to_store_error(e: ColdError) -> EventStoreError {
    match e {
        ColdError::HotStore(inner) => inner,
        ColdError::InvalidSortableId(inner) => inner.into(),
        other => EventStoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl EventStore for HybridEventStore {
    async fn write_serializable_events(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.hot.write_serializable_events(events).await
    }

    async fn read_all_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        self.hot.read_all_events(since, max_count).await
    }

    async fn read_all_serializable_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.read_serializable_with_cancel(since, max_count, &CancellationToken::new())
            .await
            .map_err(to_store_error)
    }

    async fn read_serializable_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.hot.read_serializable_events_by_tag(tag, since).await
    }

    async fn read_event(&self, id: Uuid) -> EventStoreResult<Option<Event>> {
        self.hot.read_event(id).await
    }

    async fn get_event_count(&self, since: Option<&SortableUniqueId>) -> EventStoreResult<u64> {
        self.hot.get_event_count(since).await
    }
}
