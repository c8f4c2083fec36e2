//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tiered_event_store::cold::control;
use tiered_event_store::cold::paths::{manifest_path, segment_path};
use tiered_event_store::cold::segment::write_segment;
use tiered_event_store::cold::{
    ColdError, ColdObjectStorage, ColdResult, ColdStorageObject, InMemoryColdObjectStorage,
};
use tiered_event_store::event_store::{EventStore, EventStoreResult, InMemoryEventStore};
use tiered_event_store::types::{
    ColdManifest, ColdSegmentInfo, Event, EventMetadata, SerializableEvent, SortableUniqueId, Tag,
};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
}

pub fn event_at(time: DateTime<Utc>, name: &str) -> SerializableEvent {
    SerializableEvent {
        payload: format!("{{\"name\":\"{}\"}}", name).into_bytes(),
        sortable_unique_id_value: SortableUniqueId::generate(time, Uuid::new_v4()).into_string(),
        id: Uuid::new_v4(),
        event_metadata: EventMetadata::new("cause", "corr", "tester"),
        tags: vec![format!("item:{}", name)],
        event_payload_name: name.to_string(),
    }
}

pub fn minutes_before(minutes: i64, name: &str) -> SerializableEvent {
    event_at(fixed_now() - Duration::minutes(minutes), name)
}

pub fn names(events: &[SerializableEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_payload_name.as_str()).collect()
}

pub fn sid(event: &SerializableEvent) -> SortableUniqueId {
    SortableUniqueId::parse(event.sortable_unique_id_value.clone()).unwrap()
}

/// Write each chunk as a segment and commit a manifest whose watermark is
/// the last archived event
pub async fn seed_cold(
    storage: &dyn ColdObjectStorage,
    service_id: &str,
    chunks: Vec<Vec<SerializableEvent>>,
) -> ColdManifest {
    let cancel = CancellationToken::new();
    let mut segments = Vec::new();
    for (seq, chunk) in chunks.iter().enumerate() {
        let from = chunk.first().unwrap().sortable_unique_id_value.clone();
        let to = chunk.last().unwrap().sortable_unique_id_value.clone();
        let path = segment_path(service_id, &from, &to, seq);
        let data = write_segment(chunk).unwrap();
        segments.push(ColdSegmentInfo {
            path: path.clone(),
            from_sortable_unique_id: from,
            to_sortable_unique_id: to,
            event_count: chunk.len() as u64,
            size_bytes: data.len() as u64,
            sha256: "test".to_string(),
            created_at_utc: fixed_now(),
        });
        storage.put(&path, data, None, &cancel).await.unwrap();
    }
    let watermark = segments.last().unwrap().to_sortable_unique_id.clone();
    let manifest = ColdManifest::empty(service_id).with_appended(segments, watermark, fixed_now());
    control::store(storage, &manifest_path(service_id), &manifest, None, &cancel)
        .await
        .unwrap();
    manifest
}

/// Hot store double that records which read variant was used and can
/// ignore `since` to simulate a backend returning the watermark event again
pub struct TrackingEventStore {
    inner: InMemoryEventStore,
    ignore_since: bool,
    pub typed_reads: AtomicUsize,
    pub serializable_reads: AtomicUsize,
    serializable_max_counts: Mutex<Vec<Option<usize>>>,
}

impl TrackingEventStore {
    pub fn new(events: Vec<SerializableEvent>) -> Self {
        Self {
            inner: InMemoryEventStore::with_events(events),
            ignore_since: false,
            typed_reads: AtomicUsize::new(0),
            serializable_reads: AtomicUsize::new(0),
            serializable_max_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn ignoring_since(events: Vec<SerializableEvent>) -> Self {
        Self {
            ignore_since: true,
            ..Self::new(events)
        }
    }

    pub fn typed_reads(&self) -> usize {
        self.typed_reads.load(Ordering::SeqCst)
    }

    pub fn serializable_reads(&self) -> usize {
        self.serializable_reads.load(Ordering::SeqCst)
    }

    /// `max_count` passed to each serialized read, in call order
    pub fn serializable_max_counts(&self) -> Vec<Option<usize>> {
        self.serializable_max_counts.lock().unwrap().clone()
    }

    fn since<'a>(&self, since: Option<&'a SortableUniqueId>) -> Option<&'a SortableUniqueId> {
        if self.ignore_since {
            None
        } else {
            since
        }
    }
}

#[async_trait]
impl EventStore for TrackingEventStore {
    async fn write_serializable_events(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.inner.write_serializable_events(events).await
    }

    async fn read_all_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        self.typed_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_all_events(self.since(since), max_count).await
    }

    async fn read_all_serializable_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.serializable_reads.fetch_add(1, Ordering::SeqCst);
        self.serializable_max_counts.lock().unwrap().push(max_count);
        self.inner
            .read_all_serializable_events(self.since(since), max_count)
            .await
    }

    async fn read_serializable_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        self.inner.read_serializable_events_by_tag(tag, since).await
    }

    async fn read_event(&self, id: Uuid) -> EventStoreResult<Option<Event>> {
        self.inner.read_event(id).await
    }

    async fn get_event_count(&self, since: Option<&SortableUniqueId>) -> EventStoreResult<u64> {
        self.inner.get_event_count(since).await
    }
}

/// Object storage that fails writes to selected keys
#[derive(Default)]
pub struct FaultyStorage {
    pub inner: InMemoryColdObjectStorage,
    failing_writes: Mutex<Vec<String>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_to(&self, path: impl Into<String>) {
        self.failing_writes.lock().unwrap().push(path.into());
    }

    pub fn heal(&self) {
        self.failing_writes.lock().unwrap().clear();
    }

    fn check(&self, path: &str) -> ColdResult<()> {
        if self.failing_writes.lock().unwrap().iter().any(|p| path.starts_with(p.as_str())) {
            Err(ColdError::Storage(format!("injected failure writing {}", path)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ColdObjectStorage for FaultyStorage {
    async fn get(&self, path: &str, cancel: &CancellationToken) -> ColdResult<ColdStorageObject> {
        self.inner.get(path, cancel).await
    }

    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        self.check(path)?;
        self.inner.put(path, data, expected_etag, cancel).await
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        self.check(path)?;
        self.inner.create(path, data, cancel).await
    }

    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> ColdResult<Vec<String>> {
        self.inner.list(prefix, cancel).await
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> ColdResult<bool> {
        self.inner.delete(path, cancel).await
    }
}
