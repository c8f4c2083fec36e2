//! JSONL Event Store - file-backed hot tier
//!
//! Events are appended to `events.jsonl` with fsync for durability. The
//! store also persists a `CacheMetadata` document so it can serve as the
//! local mirror of a remote store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::types::{CacheMetadata, Event, SerializableEvent, SortableUniqueId, Tag};
use crate::utils::atomic_write;

use super::store::{
    select_after, sort_by_sortable_id, validate_events, EventStore, EventStoreError,
    EventStoreResult,
};

/// Configuration for the JsonlEventStore
#[derive(Debug, Clone)]
pub struct JsonlEventStoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
}

impl Default for JsonlEventStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/hot"),
        }
    }
}

impl JsonlEventStoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get path to events.jsonl
    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    /// Get path to the cache metadata document
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("cache_metadata.json")
    }
}

/// Append-only JSONL hot store
pub struct JsonlEventStore {
    config: JsonlEventStoreConfig,
    /// Serializes appends and clears within this process
    write_lock: Mutex<()>,
}

impl JsonlEventStore {
    pub fn new(config: JsonlEventStoreConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &JsonlEventStoreConfig {
        &self.config
    }

    /// Load every event, sorted by sortable ID
    async fn load_events(&self) -> EventStoreResult<Vec<SerializableEvent>> {
        let content = match fs::read_to_string(self.config.events_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event = SerializableEvent::from_json_line(line).map_err(|e| {
                EventStoreError::InvalidEvent(format!("line {}: {}", line_num + 1, e))
            })?;
            events.push(event);
        }

        sort_by_sortable_id(&mut events);
        Ok(events)
    }

    /// Read the cache metadata, if any was written
    pub async fn get_metadata(&self) -> EventStoreResult<Option<CacheMetadata>> {
        match fs::read(self.config.metadata_path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the cache metadata atomically
    pub async fn set_metadata(&self, metadata: &CacheMetadata) -> EventStoreResult<()> {
        let bytes = serde_json::to_vec_pretty(metadata)?;
        let path = self.config.metadata_path();
        tokio::task::spawn_blocking(move || atomic_write(path, &bytes))
            .await
            .map_err(|e| EventStoreError::Backend(e.to_string()))??;
        Ok(())
    }

    /// Remove all events and metadata
    pub async fn clear(&self) -> EventStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        for path in [self.config.events_path(), self.config.metadata_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(data_dir = %self.config.data_dir.display(), "cleared jsonl event store");
        Ok(())
    }

    /// Size of the event log in bytes
    pub async fn size_bytes(&self) -> EventStoreResult<u64> {
        match fs::metadata(self.config.events_path()).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl EventStore for JsonlEventStore {
    async fn write_serializable_events(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        validate_events(&events)?;
        if events.is_empty() {
            return Ok(events);
        }

        let mut buffer = String::new();
        for event in &events {
            buffer.push_str(&event.to_json_line()?);
            buffer.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.config.data_dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.events_path())
            .await?;
        file.write_all(buffer.as_bytes()).await?;

        // Sync to disk for durability
        file.sync_all().await?;

        Ok(events)
    }

    async fn read_all_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        let wire = select_after(&self.load_events().await?, since, max_count);
        Ok(wire
            .iter()
            .map(SerializableEvent::to_event)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn read_all_serializable_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        Ok(select_after(&self.load_events().await?, since, max_count))
    }

    async fn read_serializable_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        Ok(select_after(&self.load_events().await?, since, None)
            .into_iter()
            .filter(|e| e.has_tag(tag))
            .collect())
    }

    async fn read_event(&self, id: Uuid) -> EventStoreResult<Option<Event>> {
        let events = self.load_events().await?;
        Ok(events
            .iter()
            .find(|e| e.id == id)
            .map(SerializableEvent::to_event)
            .transpose()?)
    }

    async fn get_event_count(&self, since: Option<&SortableUniqueId>) -> EventStoreResult<u64> {
        Ok(select_after(&self.load_events().await?, since, None).len() as u64)
    }
}
