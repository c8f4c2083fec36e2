//! Local mirror of a remote event store
//!
//! Keeps a `JsonlEventStore` in step with any `EventStore` using the
//! serialized path, so payloads are never decoded. The cache is only ever
//! appended to or rebuilt; it never trusts metadata written for a different
//! remote.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cold::safe_window;
use crate::event_store::{EventStore, EventStoreResult, JsonlEventStore};
use crate::types::{CacheMetadata, SerializableEvent, SortableUniqueId};
use crate::utils::time::Clock;
use crate::utils::system_clock;

/// Identity of the remote being mirrored plus the settle window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSyncOptions {
    pub remote_endpoint: String,
    pub database_name: String,
    pub schema_version: String,
    /// Events newer than `now - safe_window` are not cached yet; zero disables
    pub safe_window: Duration,
}

impl Default for CacheSyncOptions {
    fn default() -> Self {
        Self {
            remote_endpoint: String::new(),
            database_name: String::new(),
            schema_version: String::new(),
            safe_window: Duration::from_secs(2 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSyncAction {
    NoChanges,
    AppendedNewEvents,
    RebuiltFromScratch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSyncResult {
    pub action: CacheSyncAction,
    pub events_added: u64,
    pub total_events: u64,
    pub elapsed: Duration,
}

/// Snapshot of the local cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    pub event_count: u64,
    pub size_bytes: u64,
    pub remote_endpoint: Option<String>,
    pub database_name: Option<String>,
    pub last_cached_sortable_unique_id: Option<String>,
    pub last_sync_utc: Option<DateTime<Utc>>,
    pub created_utc: Option<DateTime<Utc>>,
}

pub struct EventStoreCacheSync {
    local: Arc<JsonlEventStore>,
    remote: Arc<dyn EventStore>,
    options: CacheSyncOptions,
    clock: Arc<dyn Clock>,
}

impl EventStoreCacheSync {
    pub fn new(
        local: Arc<JsonlEventStore>,
        remote: Arc<dyn EventStore>,
        options: CacheSyncOptions,
    ) -> Self {
        Self {
            local,
            remote,
            options,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bring the local cache up to date with the remote
    #[instrument(skip(self))]
    pub async fn sync(&self) -> EventStoreResult<CacheSyncResult> {
        let started = Instant::now();

        let mut metadata = self.local.get_metadata().await?;
        if !self.metadata_matches(metadata.as_ref()) {
            info!("cache metadata missing or stale, clearing cache");
            self.local.clear().await?;
            metadata = None;
        }

        let remote_count = self.remote.get_event_count(None).await?;
        let local_count = self.local.get_event_count(None).await?;
        info!(remote_count, local_count, "comparing event counts");

        // More local than remote means the remote lost or deleted events
        if local_count > remote_count {
            warn!(local_count, remote_count, "local cache ahead of remote, rebuilding");
            self.local.clear().await?;
            return self.rebuild(remote_count, started).await;
        }

        if local_count == remote_count {
            return Ok(CacheSyncResult {
                action: CacheSyncAction::NoChanges,
                events_added: 0,
                total_events: local_count,
                elapsed: started.elapsed(),
            });
        }

        let since = metadata
            .as_ref()
            .and_then(|m| m.last_cached_sortable_unique_id.clone())
            .map(SortableUniqueId::parse)
            .transpose()?;
        let fetched = self
            .remote
            .read_all_serializable_events(since.as_ref(), None)
            .await?;
        let (to_cache, threshold) = self.settled(fetched)?;
        let Some(last) = to_cache.last() else {
            info!("no settled events to cache");
            return Ok(CacheSyncResult {
                action: CacheSyncAction::NoChanges,
                events_added: 0,
                total_events: local_count,
                elapsed: started.elapsed(),
            });
        };
        let last_id = last.sortable_unique_id_value.clone();
        let added = to_cache.len() as u64;

        self.local.write_serializable_events(to_cache).await?;
        let now = self.clock.now();
        self.local
            .set_metadata(&CacheMetadata {
                remote_endpoint: self.options.remote_endpoint.clone(),
                database_name: self.options.database_name.clone(),
                schema_version: self.options.schema_version.clone(),
                total_count_at_fetch: remote_count,
                last_cached_sortable_unique_id: Some(last_id),
                last_safe_window_utc: threshold,
                created_utc: metadata.map(|m| m.created_utc).unwrap_or(now),
                updated_utc: now,
            })
            .await?;

        info!(added, total = local_count + added, "cache sync appended events");
        Ok(CacheSyncResult {
            action: CacheSyncAction::AppendedNewEvents,
            events_added: added,
            total_events: local_count + added,
            elapsed: started.elapsed(),
        })
    }

    async fn rebuild(&self, remote_count: u64, started: Instant) -> EventStoreResult<CacheSyncResult> {
        let fetched = self.remote.read_all_serializable_events(None, None).await?;
        let (to_cache, threshold) = self.settled(fetched)?;
        let added = to_cache.len() as u64;

        if let Some(last_id) = to_cache.last().map(|e| e.sortable_unique_id_value.clone()) {
            self.local.write_serializable_events(to_cache).await?;
            let now = self.clock.now();
            self.local
                .set_metadata(&CacheMetadata {
                    remote_endpoint: self.options.remote_endpoint.clone(),
                    database_name: self.options.database_name.clone(),
                    schema_version: self.options.schema_version.clone(),
                    total_count_at_fetch: remote_count,
                    last_cached_sortable_unique_id: Some(last_id),
                    last_safe_window_utc: threshold,
                    created_utc: now,
                    updated_utc: now,
                })
                .await?;
        }

        info!(added, "cache rebuilt");
        Ok(CacheSyncResult {
            action: CacheSyncAction::RebuiltFromScratch,
            events_added: added,
            total_events: added,
            elapsed: started.elapsed(),
        })
    }

    /// Drop events still inside the safe window; returns the cutoff used
    fn settled(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<(Vec<SerializableEvent>, Option<DateTime<Utc>>)> {
        if self.options.safe_window.is_zero() {
            return Ok((events, None));
        }
        let cutoff = safe_window::cutoff(self.clock.now(), self.options.safe_window);
        Ok((safe_window::apply(events, cutoff)?, Some(cutoff)))
    }

    /// Empty configured values match anything
    fn metadata_matches(&self, metadata: Option<&CacheMetadata>) -> bool {
        let Some(metadata) = metadata else {
            return false;
        };
        let checks = [
            ("remote endpoint", &self.options.remote_endpoint, &metadata.remote_endpoint),
            ("database name", &self.options.database_name, &metadata.database_name),
            ("schema version", &self.options.schema_version, &metadata.schema_version),
        ];
        for (field, configured, cached) in checks {
            if !configured.is_empty() && configured != cached {
                warn!(field, old = %cached, new = %configured, "cache identity changed");
                return false;
            }
        }
        true
    }

    pub async fn clear(&self) -> EventStoreResult<()> {
        self.local.clear().await?;
        info!("cache cleared");
        Ok(())
    }

    pub async fn statistics(&self) -> EventStoreResult<CacheStatistics> {
        let metadata = self.local.get_metadata().await?;
        Ok(CacheStatistics {
            event_count: self.local.get_event_count(None).await?,
            size_bytes: self.local.size_bytes().await?,
            remote_endpoint: metadata.as_ref().map(|m| m.remote_endpoint.clone()),
            database_name: metadata.as_ref().map(|m| m.database_name.clone()),
            last_cached_sortable_unique_id: metadata
                .as_ref()
                .and_then(|m| m.last_cached_sortable_unique_id.clone()),
            last_sync_utc: metadata.as_ref().map(|m| m.updated_utc),
            created_utc: metadata.map(|m| m.created_utc),
        })
    }
}
