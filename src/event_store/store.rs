//! Event Store contract
//!
//! Tier-agnostic interface every hot-tier backend satisfies. The tiering
//! core only depends on this trait, never on a concrete database.
//!
//! All reads return events ordered by sortable ID ascending; `since` is
//! exclusive.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Event, SerializableEvent, SortableIdError, SortableUniqueId, Tag};

/// Result type for EventStore operations
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Errors that can occur in EventStore operations
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Invalid sortable id: {0}")]
    InvalidSortableId(#[from] SortableIdError),
    #[error("Event not found: {0}")]
    NotFound(String),
    /// Network, throttling or other backend failure; the caller may retry
    #[error("Backend unavailable: {0}")]
    Backend(String),
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append wire-form events
    async fn write_serializable_events(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<Vec<SerializableEvent>>;

    /// Read every event after `since` in typed form
    async fn read_all_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<Event>>;

    /// Read every event after `since` in wire form
    async fn read_all_serializable_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<SerializableEvent>>;

    /// Read the wire-form events of one tag's stream
    async fn read_serializable_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<SerializableEvent>>;

    async fn read_event(&self, id: Uuid) -> EventStoreResult<Option<Event>>;

    async fn get_event_count(&self, since: Option<&SortableUniqueId>) -> EventStoreResult<u64>;

    /// Append typed events
    async fn write_events(&self, events: Vec<Event>) -> EventStoreResult<Vec<Event>> {
        let wire = events
            .iter()
            .map(Event::to_serializable)
            .collect::<Result<Vec<_>, _>>()?;
        self.write_serializable_events(wire).await?;
        Ok(events)
    }

    async fn read_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<Event>> {
        let wire = self.read_serializable_events_by_tag(tag, since).await?;
        Ok(wire
            .iter()
            .map(SerializableEvent::to_event)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn tag_exists(&self, tag: &Tag) -> EventStoreResult<bool> {
        Ok(!self.read_serializable_events_by_tag(tag, None).await?.is_empty())
    }
}

/// Reject events whose sortable ID is malformed
pub(crate) fn validate_events(events: &[SerializableEvent]) -> EventStoreResult<()> {
    for event in events {
        SortableUniqueId::parse(event.sortable_unique_id_value.as_str())?;
        if event.event_payload_name.is_empty() {
            return Err(EventStoreError::InvalidEvent(format!(
                "event {} has no payload name",
                event.id
            )));
        }
    }
    Ok(())
}

/// Apply the `since` (exclusive) and `max_count` bounds to an ordered slice
pub(crate) fn select_after(
    events: &[SerializableEvent],
    since: Option<&SortableUniqueId>,
    max_count: Option<usize>,
) -> Vec<SerializableEvent> {
    let start = match since {
        Some(since) => {
            events.partition_point(|e| e.sortable_unique_id_value.as_str() <= since.as_str())
        }
        None => 0,
    };
    let limit = max_count.unwrap_or(usize::MAX);
    events[start..].iter().take(limit).cloned().collect()
}

/// Stable sort by sortable ID; equal IDs keep their write order
pub(crate) fn sort_by_sortable_id(events: &mut [SerializableEvent]) {
    events.sort_by(|a, b| a.sortable_unique_id_value.cmp(&b.sortable_unique_id_value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventMetadata;

    fn event(id: &str) -> SerializableEvent {
        SerializableEvent {
            payload: b"{}".to_vec(),
            sortable_unique_id_value: id.to_string(),
            id: Uuid::new_v4(),
            event_metadata: EventMetadata::default(),
            tags: vec![],
            event_payload_name: "Test".to_string(),
        }
    }

    #[test]
    fn test_select_after_is_exclusive() {
        let events = vec![event("a"), event("b"), event("c")];
        let since = SortableUniqueId::parse("000000000000000000000000000000").unwrap();
        assert_eq!(select_after(&events, Some(&since), None).len(), 3);
        assert_eq!(select_after(&events, None, Some(2)).len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        assert!(matches!(
            validate_events(&[event("bad")]),
            Err(EventStoreError::InvalidSortableId(_))
        ));
    }
}
