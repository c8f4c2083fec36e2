//! In-memory hot store
//!
//! Keeps every event in one sorted vector. Used by tests and as a cheap
//! hot tier for local tooling.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{Event, SerializableEvent, SortableUniqueId, Tag};

use super::store::{
    select_after, sort_by_sortable_id, validate_events, EventStore, EventStoreResult,
};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<SerializableEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `events`
    pub fn with_events(events: Vec<SerializableEvent>) -> Self {
        let mut events = events;
        sort_by_sortable_id(&mut events);
        Self {
            events: RwLock::new(events),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn write_serializable_events(
        &self,
        events: Vec<SerializableEvent>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        validate_events(&events)?;
        let mut stored = self.events.write();
        stored.extend(events.iter().cloned());
        sort_by_sortable_id(&mut stored);
        Ok(events)
    }

    async fn read_all_events(
        &self,
        since: Option<&SortableUniqueId>,
        max_count: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        let wire = select_after(&self.events.read(), since, max_count);
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
        Ok(select_after(&self.events.read(), since, max_count))
    }

    async fn read_serializable_events_by_tag(
        &self,
        tag: &Tag,
        since: Option<&SortableUniqueId>,
    ) -> EventStoreResult<Vec<SerializableEvent>> {
        Ok(select_after(&self.events.read(), since, None)
            .into_iter()
            .filter(|e| e.has_tag(tag))
            .collect())
    }

    async fn read_event(&self, id: Uuid) -> EventStoreResult<Option<Event>> {
        let found = self.events.read().iter().find(|e| e.id == id).cloned();
        Ok(found.map(|e| e.to_event()).transpose()?)
    }

    async fn get_event_count(&self, since: Option<&SortableUniqueId>) -> EventStoreResult<u64> {
        Ok(select_after(&self.events.read(), since, None).len() as u64)
    }
}
