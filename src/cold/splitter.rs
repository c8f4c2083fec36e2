//! Segment splitter
//!
//! Chunks an ordered batch so that no chunk exceeds the event count limit or
//! the cumulative payload byte limit. A single event larger than the byte
//! limit still forms its own chunk rather than being dropped.

use crate::types::SerializableEvent;

/// Split `events` into contiguous, order-preserving, non-empty chunks
pub fn split(
    events: Vec<SerializableEvent>,
    max_events: usize,
    max_bytes: u64,
) -> Vec<Vec<SerializableEvent>> {
    let max_events = max_events.max(1);
    let max_bytes = max_bytes.max(1);

    let mut chunks = Vec::new();
    let mut current: Vec<SerializableEvent> = Vec::new();
    let mut current_bytes = 0u64;

    for event in events {
        let size = event.payload.len() as u64;
        let full = current.len() >= max_events || current_bytes + size > max_bytes;
        if full && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(event);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
