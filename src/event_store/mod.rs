//! Hot tier event stores
//!
//! This module provides the tier-agnostic `EventStore` contract and two
//! hot-tier backends:
//! - `InMemoryEventStore`: sorted in-memory vector
//! - `JsonlEventStore`: append-only `events.jsonl` with fsync
//!
//! Database-specific backends live outside this crate and only need to
//! implement the trait.

mod jsonl;
mod memory;
mod store;

pub use jsonl::{JsonlEventStore, JsonlEventStoreConfig};
pub use memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreError, EventStoreResult};
