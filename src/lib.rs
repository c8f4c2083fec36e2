//! Tiered Event Store
//!
//! Hot/cold tiering for an append-only event log ordered by sortable unique
//! IDs. Recent events live in a pluggable hot store; settled events are
//! archived into immutable JSONL segments in object storage, catalogued by
//! a versioned manifest. A hybrid reader merges both tiers into one ordered
//! stream.
//!
//! # Modules
//!
//! - `types`: Event model, sortable ID, manifest and status types
//! - `event_store`: The `EventStore` contract and hot-tier backends
//! - `cold`: Safe window, splitter, segment codec, storage, leases,
//!   exporter, catalog and hybrid reader
//! - `cache`: Local mirror of a remote event store
//! - `config`: Environment-driven process configuration
//! - `api`: Axum ops surface
//! - `utils`: Atomic file writes and the injectable clock
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tiered_event_store::cold::{
//!     ColdEventStoreOptions, ColdExporter, HybridEventStore, InMemoryColdLeaseManager,
//!     InMemoryColdObjectStorage,
//! };
//! use tiered_event_store::event_store::{EventStore, InMemoryEventStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let hot: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
//! let cold = Arc::new(InMemoryColdObjectStorage::new());
//! let options = ColdEventStoreOptions::enabled();
//!
//! let exporter = ColdExporter::new(
//!     hot.clone(),
//!     cold.clone(),
//!     Arc::new(InMemoryColdLeaseManager::new()),
//!     options.clone(),
//! );
//! exporter.export_incremental("default", &CancellationToken::new()).await?;
//!
//! let hybrid = HybridEventStore::new(hot, Some(cold), options);
//! let _events = hybrid.read_all_serializable_events(None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod cold;
pub mod config;
pub mod event_store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use cold::{ColdError, ColdEventStoreOptions, ColdExporter, HybridEventStore};
pub use event_store::{EventStore, EventStoreError};
pub use types::{Event, SerializableEvent, SortableUniqueId, Tag};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
