//! Shared application state for HTTP handlers

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cold::{ColdCatalogReader, ColdExporter, HybridEventStore};

pub struct AppState {
    /// Serialized reads across both tiers
    pub hybrid: Arc<HybridEventStore>,
    pub catalog: ColdCatalogReader,
    /// `None` when no cold storage is configured
    pub exporter: Option<Arc<ColdExporter>>,
    /// Cancelled on process shutdown; in-flight requests observe it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        hybrid: Arc<HybridEventStore>,
        catalog: ColdCatalogReader,
        exporter: Option<Arc<ColdExporter>>,
    ) -> Self {
        Self {
            hybrid,
            catalog,
            exporter,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
