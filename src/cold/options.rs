//! Cold tier configuration
//!
//! Passed explicitly into the exporter, the hybrid reader and the catalog
//! so tests can use any window or segment size.

use std::time::Duration;

use super::error::{ColdError, ColdResult};

/// Configuration for the cold event tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdEventStoreOptions {
    /// Feature flag; a deployment can support cold storage with it off
    pub enabled: bool,
    /// Export period, also used as the export lease duration
    pub pull_interval: Duration,
    /// Events newer than `now - safe_window` are not archived yet
    pub safe_window: Duration,
    /// Maximum events per segment
    pub segment_max_events: usize,
    /// Maximum cumulative payload bytes per segment
    pub segment_max_bytes: u64,
}

impl Default for ColdEventStoreOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            pull_interval: Duration::from_secs(30 * 60),
            safe_window: Duration::from_secs(2 * 60),
            segment_max_events: 100_000,
            segment_max_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ColdEventStoreOptions {
    /// Defaults with the feature switched on
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_pull_interval(mut self, pull_interval: Duration) -> Self {
        self.pull_interval = pull_interval;
        self
    }

    pub fn with_safe_window(mut self, safe_window: Duration) -> Self {
        self.safe_window = safe_window;
        self
    }

    pub fn with_segment_limits(mut self, max_events: usize, max_bytes: u64) -> Self {
        self.segment_max_events = max_events;
        self.segment_max_bytes = max_bytes;
        self
    }

    pub fn validate(&self) -> ColdResult<()> {
        if self.segment_max_events == 0 {
            return Err(ColdError::InvalidOptions(
                "segment_max_events must be greater than zero".to_string(),
            ));
        }
        if self.segment_max_bytes == 0 {
            return Err(ColdError::InvalidOptions(
                "segment_max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.pull_interval.is_zero() {
            return Err(ColdError::InvalidOptions(
                "pull_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
