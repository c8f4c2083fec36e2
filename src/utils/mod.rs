//! Utility functions and helpers
//!
//! Atomic file writes and the injectable clock.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_write, atomic_write_with, cleanup_temp_files};
pub use time::{system_clock, Clock, ManualClock, SystemClock};
