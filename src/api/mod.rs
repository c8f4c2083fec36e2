//! API module for HTTP endpoints
//!
//! This module provides the REST ops surface for the tiered event store.

pub mod http;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use state::AppState;
