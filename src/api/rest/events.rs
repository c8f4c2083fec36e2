//! Hybrid event read endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::{ApiError, ApiFailure, ApiResponse};
use crate::api::state::AppState;
use crate::types::{SerializableEvent, SortableUniqueId};

/// Query parameters for reading events
#[derive(Debug, Deserialize)]
pub struct ReadEventsParams {
    /// Exclusive lower bound (sortable unique ID)
    pub since: Option<String>,
    /// Maximum number of events to return (default: 1000, max: 10000)
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_max_count() -> usize {
    1000
}

/// GET /api/events - ordered events across cold and hot tiers
pub async fn read_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadEventsParams>,
) -> Result<ApiResponse<Vec<SerializableEvent>>, ApiFailure> {
    let since = params
        .since
        .filter(|s| !s.is_empty())
        .map(SortableUniqueId::parse)
        .transpose()
        .map_err(|e| ApiFailure(StatusCode::BAD_REQUEST, ApiError::bad_request(e.to_string())))?;

    let events = state
        .hybrid
        .read_serializable_with_cancel(
            since.as_ref(),
            Some(params.max_count.min(10_000)),
            &state.shutdown,
        )
        .await?;
    let total = events.len();
    Ok(ApiResponse::with_total(events, total))
}
