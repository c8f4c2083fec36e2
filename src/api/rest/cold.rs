//! Cold tier ops endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::{validate_service_id, ApiError, ApiFailure, ApiResponse};
use crate::api::state::AppState;
use crate::cold::ColdExporter;
use crate::types::{ColdDataRangeSummary, ColdFeatureStatus, ColdStoreProgress, ExportResult};

fn exporter(state: &AppState) -> Result<&Arc<ColdExporter>, ApiFailure> {
    state.exporter.as_ref().ok_or_else(|| {
        ApiFailure(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::unavailable("No cold object storage is configured"),
        )
    })
}

/// GET /api/cold/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<ColdFeatureStatus>, ApiFailure> {
    Ok(ApiResponse::new(
        state.catalog.get_status(&state.shutdown).await?,
    ))
}

/// GET /api/cold/:service_id/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<ApiResponse<ColdDataRangeSummary>, ApiFailure> {
    validate_service_id(&service_id)?;
    let summary = state
        .catalog
        .get_data_range_summary(&service_id, &state.shutdown)
        .await?;
    let total = summary.segment_count;
    Ok(ApiResponse::with_total(summary, total))
}

/// GET /api/cold/:service_id/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<ApiResponse<ColdStoreProgress>, ApiFailure> {
    validate_service_id(&service_id)?;
    let progress = exporter(&state)?
        .get_progress(&service_id, &state.shutdown)
        .await?;
    Ok(ApiResponse::new(progress))
}

/// POST /api/cold/:service_id/export - run one export cycle immediately
pub async fn trigger_export(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<ApiResponse<ExportResult>, ApiFailure> {
    validate_service_id(&service_id)?;
    let result = exporter(&state)?
        .export_incremental(&service_id, &state.shutdown)
        .await?;
    Ok(ApiResponse::new(result))
}
