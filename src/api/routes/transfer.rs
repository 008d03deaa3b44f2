//! Transfer Routes
//!
//! CSV export and import of the full store.
//!
//! - GET /api/v1/export - Download everything as CSV
//! - POST /api/v1/import - Import a CSV document

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::dto::ImportResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::transfer;

/// GET /api/v1/export
///
/// Entries and change events share one CSV with a `kind` column.
pub async fn export_csv(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let csv = transfer::export_csv(&state.store)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"tally-export.csv\"",
            ),
        ],
        csv,
    ))
}

/// POST /api/v1/import
///
/// Row-granular: bad rows are reported with their line number while
/// the rest import. Missing metrics and categories are created from
/// the row itself, so an export loads into an empty store.
pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<Json<ImportResponse>> {
    let report = transfer::import_csv(&state.store, &body)?;
    tracing::info!(
        entries = report.entries_imported,
        changes = report.changes_imported,
        metrics_created = report.metrics_created,
        rejected = report.errors.len(),
        "CSV import finished"
    );
    Ok(Json(report.into()))
}
