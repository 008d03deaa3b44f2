//! Entry Routes
//!
//! Observation CRUD plus the batched confirm-and-commit path.
//!
//! - GET /api/v1/metrics/:id/entries - List a metric's entries
//! - POST /api/v1/entries - Record an observation
//! - PUT /api/v1/entries/:id - Full-payload update
//! - DELETE /api/v1/entries/:id - Delete an entry
//! - POST /api/v1/entries/commit - Apply a batch of staged edits

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    CommitResponse, CreateEntryRequest, DeleteResponse, EntryListResponse, UpdateEntryRequest,
};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::session::{self, ChangeSet};
use crate::store::Entry;

/// GET /api/v1/metrics/:id/entries
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path(metric_id): Path<i64>,
) -> ApiResult<Json<EntryListResponse>> {
    state.store.get_metric(metric_id)?;
    let entries = state.store.entries_for_metric(metric_id)?;
    Ok(Json(EntryListResponse {
        total: entries.len(),
        entries,
    }))
}

/// POST /api/v1/entries
///
/// The value is validated against the metric's unit before anything is
/// written; a date without a time lands at midday.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEntryRequest>,
) -> ApiResult<(StatusCode, Json<Entry>)> {
    let entry = state
        .store
        .add_entry(req.metric_id, req.value, req.date, req.time)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /api/v1/entries/:id
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEntryRequest>,
) -> ApiResult<Json<Entry>> {
    let entry = state.store.update_entry(id, req.value, req.recorded_at)?;
    Ok(Json(entry))
}

/// DELETE /api/v1/entries/:id
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    state.store.delete_entry(id)?;
    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/v1/entries/commit
///
/// Validates every staged row first; a 422 here means nothing was
/// written.
pub async fn commit_entries(
    State(state): State<Arc<AppState>>,
    Json(change_set): Json<ChangeSet>,
) -> ApiResult<Json<CommitResponse>> {
    let outcome = session::commit(&state.store, &change_set)?;
    Ok(Json(outcome.into()))
}
