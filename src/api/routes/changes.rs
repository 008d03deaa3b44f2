//! Change Event Routes
//!
//! Life-change annotations tied to a category, shown alongside its
//! metrics.
//!
//! - GET /api/v1/changes - List change events (newest first)
//! - POST /api/v1/changes - Record a change event
//! - GET /api/v1/changes/:id - Get a change event
//! - PUT /api/v1/changes/:id - Full-payload update
//! - DELETE /api/v1/changes/:id - Delete a change event

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    ChangeListQuery, ChangeListResponse, CreateChangeRequest, DeleteResponse, UpdateChangeRequest,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::ChangeEvent;

/// GET /api/v1/changes?category_id=3
pub async fn list_changes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChangeListQuery>,
) -> ApiResult<Json<ChangeListResponse>> {
    let changes = state.store.list_change_events(query.category_id)?;
    Ok(Json(ChangeListResponse {
        total: changes.len(),
        changes,
    }))
}

/// POST /api/v1/changes
pub async fn create_change(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChangeRequest>,
) -> ApiResult<(StatusCode, Json<ChangeEvent>)> {
    let when = req.event_time().map_err(ApiError::Validation)?;
    let change =
        state
            .store
            .add_change_event(req.category_id, &req.title, req.notes.as_deref(), when)?;
    Ok((StatusCode::CREATED, Json(change)))
}

/// GET /api/v1/changes/:id
pub async fn get_change(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ChangeEvent>> {
    let change = state.store.get_change_event(id)?;
    Ok(Json(change))
}

/// PUT /api/v1/changes/:id
pub async fn update_change(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateChangeRequest>,
) -> ApiResult<Json<ChangeEvent>> {
    let change =
        state
            .store
            .update_change_event(id, &req.title, req.notes.as_deref(), req.recorded_at)?;
    Ok(Json(change))
}

/// DELETE /api/v1/changes/:id
pub async fn delete_change(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    state.store.delete_change_event(id)?;
    Ok(Json(DeleteResponse { deleted: true }))
}
