//! Session Routes
//!
//! Editing sessions hold a draft of staged entry edits that only hit
//! the store on an explicit commit. Discarding the session discards
//! the draft.
//!
//! - POST /api/v1/sessions - Open a session
//! - GET /api/v1/sessions/:id/draft - Inspect the staged draft
//! - PUT /api/v1/sessions/:id/draft - Replace the staged draft
//! - POST /api/v1/sessions/:id/commit - Apply and clear the draft
//! - DELETE /api/v1/sessions/:id - Close the session, dropping the draft

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CommitResponse, DeleteResponse, SessionResponse, StageDraftRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::session::{self, ChangeSet};

fn unknown_session(id: &str) -> ApiError {
    ApiError::NotFound(format!("session '{}'", id))
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.create();
    tracing::debug!(session_id = %session.id, "Opened editing session");
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id,
            created_at: session.created_at.to_rfc3339(),
        }),
    )
}

/// GET /api/v1/sessions/:id/draft
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChangeSet>> {
    let draft = state
        .sessions
        .with(&id, |s| s.draft.clone())
        .ok_or_else(|| unknown_session(&id))?;
    Ok(Json(draft))
}

/// PUT /api/v1/sessions/:id/draft
///
/// Staging never touches the store; bad rows surface at commit time.
pub async fn stage_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StageDraftRequest>,
) -> ApiResult<StatusCode> {
    state
        .sessions
        .with(&id, |s| {
            s.selected_metric = req.selected_metric;
            s.draft = req.draft;
        })
        .ok_or_else(|| unknown_session(&id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/commit
///
/// The draft is taken out of the session up front so a successful
/// commit cannot be applied twice; on a validation failure it is put
/// back untouched for the client to fix.
pub async fn commit_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommitResponse>> {
    let draft = state
        .sessions
        .with(&id, |s| s.take_draft())
        .ok_or_else(|| unknown_session(&id))?;

    match session::commit(&state.store, &draft) {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            if matches!(e, session::CommitError::Invalid(_)) {
                state.sessions.with(&id, |s| s.draft = draft);
            }
            Err(e.into())
        }
    }
}

/// DELETE /api/v1/sessions/:id
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.sessions.remove(&id) {
        return Err(unknown_session(&id));
    }
    Ok(Json(DeleteResponse { deleted: true }))
}
