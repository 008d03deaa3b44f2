//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes. Accumulated
//! validation errors travel in the `details` array so the client can
//! show the full set, not just the first failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::session::CommitError;
use crate::store::StoreError;
use crate::transfer::TransferError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store layer error
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Draft commit error
    #[error("{0}")]
    Commit(#[from] CommitError),

    /// Auth collaborator error
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Import/export error
    #[error("{0}")]
    Transfer(#[from] TransferError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (dependency down or not configured)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Individual failures when several accumulated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ApiError {
    fn status_code_and_details(&self) -> (StatusCode, &'static str, Vec<String>) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", Vec::new()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", Vec::new()),
            ApiError::Store(e) => match e {
                StoreError::DuplicateName { .. } => {
                    (StatusCode::CONFLICT, "DUPLICATE_NAME", Vec::new())
                }
                StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", Vec::new()),
                StoreError::InvalidValue(errors) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    errors.iter().map(|e| e.to_string()).collect(),
                ),
                StoreError::RangeConflict { .. } => {
                    (StatusCode::CONFLICT, "RANGE_CONFLICT", Vec::new())
                }
                StoreError::EmptyTitle | StoreError::EmptyName => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", Vec::new())
                }
                StoreError::Sqlite(_) | StoreError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", Vec::new())
                }
            },
            ApiError::Commit(e) => match e {
                CommitError::Invalid(issues) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    issues
                        .iter()
                        .map(|i| format!("{:?}: {}", i.row, i.message))
                        .collect(),
                ),
                // The client needs to know exactly what landed before the failure
                CommitError::Partial { applied, row, .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PARTIAL_COMMIT",
                    vec![
                        format!("deleted rows applied: {}", applied.deleted),
                        format!("updated rows applied: {}", applied.updated),
                        format!("added rows applied: {}", applied.added),
                        format!("failed at {:?}", row),
                    ],
                ),
            },
            ApiError::Auth(e) => match e {
                AuthError::Failure(_) => (StatusCode::UNAUTHORIZED, "AUTH_FAILURE", Vec::new()),
                AuthError::Timeout | AuthError::Unavailable => {
                    (StatusCode::SERVICE_UNAVAILABLE, "AUTH_UNAVAILABLE", Vec::new())
                }
                AuthError::Request(_) => {
                    (StatusCode::BAD_GATEWAY, "AUTH_REQUEST_ERROR", Vec::new())
                }
            },
            ApiError::Transfer(_) => (StatusCode::BAD_REQUEST, "TRANSFER_ERROR", Vec::new()),
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", Vec::new())
            }
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", Vec::new())
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", Vec::new()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.status_code_and_details();

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ValueError;

    #[test]
    fn test_status_mapping() {
        let (status, code, _) = ApiError::Store(StoreError::DuplicateName {
            kind: "category",
            name: "sleep".into(),
        })
        .status_code_and_details();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "DUPLICATE_NAME");

        let (status, _, details) = ApiError::Store(StoreError::InvalidValue(vec![
            ValueError::NonInteger { value: 1.5 },
            ValueError::BelowMin { value: 1.5, min: 2 },
        ]))
        .status_code_and_details();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(details.len(), 2);

        let (status, code, _) = ApiError::Auth(AuthError::Failure("bad password".into()))
            .status_code_and_details();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "AUTH_FAILURE");
    }

    #[test]
    fn test_partial_commit_reports_applied_breakdown() {
        use crate::session::{CommitOutcome, RowRef};

        let err = ApiError::Commit(CommitError::Partial {
            applied: CommitOutcome {
                deleted: 2,
                updated: 1,
                added: 0,
            },
            row: RowRef::Added(3),
            source: StoreError::NotFound {
                kind: "metric",
                id: 9,
            },
        });

        let (status, code, details) = err.status_code_and_details();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "PARTIAL_COMMIT");
        assert_eq!(
            details,
            vec![
                "deleted rows applied: 2".to_string(),
                "updated rows applied: 1".to_string(),
                "added rows applied: 0".to_string(),
                "failed at Added(3)".to_string(),
            ]
        );
    }
}
