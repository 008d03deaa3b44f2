//! Tally REST API
//!
//! HTTP API layer for Tally, built with Axum.
//!
//! # Endpoints
//!
//! ## Categories
//! - `GET /api/v1/categories` - List categories
//! - `POST /api/v1/categories` - Create a category
//! - `GET /api/v1/categories/:id` - Get a category
//!
//! ## Metrics
//! - `GET /api/v1/metrics` - List metrics (`?include_archived=true` for all)
//! - `POST /api/v1/metrics` - Define a metric
//! - `GET /api/v1/metrics/:id` - Get a metric
//! - `PUT /api/v1/metrics/:id` - Update a metric
//! - `POST /api/v1/metrics/:id/archive` - Archive
//! - `POST /api/v1/metrics/:id/restore` - Un-archive
//! - `GET /api/v1/metrics/:id/stats` - Summary statistics
//! - `GET /api/v1/metrics/:id/chart` - Chart series (`?range=last_month`)
//! - `GET /api/v1/metrics/:id/entries` - The metric's entries
//!
//! ## Entries
//! - `POST /api/v1/entries` - Record an observation
//! - `PUT /api/v1/entries/:id` - Update an entry
//! - `DELETE /api/v1/entries/:id` - Delete an entry
//! - `POST /api/v1/entries/commit` - Apply a batch of staged edits
//!
//! ## Sessions
//! - `POST /api/v1/sessions` - Open an editing session
//! - `GET/PUT /api/v1/sessions/:id/draft` - Inspect / replace the draft
//! - `POST /api/v1/sessions/:id/commit` - Commit the draft
//! - `DELETE /api/v1/sessions/:id` - Close, dropping the draft
//!
//! ## Change events
//! - `GET /api/v1/changes` - List (`?category_id=` to filter)
//! - `POST /api/v1/changes` - Record a change event
//! - `GET/PUT/DELETE /api/v1/changes/:id`
//!
//! ## Transfer
//! - `GET /api/v1/export` - CSV download
//! - `POST /api/v1/import` - CSV import
//!
//! ## Auth
//! - `POST /api/v1/auth/{signin,signup,signout,recover,verify,invite}`
//! - `GET /api/v1/auth/session`, `GET /api/v1/auth/users`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState, config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        // Category routes
        .route("/categories", get(routes::categories::list_categories))
        .route("/categories", post(routes::categories::create_category))
        .route("/categories/:id", get(routes::categories::get_category))
        // Metric routes
        .route("/metrics", get(routes::metrics::list_metrics))
        .route("/metrics", post(routes::metrics::create_metric))
        .route("/metrics/:id", get(routes::metrics::get_metric))
        .route("/metrics/:id", put(routes::metrics::update_metric))
        .route("/metrics/:id/archive", post(routes::metrics::archive_metric))
        .route("/metrics/:id/restore", post(routes::metrics::restore_metric))
        .route("/metrics/:id/stats", get(routes::metrics::metric_stats))
        .route("/metrics/:id/chart", get(routes::metrics::metric_chart))
        .route("/metrics/:id/entries", get(routes::entries::list_entries))
        // Entry routes
        .route("/entries", post(routes::entries::create_entry))
        .route("/entries/commit", post(routes::entries::commit_entries))
        .route("/entries/:id", put(routes::entries::update_entry))
        .route("/entries/:id", delete(routes::entries::delete_entry))
        // Session routes
        .route("/sessions", post(routes::sessions::create_session))
        .route("/sessions/:id/draft", get(routes::sessions::get_draft))
        .route("/sessions/:id/draft", put(routes::sessions::stage_draft))
        .route("/sessions/:id/commit", post(routes::sessions::commit_session))
        .route("/sessions/:id", delete(routes::sessions::close_session))
        // Change event routes
        .route("/changes", get(routes::changes::list_changes))
        .route("/changes", post(routes::changes::create_change))
        .route("/changes/:id", get(routes::changes::get_change))
        .route("/changes/:id", put(routes::changes::update_change))
        .route("/changes/:id", delete(routes::changes::delete_change))
        // Transfer routes - larger body limit for CSV uploads (10 MB)
        .route("/export", get(routes::transfer::export_csv))
        .route("/import", post(routes::transfer::import_csv))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        // Auth passthrough
        .route("/auth/signin", post(routes::auth::sign_in))
        .route("/auth/signup", post(routes::auth::sign_up))
        .route("/auth/signout", post(routes::auth::sign_out))
        .route("/auth/session", get(routes::auth::session))
        .route("/auth/recover", post(routes::auth::recover))
        .route("/auth/verify", post(routes::auth::verify))
        .route("/auth/invite", post(routes::auth::invite))
        .route("/auth/users", get(routes::auth::list_users));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(shared_state)
}

/// Build the CORS layer from configured origins; `*` or an empty list
/// means permissive.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state, config);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Tally API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Tally API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store);
        build_router(state, &ApiConfig::default())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();

        let response = app.oneshot(get_req("/health/live")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app();

        let response = app.oneshot(get_req("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_metric() {
        let app = create_test_app();

        let response = app
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "Weight", "category": "Body", "unit_name": "kg", "unit_type": "float"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["name"], "weight");
        assert_eq!(json["unit_type"], "float");
        assert!(json["category_id"].is_i64());
    }

    #[tokio::test]
    async fn test_duplicate_metric_conflicts() {
        let app = create_test_app();
        let body = r#"{"name": "mood", "unit_type": "integer_range", "range_start": 1, "range_end": 10}"#;

        let response = app
            .clone()
            .oneshot(post("/api/v1/metrics", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Same name with different casing still collides
        let response = app
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "  Mood ", "unit_type": "integer"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "DUPLICATE_NAME");
    }

    #[tokio::test]
    async fn test_entry_validation_reports_all_failures() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "mood", "unit_type": "integer_range", "range_start": 1, "range_end": 10}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        // 10.5 is both non-integral and above the range
        let response = app
            .oneshot(post(
                "/api/v1/entries",
                &format!(
                    r#"{{"metric_id": {}, "value": 10.5, "date": "2026-02-01"}}"#,
                    metric_id
                ),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_entry_and_stats_flow() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "sleep", "unit_name": "hours", "unit_type": "float"}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        for (value, date) in [(7.5, "2026-02-01"), (8.0, "2026-02-02")] {
            let response = app
                .clone()
                .oneshot(post(
                    "/api/v1/entries",
                    &format!(
                        r#"{{"metric_id": {}, "value": {}, "date": "{}"}}"#,
                        metric_id, value, date
                    ),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(get_req(&format!("/api/v1/metrics/{}/stats", metric_id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        assert_eq!(json["latest"], 8.0);
        assert_eq!(json["last_date"], "02 Feb");
    }

    #[tokio::test]
    async fn test_chart_rejects_unknown_range() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "steps", "unit_type": "integer"}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .oneshot(get_req(&format!(
                "/api/v1/metrics/{}/chart?range=fortnight",
                metric_id
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_draft_commit() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "pushups", "unit_type": "integer"}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(post("/api/v1/sessions", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let session_id = body_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let draft = format!(
            r#"{{"selected_metric": {metric_id}, "draft": {{"added": [
                {{"metric_id": {metric_id}, "value": 20, "recorded_at": 1770000000000}},
                {{"metric_id": {metric_id}, "value": 25, "recorded_at": 1770086400000}}
            ], "modified": [], "deleted": []}}}}"#
        );
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/v1/sessions/{}/draft", session_id))
                    .header("Content-Type", "application/json")
                    .body(Body::from(draft))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(post(
                &format!("/api/v1/sessions/{}/commit", session_id),
                "{}",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["added"], 2);
        assert_eq!(json["updated"], 0);

        // Draft is cleared after a successful commit
        let response = app
            .oneshot(get_req(&format!("/api/v1/sessions/{}/draft", session_id)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert!(json["added"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_commit_writes_nothing() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "mood", "unit_type": "integer_range", "range_start": 1, "range_end": 10}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        // One good row, one bad: nothing may land
        let change_set = format!(
            r#"{{"added": [
                {{"metric_id": {metric_id}, "value": 5, "recorded_at": 1770000000000}},
                {{"metric_id": {metric_id}, "value": 50, "recorded_at": 1770086400000}}
            ], "modified": [], "deleted": []}}"#
        );
        let response = app
            .clone()
            .oneshot(post("/api/v1/entries/commit", &change_set))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(get_req(&format!("/api/v1/metrics/{}/entries", metric_id)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/metrics",
                r#"{"name": "weight", "category": "body", "unit_name": "kg", "unit_type": "float"}"#,
            ))
            .await
            .unwrap();
        let metric_id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/entries",
                &format!(
                    r#"{{"metric_id": {}, "value": 81.4, "date": "2026-02-01"}}"#,
                    metric_id
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(get_req("/api/v1/export"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let csv = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        assert!(csv.contains("weight"));

        // A fresh store accepts its own export
        let fresh = create_test_app();
        let response = fresh
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/import")
                    .header("Content-Type", "text/csv")
                    .body(Body::from(csv))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["entries_imported"], 1);
        assert_eq!(json["metrics_created"], 1);
        assert!(json["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_unconfigured_is_503() {
        let app = create_test_app();

        let response = app
            .oneshot(post(
                "/api/v1/auth/signin",
                r#"{"email": "me@example.com", "password": "hunter2"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
