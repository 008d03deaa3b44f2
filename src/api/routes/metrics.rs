//! Metric Routes
//!
//! Metric definitions plus the derived read models built on their
//! entry series.
//!
//! - GET /api/v1/metrics - List metrics (active by default)
//! - POST /api/v1/metrics - Define a metric
//! - GET /api/v1/metrics/:id - Get a metric
//! - PUT /api/v1/metrics/:id - Full-payload update
//! - POST /api/v1/metrics/:id/archive - Hide from active lists
//! - POST /api/v1/metrics/:id/restore - Bring back an archived metric
//! - GET /api/v1/metrics/:id/stats - Summary statistics
//! - GET /api/v1/metrics/:id/chart - Resampled chart series

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{ChartQuery, MetricListQuery, MetricListResponse, MetricRequest, MetricResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::stats::{self, ChartRange, ChartSeries, Observation, StatsSummary};
use crate::store::{MetricSpec, UnitSpec, UnitType};

/// Resolve a request body into a store-ready spec.
///
/// A `category` name wins over `category_id` and is created on the fly
/// when missing, so a metric and its grouping can be set up in one call.
fn resolve_spec(state: &AppState, req: &MetricRequest) -> ApiResult<MetricSpec> {
    let unit_type = UnitType::parse(&req.unit_type)
        .ok_or_else(|| ApiError::Validation(format!("unknown unit type '{}'", req.unit_type)))?;

    let mut unit = UnitSpec::new(unit_type);
    if let Some(name) = &req.unit_name {
        unit = unit.name(name.clone());
    }
    unit.range_start = req.range_start;
    unit.range_end = req.range_end;

    let category_id = match &req.category {
        Some(name) => Some(state.store.ensure_category(name)?.id),
        None => {
            if let Some(id) = req.category_id {
                // Fail now rather than on the foreign key
                state.store.get_category(id)?;
            }
            req.category_id
        }
    };

    Ok(MetricSpec {
        name: req.name.clone(),
        description: req.description.clone(),
        category_id,
        unit,
    })
}

/// GET /api/v1/metrics
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetricListQuery>,
) -> ApiResult<Json<MetricListResponse>> {
    let metrics = state.store.list_metrics(query.include_archived)?;
    Ok(Json(MetricListResponse {
        total: metrics.len(),
        metrics: metrics.into_iter().map(MetricResponse::from).collect(),
    }))
}

/// POST /api/v1/metrics
pub async fn create_metric(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetricRequest>,
) -> ApiResult<(StatusCode, Json<MetricResponse>)> {
    let spec = resolve_spec(&state, &req)?;
    let metric = state.store.create_metric(&spec)?;
    Ok((StatusCode::CREATED, Json(metric.into())))
}

/// GET /api/v1/metrics/:id
pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MetricResponse>> {
    let metric = state.store.get_metric(id)?;
    Ok(Json(metric.into()))
}

/// PUT /api/v1/metrics/:id
///
/// Rejects range edits that would strand existing entries outside the
/// new bounds.
pub async fn update_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MetricRequest>,
) -> ApiResult<Json<MetricResponse>> {
    let spec = resolve_spec(&state, &req)?;
    let metric = state.store.update_metric(id, &spec)?;
    Ok(Json(metric.into()))
}

/// POST /api/v1/metrics/:id/archive
pub async fn archive_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MetricResponse>> {
    let metric = state.store.set_archived(id, true)?;
    Ok(Json(metric.into()))
}

/// POST /api/v1/metrics/:id/restore
pub async fn restore_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MetricResponse>> {
    let metric = state.store.set_archived(id, false)?;
    Ok(Json(metric.into()))
}

/// GET /api/v1/metrics/:id/stats
pub async fn metric_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StatsSummary>> {
    state.store.get_metric(id)?;
    let series = observations(&state, id)?;
    Ok(Json(stats::compute_stats(&series)))
}

/// GET /api/v1/metrics/:id/chart?range=last_month
pub async fn metric_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<ChartSeries>> {
    let range = ChartRange::parse(&query.range)
        .ok_or_else(|| ApiError::Validation(format!("unknown chart range '{}'", query.range)))?;

    state.store.get_metric(id)?;
    let series = observations(&state, id)?;
    Ok(Json(stats::build_chart_series(&series, range, Utc::now())))
}

fn observations(state: &AppState, metric_id: i64) -> ApiResult<Vec<Observation>> {
    let entries = state.store.entries_for_metric(metric_id)?;
    Ok(entries.iter().map(Observation::from).collect())
}
