//! Category Routes
//!
//! - GET /api/v1/categories - List categories
//! - POST /api/v1/categories - Create a category
//! - GET /api/v1/categories/:id - Get a category

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CategoryListResponse, CreateCategoryRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::store::Category;

/// GET /api/v1/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CategoryListResponse>> {
    let categories = state.store.list_categories()?;
    Ok(Json(CategoryListResponse {
        total: categories.len(),
        categories,
    }))
}

/// POST /api/v1/categories
///
/// Names are normalized (trimmed, lowercased) before the uniqueness
/// check, so "Sleep" and "sleep" collide.
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.store.add_category(&req.name)?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories/:id
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    let category = state.store.get_category(id)?;
    Ok(Json(category))
}
