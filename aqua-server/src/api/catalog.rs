//! Category and product endpoints
//!
//! Reads are public; writes need a manager or admin token.

use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    Category, CategoryCreate, CategoryUpdate, PaginatedResponse, Product, ProductCreate,
    ProductFilter, ProductUpdate,
};

use super::ApiResult;
use super::uploads::{read_image, store_image};
use crate::auth::Identity;
use crate::services::catalog;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", post(create_category))
        .route(
            "/api/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/api/products", post(create_product))
        .route("/api/products/{id}", put(update_product).delete(delete_product))
        .route("/api/products/{id}/image", post(upload_image))
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Vec<Category>> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        catalog::list_categories(&state, caller.as_ref(), query.include_deleted).await?,
    ))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<CategoryCreate>,
) -> ApiResult<Category> {
    Ok(ApiResponse::success(
        catalog::create_category(&state, &caller, req).await?,
    ))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryUpdate>,
) -> ApiResult<Category> {
    Ok(ApiResponse::success(
        catalog::update_category(&state, &caller, id, req).await?,
    ))
}

/// DELETE /api/categories/{id} - 软删除
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    catalog::delete_category(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<Product>> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        catalog::list_products(&state, caller.as_ref(), filter).await?,
    ))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Product> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        catalog::get_product(&state, caller.as_ref(), id).await?,
    ))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<ProductCreate>,
) -> ApiResult<Product> {
    Ok(ApiResponse::success(
        catalog::create_product(&state, &caller, req).await?,
    ))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductUpdate>,
) -> ApiResult<Product> {
    Ok(ApiResponse::success(
        catalog::update_product(&state, &caller, id, req).await?,
    ))
}

/// DELETE /api/products/{id} - 软删除
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    catalog::delete_product(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}

/// POST /api/products/{id}/image - multipart `file`
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Product> {
    caller.require_staff()?;
    let image = read_image(multipart).await?;
    let url = store_image(&state, image).await?;
    Ok(ApiResponse::success(
        catalog::set_product_image(&state, &caller, id, url).await?,
    ))
}
