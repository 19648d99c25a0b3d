//! Setup package endpoints

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    CartItem, PaginatedResponse, SetupPackage, SetupPackageCreate, SetupPackageFilter,
    SetupPackageUpdate, SetupPackageView,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::setup_package;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/setup-packages", get(list).post(create))
        .route(
            "/api/setup-packages/{id}",
            get(get_by_id).put(update).delete(remove),
        )
        .route("/api/setup-packages/{id}/copy", post(copy))
        .route("/api/setup-packages/{id}/add-to-cart", post(add_to_cart))
}

/// Own packages plus templates (everything for staff)
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<SetupPackageFilter>,
) -> ApiResult<PaginatedResponse<SetupPackage>> {
    Ok(ApiResponse::success(
        setup_package::list_setup_packages(&state, &caller, filter).await?,
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<SetupPackageView> {
    Ok(ApiResponse::success(
        setup_package::get_setup_package(&state, &caller, id).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<SetupPackageCreate>,
) -> ApiResult<SetupPackageView> {
    Ok(ApiResponse::success(
        setup_package::create_setup_package(&state, &caller, req).await?,
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetupPackageUpdate>,
) -> ApiResult<SetupPackageView> {
    Ok(ApiResponse::success(
        setup_package::update_setup_package(&state, &caller, id, req).await?,
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    setup_package::delete_setup_package(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}

/// POST /api/setup-packages/{id}/copy - 复制到自己名下
pub async fn copy(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<SetupPackageView> {
    Ok(ApiResponse::success(
        setup_package::copy_setup_package(&state, &caller, id).await?,
    ))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<CartItem>> {
    Ok(ApiResponse::success(
        setup_package::add_to_cart(&state, &caller, id).await?,
    ))
}
