//! Voucher endpoints
//!
//! Management is staff-only; preview is open so the checkout page can show
//! the discount before an order exists.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    PaginatedResponse, Voucher, VoucherCreate, VoucherFilter, VoucherPreview,
    VoucherPreviewRequest, VoucherUpdate,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::voucher;
use crate::state::AppState;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/vouchers/preview", post(preview))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vouchers", get(list).post(create))
        .route(
            "/api/vouchers/{id}",
            get(get_by_id).put(update).delete(remove),
        )
}

/// POST /api/vouchers/preview
pub async fn preview(
    State(state): State<AppState>,
    Json(req): Json<VoucherPreviewRequest>,
) -> ApiResult<VoucherPreview> {
    Ok(ApiResponse::success(voucher::preview(&state, req).await?))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<VoucherFilter>,
) -> ApiResult<PaginatedResponse<Voucher>> {
    Ok(ApiResponse::success(
        voucher::list_vouchers(&state, &caller, filter).await?,
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Voucher> {
    Ok(ApiResponse::success(
        voucher::get_voucher(&state, &caller, id).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<VoucherCreate>,
) -> ApiResult<Voucher> {
    Ok(ApiResponse::success(
        voucher::create_voucher(&state, &caller, req).await?,
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<VoucherUpdate>,
) -> ApiResult<Voucher> {
    Ok(ApiResponse::success(
        voucher::update_voucher(&state, &caller, id, req).await?,
    ))
}

/// 软删除
pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    voucher::delete_voucher(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}
