//! Order endpoints
//!
//! POST /api/orders              - checkout from cart items
//! GET  /api/orders              - own orders (all for staff)
//! GET  /api/orders/{id}         - order with details and payments
//! POST /api/orders/{id}/cancel  - owner or staff
//! PUT  /api/orders/{id}/status  - staff fulfillment

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    CancelOrderRequest, CheckoutPayload, CreateOrderRequest, Order, OrderFilter, OrderView,
    PaginatedResponse, UpdateOrderStatusRequest,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::order;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list).post(create))
        .route("/api/orders/{id}", get(get_by_id))
        .route("/api/orders/{id}/cancel", post(cancel))
        .route("/api/orders/{id}/status", put(update_status))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<CheckoutPayload> {
    let payload = order::create_order(&state, &caller, req).await?;
    Ok(ApiResponse::success_with_message("Order created", payload))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<PaginatedResponse<Order>> {
    Ok(ApiResponse::success(
        order::list_orders(&state, &caller, filter).await?,
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    Ok(ApiResponse::success(order::get_order(&state, &caller, id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelOrderRequest>,
) -> ApiResult<Order> {
    Ok(ApiResponse::success(
        order::cancel_order(&state, &caller, id, req).await?,
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> ApiResult<Order> {
    Ok(ApiResponse::success(
        order::update_order_status(&state, &caller, id, req).await?,
    ))
}
