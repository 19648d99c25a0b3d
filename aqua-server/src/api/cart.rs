//! Shopping cart endpoints

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{CartItem, CartItemAdd, CartItemUpdate, CartView};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::cart;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(view).delete(clear))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{id}", put(update_item).delete(remove_item))
}

/// GET /api/cart
pub async fn view(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<CartView> {
    Ok(ApiResponse::success(cart::view_cart(&state, &caller).await?))
}

/// POST /api/cart/items
pub async fn add_item(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<CartItemAdd>,
) -> ApiResult<CartItem> {
    Ok(ApiResponse::success(cart::add_item(&state, &caller, req).await?))
}

/// PUT /api/cart/items/{id}
pub async fn update_item(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<CartItemUpdate>,
) -> ApiResult<CartItem> {
    Ok(ApiResponse::success(
        cart::update_item(&state, &caller, id, req).await?,
    ))
}

/// DELETE /api/cart/items/{id}
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    cart::remove_item(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<()> {
    cart::clear_cart(&state, &caller).await?;
    Ok(ApiResponse::ok())
}
