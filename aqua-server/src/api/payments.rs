//! Payment endpoints
//!
//! POST /api/payments                 - start a payment for an order or booking
//! GET  /api/payments                 - staff listing
//! GET  /api/payments/{id}
//! POST /api/payments/{id}/confirm    - staff: bank transfer received
//! POST /api/payments/{id}/refund     - staff: refund paid out
//! GET  /api/payments/vnpay/return    - signed browser redirect
//! POST /api/payments/payos/webhook   - signed server callback (raw body)

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::{ApiResponse, AppError};
use shared::models::{
    CreatePaymentRequest, PaginatedResponse, Payment, PaymentFilter, PaymentOutcome, WebhookAck,
};

use super::{ApiResult, ClientIp};
use crate::auth::Identity;
use crate::services::payment;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the webhook body
pub const SIGNATURE_HEADER: &str = "x-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments", get(list).post(create))
        .route("/api/payments/{id}", get(get_by_id))
        .route("/api/payments/{id}/confirm", post(confirm))
        .route("/api/payments/{id}/refund", post(refund))
}

/// Gateway callbacks, unauthenticated
pub fn gateway_router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/vnpay/return", get(vnpay_return))
        .route("/api/payments/payos/webhook", post(payos_webhook))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    ClientIp(ip): ClientIp,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(
        payment::create_payment(&state, &caller, req, &ip).await?,
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<PaginatedResponse<Payment>> {
    Ok(ApiResponse::success(
        payment::list_payments(&state, &caller, filter).await?,
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(
        payment::get_payment(&state, &caller, id).await?,
    ))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentOutcome> {
    Ok(ApiResponse::success(
        payment::confirm_bank_transfer(&state, &caller, id).await?,
    ))
}

pub async fn refund(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(payment::refund(&state, &caller, id).await?))
}

pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<PaymentOutcome> {
    Ok(ApiResponse::success(
        payment::handle_return(&state, &params).await?,
    ))
}

/// Must receive the raw body for signature verification
pub async fn payos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Missing webhook signature header");
        return Ok(Json(WebhookAck::rejected("missing signature")));
    };
    Ok(Json(payment::handle_webhook(&state, &body, signature).await?))
}
