//! HTTP API
//!
//! Every resource module exposes `router()`; this module groups them by
//! access level and applies the shared middleware.
//!
//! - [`health`] - liveness
//! - [`auth`] - registration and login (rate limited)
//! - [`users`] - profile and admin user management
//! - [`catalog`] - categories, products and product images
//! - [`cart`] - shopping cart
//! - [`orders`] - checkout and order lifecycle
//! - [`payments`] - payments, gateway return and webhook
//! - [`vouchers`] - voucher management and preview
//! - [`bookings`] - service packages, bookings and missions
//! - [`setup_packages`] - product bundles
//! - [`uploads`] - image uploads

pub mod auth;
pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod orders;
pub mod payments;
pub mod setup_packages;
pub mod uploads;
pub mod users;
pub mod vouchers;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts};
use axum::{Router, middleware};
use http::HeaderName;
use http::request::Parts;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use shared::error::{ApiResponse, AppError};

use crate::auth::{auth_middleware, client_ip, optional_auth_middleware};
use crate::state::AppState;

/// Handler result wrapped in the `{status, code, message, data}` envelope
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Request body cap; leaves headroom over the 5 MB image limit
const BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Caller IP: `X-Forwarded-For` first, then the socket peer
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

/// Build the application router with all middleware and state
pub fn create_router(state: AppState) -> Router {
    // Anonymous access; a bearer token, when valid, unlocks staff views
    let public = Router::new()
        .merge(catalog::public_router())
        .merge(bookings::public_router())
        .merge(vouchers::public_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    // Bearer token required
    let authenticated = Router::new()
        .merge(users::router())
        .merge(catalog::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(vouchers::router())
        .merge(bookings::router())
        .merge(setup_packages::router())
        .merge(uploads::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(health::router())
        .merge(auth::router(&state))
        // Gateway callbacks verify their own signatures
        .merge(payments::gateway_router())
        .merge(public)
        .merge(authenticated)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}
