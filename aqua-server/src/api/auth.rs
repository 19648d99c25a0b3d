//! Registration and login
//!
//! POST /api/auth/register - customer self-registration (3/min per IP)
//! POST /api/auth/login    - email + password → bearer token (5/min per IP)

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router, middleware};

use shared::error::ApiResponse;
use shared::models::{LoginRequest, LoginResponse, RegisterRequest, UserProfile};

use super::ApiResult;
use crate::auth::rate_limit::{login_rate_limit, register_rate_limit};
use crate::services::user;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    let register = Router::new()
        .route("/api/auth/register", post(register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            register_rate_limit,
        ));
    let login = Router::new()
        .route("/api/auth/login", post(login))
        .layer(middleware::from_fn_with_state(state.clone(), login_rate_limit));
    register.merge(login)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<UserProfile> {
    let profile = user::register(&state, req).await?;
    Ok(ApiResponse::success_with_message("Registered", profile))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    Ok(ApiResponse::success(user::login(&state, req).await?))
}
