//! Profile and user management

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, put};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    PaginatedResponse, ProfileUpdate, UserCreate, UserFilter, UserProfile, UserRoleUpdate,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::user;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(me).put(update_me))
        .route("/api/users", get(list).post(create))
        .route("/api/users/technicians", get(technicians))
        .route("/api/users/{id}/role", put(update_role))
        .route("/api/users/{id}", delete(remove))
}

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(user::me(&state, &caller).await?))
}

/// PUT /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<ProfileUpdate>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(
        user::update_profile(&state, &caller, req).await?,
    ))
}

/// GET /api/users (admin)
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<PaginatedResponse<UserProfile>> {
    Ok(ApiResponse::success(
        user::list_users(&state, &caller, filter).await?,
    ))
}

/// POST /api/users (admin) - staff and technician accounts
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<UserCreate>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(
        user::create_user(&state, &caller, req).await?,
    ))
}

/// GET /api/users/technicians
pub async fn technicians(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<Vec<UserProfile>> {
    Ok(ApiResponse::success(
        user::list_technicians(&state, &caller).await?,
    ))
}

/// PUT /api/users/{id}/role
pub async fn update_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UserRoleUpdate>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(
        user::update_role(&state, &caller, id, req.role).await?,
    ))
}

/// DELETE /api/users/{id} - soft delete
pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    user::delete_user(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}
