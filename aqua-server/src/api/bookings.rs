//! Service packages, bookings and technician missions

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use shared::error::ApiResponse;
use shared::models::{
    AssignTechnicianRequest, BookScheduleRequest, Booking, BookingFilter, BookingView,
    CancelBookingRequest, Mission, MissionFilter, MissionStatusUpdate, PaginatedResponse,
    ReviewReportRequest, ServicePackage, ServicePackageCreate, ServicePackageUpdate,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::services::booking;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ServicePackageQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/service-packages", get(list_service_packages))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/service-packages", post(create_service_package))
        .route(
            "/api/service-packages/{id}",
            put(update_service_package).delete(delete_service_package),
        )
        .route("/api/bookings", get(list_bookings).post(book))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/assign", post(assign))
        .route("/api/bookings/{id}/confirm", post(confirm))
        .route("/api/bookings/{id}/cancel", post(cancel))
        .route("/api/missions", get(list_missions))
        .route("/api/missions/{id}/status", put(update_mission))
        .route("/api/missions/{id}/review", post(review))
}

// ---- service packages ----

pub async fn list_service_packages(
    State(state): State<AppState>,
    caller: Option<Extension<Identity>>,
    Query(query): Query<ServicePackageQuery>,
) -> ApiResult<Vec<ServicePackage>> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        booking::list_service_packages(&state, caller.as_ref(), query.include_deleted).await?,
    ))
}

pub async fn create_service_package(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<ServicePackageCreate>,
) -> ApiResult<ServicePackage> {
    Ok(ApiResponse::success(
        booking::create_service_package(&state, &caller, req).await?,
    ))
}

pub async fn update_service_package(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ServicePackageUpdate>,
) -> ApiResult<ServicePackage> {
    Ok(ApiResponse::success(
        booking::update_service_package(&state, &caller, id, req).await?,
    ))
}

pub async fn delete_service_package(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    booking::delete_service_package(&state, &caller, id).await?;
    Ok(ApiResponse::ok())
}

// ---- bookings ----

/// POST /api/bookings
pub async fn book(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Json(req): Json<BookScheduleRequest>,
) -> ApiResult<Booking> {
    let booking = booking::book_schedule(&state, &caller, req).await?;
    Ok(ApiResponse::success_with_message("Booking created", booking))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<PaginatedResponse<Booking>> {
    Ok(ApiResponse::success(
        booking::list_bookings(&state, &caller, filter).await?,
    ))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<BookingView> {
    Ok(ApiResponse::success(
        booking::get_booking(&state, &caller, id).await?,
    ))
}

/// POST /api/bookings/{id}/assign - 分配技师
pub async fn assign(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTechnicianRequest>,
) -> ApiResult<Mission> {
    Ok(ApiResponse::success(
        booking::assign_technician(&state, &caller, id, req).await?,
    ))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Booking> {
    Ok(ApiResponse::success(
        booking::confirm_booking(&state, &caller, id).await?,
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> ApiResult<Booking> {
    Ok(ApiResponse::success(
        booking::cancel_booking(&state, &caller, id, req).await?,
    ))
}

// ---- missions ----

pub async fn list_missions(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Query(filter): Query<MissionFilter>,
) -> ApiResult<PaginatedResponse<Mission>> {
    Ok(ApiResponse::success(
        booking::list_missions(&state, &caller, filter).await?,
    ))
}

/// PUT /api/missions/{id}/status - technician field update
pub async fn update_mission(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<MissionStatusUpdate>,
) -> ApiResult<Mission> {
    Ok(ApiResponse::success(
        booking::update_mission_status(&state, &caller, id, req).await?,
    ))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewReportRequest>,
) -> ApiResult<Mission> {
    Ok(ApiResponse::success(
        booking::review_report(&state, &caller, id, req).await?,
    ))
}
