//! Unified service-layer error type
//!
//! `ServiceError` bridges persistence errors (`StoreError`, `BoxError`) and the
//! API-layer `AppError`, so workflows can use `?` on both without manual
//! logging at every call site.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::StoreError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service-layer error
///
/// - `Db`: persistence / infrastructure errors (logged, surfaced as InternalError)
/// - `App`: business-rule errors (passed through to the client as-is)
#[derive(Debug)]
pub enum ServiceError {
    Db(BoxError),
    App(AppError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => ServiceError::App(AppError::already_exists(what)),
            other => ServiceError::Db(other.into()),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: AppError = ServiceError::from(StoreError::Duplicate("email a@b.c".into())).into();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_database_error_is_generic() {
        let err: AppError = ServiceError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("RowNotFound"));
    }

    #[test]
    fn test_app_error_passes_through() {
        let err: AppError = ServiceError::from(AppError::invalid_state("shipped")).into();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert_eq!(err.message, "shipped");
    }
}
