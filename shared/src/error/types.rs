//! `AppError` and the JSON envelope every endpoint answers with

use std::collections::BTreeMap;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::category::ErrorCategory;
use super::codes::ErrorCode;

/// Structured context attached to an error (offending field, current status, ...)
pub type ErrorDetails = BTreeMap<String, Value>;

/// Business error carried from the services to the HTTP layer
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<ErrorDetails>,
}

impl AppError {
    /// Error with the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(ErrorDetails::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Illegal status transition (order, payment, booking)
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidState, msg)
    }

    /// Unique key taken (email, voucher code)
    pub fn already_exists(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::with_message(ErrorCode::AlreadyExists, format!("{resource} already exists"))
            .with_detail("resource", resource)
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials)
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, msg)
    }

    /// Client-facing copy: system errors lose their internal message and details
    fn public(self) -> Self {
        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "System error");
            Self::new(self.code)
        } else {
            self
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        AppError::validation(format!("Invalid fields: {}", fields.join(", ")))
            .with_detail("fields", fields)
    }
}

/// 统一响应格式
///
/// `code` is 0 on success. `data` is present on success, `details` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_message("OK", data)
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            code: ErrorCode::Success.code(),
            message: message.into(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload (deletes, clears)
    pub fn ok() -> Self {
        Self {
            data: None,
            ..Self::success(())
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            status: err.http_status().as_u16(),
            code: err.code.code(),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.public();
        let status = err.http_status();
        (status, Json(ApiResponse::<()>::from(err))).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message_and_details() {
        let err = AppError::new(ErrorCode::OrderNotFound)
            .with_detail("order_id", "42")
            .with_detail("status", "PAID");
        assert_eq!(err.to_string(), ErrorCode::OrderNotFound.message());
        let details = err.details.unwrap();
        assert_eq!(details["order_id"], "42");
        assert_eq!(details["status"], "PAID");
    }

    #[test]
    fn test_already_exists_names_resource() {
        let err = AppError::already_exists("email");
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(err.message, "email already exists");
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_envelope() {
        let err = AppError::new(ErrorCode::OrderNotCancellable).with_detail("status", "SHIPPED");
        let response = ApiResponse::<()>::from(err);
        assert_eq!(response.status, 409);
        assert_eq!(response.code, ErrorCode::OrderNotCancellable.code());
        assert!(response.data.is_none());
        assert_eq!(response.details.unwrap()["status"], "SHIPPED");
    }

    #[test]
    fn test_system_error_is_masked() {
        let err = AppError::with_message(ErrorCode::DatabaseError, "relation orders missing")
            .with_detail("query", "select");
        let public = err.public();
        assert_eq!(public.message, ErrorCode::DatabaseError.message());
        assert!(public.details.is_none());
    }

    #[test]
    fn test_success_envelope_json() {
        let json = serde_json::to_value(ApiResponse::success("25.00")).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], "25.00");
        assert!(json.get("details").is_none());

        let json = serde_json::to_value(ApiResponse::ok()).unwrap();
        assert!(json.get("data").is_none());
    }
}
