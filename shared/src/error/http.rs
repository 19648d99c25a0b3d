//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::ProductNotFound
            | Self::CategoryNotFound
            | Self::CartItemNotFound
            | Self::SetupPackageNotFound
            | Self::OrderNotFound
            | Self::PaymentNotFound
            | Self::VoucherNotFound
            | Self::BookingNotFound
            | Self::MissionNotFound
            | Self::ServicePackageNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (conflicting resource or invalid entity state)
            Self::AlreadyExists
            | Self::Conflict
            | Self::InvalidState
            | Self::EmailAlreadyRegistered
            | Self::CategoryNameExists
            | Self::OrderNotCancellable
            | Self::OrderInvalidTransition
            | Self::OrderNotPayable
            | Self::OrderAlreadyPaid
            | Self::PaymentInvalidTransition
            | Self::PaymentAlreadyRefunded
            | Self::VoucherCodeExists
            | Self::BookingNotEligible
            | Self::BookingAlreadyAssigned
            | Self::BookingInvalidTransition
            | Self::MissionInvalidTransition
            | Self::TechnicianScheduleConflict => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::AccountDisabled => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied
            | Self::RoleRequired
            | Self::AdminRequired
            | Self::NotOwner => StatusCode::FORBIDDEN,

            // 429 Too Many Requests
            Self::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,

            // 502 Bad Gateway (external collaborator failed)
            Self::PaymentGatewayUnavailable
            | Self::ExternalServiceFailed
            | Self::FileStorageFailed => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::OrderNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::VoucherNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::MissionNotFound.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_state_errors_are_conflicts() {
        assert_eq!(
            ErrorCode::OrderNotCancellable.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::BookingAlreadyAssigned.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ErrorCode::InvalidState.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_validation_status() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::ProductOutOfStock.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::VoucherExpired.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_auth_and_permission_status() {
        assert_eq!(
            ErrorCode::NotAuthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::NotOwner.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::TooManyAttempts.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_system_status() {
        assert_eq!(
            ErrorCode::ExternalServiceFailed.http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::TimeoutError.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
