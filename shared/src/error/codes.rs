//! Unified error codes for the Aqua backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Catalog errors (products, categories, cart, setup packages, files)
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Voucher errors
//! - 7xxx: Booking errors (bookings, missions, technicians, service packages)
//! - 8xxx: User errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Operation not valid for the current entity status
    InvalidState = 9,
    /// Concurrent modification or conflicting resource
    Conflict = 10,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (email/password)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Account is disabled or deleted
    AccountDisabled = 1005,
    /// Email is already registered
    EmailAlreadyRegistered = 1006,
    /// Password too short
    PasswordTooShort = 1007,
    /// Too many attempts
    TooManyAttempts = 1008,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Resource belongs to another user
    NotOwner = 2004,

    // ==================== 3xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 3001,
    /// Product is not available for sale
    ProductUnavailable = 3002,
    /// Product is out of stock
    ProductOutOfStock = 3003,
    /// Product has invalid price
    ProductInvalidPrice = 3004,
    /// Category not found
    CategoryNotFound = 3101,
    /// Category name already exists
    CategoryNameExists = 3102,
    /// Cart item not found
    CartItemNotFound = 3201,
    /// Cart is empty
    CartEmpty = 3202,
    /// Setup package not found
    SetupPackageNotFound = 3301,
    /// File too large
    FileTooLarge = 3401,
    /// Unsupported file format
    UnsupportedFileFormat = 3402,
    /// No file provided in request
    NoFileProvided = 3403,
    /// Empty file provided
    EmptyFile = 3404,
    /// File storage failed
    FileStorageFailed = 3405,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order can no longer be cancelled
    OrderNotCancellable = 4002,
    /// Illegal order status transition
    OrderInvalidTransition = 4003,
    /// Order is not awaiting payment
    OrderNotPayable = 4004,
    /// Order has already been paid
    OrderAlreadyPaid = 4005,

    // ==================== 5xxx: Payment ====================
    /// Payment not found
    PaymentNotFound = 5001,
    /// Payment amount does not match the amount due
    PaymentAmountMismatch = 5002,
    /// Invalid or unconfigured payment method
    PaymentInvalidMethod = 5003,
    /// Illegal payment status transition
    PaymentInvalidTransition = 5004,
    /// Payment has already been refunded
    PaymentAlreadyRefunded = 5005,
    /// Payment gateway unavailable
    PaymentGatewayUnavailable = 5006,
    /// Webhook/callback signature mismatch
    WebhookSignatureInvalid = 5007,

    // ==================== 6xxx: Voucher ====================
    /// Voucher not found
    VoucherNotFound = 6001,
    /// Voucher is not active
    VoucherInactive = 6002,
    /// Voucher has expired
    VoucherExpired = 6003,
    /// Voucher has no remaining uses
    VoucherExhausted = 6004,
    /// Order does not meet the voucher minimum
    VoucherMinimumNotMet = 6005,
    /// Voucher code already exists
    VoucherCodeExists = 6006,

    // ==================== 7xxx: Booking ====================
    /// Booking not found
    BookingNotFound = 7001,
    /// Order is not eligible for booking
    BookingNotEligible = 7002,
    /// Booking already has an assigned technician
    BookingAlreadyAssigned = 7003,
    /// Illegal booking status transition
    BookingInvalidTransition = 7004,
    /// Schedule date is not valid
    ScheduleDateInvalid = 7005,
    /// Mission not found
    MissionNotFound = 7101,
    /// Illegal mission status transition
    MissionInvalidTransition = 7102,
    /// Technician is not available
    TechnicianUnavailable = 7103,
    /// Technician already has a mission that day
    TechnicianScheduleConflict = 7104,
    /// Report requires a reason
    ReportReasonRequired = 7105,
    /// Service package not found
    ServicePackageNotFound = 7201,

    // ==================== 8xxx: User ====================
    /// User not found
    UserNotFound = 8001,
    /// User has been deleted
    UserDeleted = 8002,
    /// Cannot delete own account
    CannotDeleteSelf = 8003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// External service (gateway, storage, email) failed
    ExternalServiceFailed = 9006,
}

impl ErrorCode {
    /// Numeric value of this error code
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Default human-readable message
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::InvalidState => "Operation not allowed in the current state",
            ErrorCode::Conflict => "Conflicting operation",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::AccountDisabled => "Account is disabled",
            ErrorCode::EmailAlreadyRegistered => "Email is already registered",
            ErrorCode::PasswordTooShort => "Password must be at least 8 characters",
            ErrorCode::TooManyAttempts => "Too many attempts",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::NotOwner => "Resource belongs to another user",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductUnavailable => "Product is not available",
            ErrorCode::ProductOutOfStock => "Product is out of stock",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::CategoryNotFound => "Category not found",
            ErrorCode::CategoryNameExists => "Category name already exists",
            ErrorCode::CartItemNotFound => "Cart item not found",
            ErrorCode::CartEmpty => "Cart is empty",
            ErrorCode::SetupPackageNotFound => "Setup package not found",
            ErrorCode::FileTooLarge => "File too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::NoFileProvided => "No file provided",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::FileStorageFailed => "File storage failed",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderNotCancellable => "Order can no longer be cancelled",
            ErrorCode::OrderInvalidTransition => "Order status transition not allowed",
            ErrorCode::OrderNotPayable => "Order is not awaiting payment",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",

            // Payment
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::PaymentAmountMismatch => "Payment amount does not match amount due",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::PaymentInvalidTransition => "Payment status transition not allowed",
            ErrorCode::PaymentAlreadyRefunded => "Payment has already been refunded",
            ErrorCode::PaymentGatewayUnavailable => "Payment gateway unavailable",
            ErrorCode::WebhookSignatureInvalid => "Invalid webhook signature",

            // Voucher
            ErrorCode::VoucherNotFound => "Voucher not found",
            ErrorCode::VoucherInactive => "Voucher is not active",
            ErrorCode::VoucherExpired => "Voucher has expired",
            ErrorCode::VoucherExhausted => "Voucher has been fully used",
            ErrorCode::VoucherMinimumNotMet => "Order does not meet the voucher minimum",
            ErrorCode::VoucherCodeExists => "Voucher code already exists",

            // Booking
            ErrorCode::BookingNotFound => "Booking not found",
            ErrorCode::BookingNotEligible => "Order is not eligible for booking",
            ErrorCode::BookingAlreadyAssigned => "Booking already has an assigned technician",
            ErrorCode::BookingInvalidTransition => "Booking status transition not allowed",
            ErrorCode::ScheduleDateInvalid => "Schedule date must be in the future",
            ErrorCode::MissionNotFound => "Mission not found",
            ErrorCode::MissionInvalidTransition => "Mission status transition not allowed",
            ErrorCode::TechnicianUnavailable => "Technician is not available",
            ErrorCode::TechnicianScheduleConflict => "Technician already has a mission that day",
            ErrorCode::ReportReasonRequired => "A reason is required when reporting",
            ErrorCode::ServicePackageNotFound => "Service package not found",

            // User
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::UserDeleted => "User has been deleted",
            ErrorCode::CannotDeleteSelf => "Cannot delete own account",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ExternalServiceFailed => "External service failed",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),
            9 => Ok(ErrorCode::InvalidState),
            10 => Ok(ErrorCode::Conflict),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1005 => Ok(ErrorCode::AccountDisabled),
            1006 => Ok(ErrorCode::EmailAlreadyRegistered),
            1007 => Ok(ErrorCode::PasswordTooShort),
            1008 => Ok(ErrorCode::TooManyAttempts),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),
            2004 => Ok(ErrorCode::NotOwner),

            // Catalog
            3001 => Ok(ErrorCode::ProductNotFound),
            3002 => Ok(ErrorCode::ProductUnavailable),
            3003 => Ok(ErrorCode::ProductOutOfStock),
            3004 => Ok(ErrorCode::ProductInvalidPrice),
            3101 => Ok(ErrorCode::CategoryNotFound),
            3102 => Ok(ErrorCode::CategoryNameExists),
            3201 => Ok(ErrorCode::CartItemNotFound),
            3202 => Ok(ErrorCode::CartEmpty),
            3301 => Ok(ErrorCode::SetupPackageNotFound),
            3401 => Ok(ErrorCode::FileTooLarge),
            3402 => Ok(ErrorCode::UnsupportedFileFormat),
            3403 => Ok(ErrorCode::NoFileProvided),
            3404 => Ok(ErrorCode::EmptyFile),
            3405 => Ok(ErrorCode::FileStorageFailed),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderNotCancellable),
            4003 => Ok(ErrorCode::OrderInvalidTransition),
            4004 => Ok(ErrorCode::OrderNotPayable),
            4005 => Ok(ErrorCode::OrderAlreadyPaid),

            // Payment
            5001 => Ok(ErrorCode::PaymentNotFound),
            5002 => Ok(ErrorCode::PaymentAmountMismatch),
            5003 => Ok(ErrorCode::PaymentInvalidMethod),
            5004 => Ok(ErrorCode::PaymentInvalidTransition),
            5005 => Ok(ErrorCode::PaymentAlreadyRefunded),
            5006 => Ok(ErrorCode::PaymentGatewayUnavailable),
            5007 => Ok(ErrorCode::WebhookSignatureInvalid),

            // Voucher
            6001 => Ok(ErrorCode::VoucherNotFound),
            6002 => Ok(ErrorCode::VoucherInactive),
            6003 => Ok(ErrorCode::VoucherExpired),
            6004 => Ok(ErrorCode::VoucherExhausted),
            6005 => Ok(ErrorCode::VoucherMinimumNotMet),
            6006 => Ok(ErrorCode::VoucherCodeExists),

            // Booking
            7001 => Ok(ErrorCode::BookingNotFound),
            7002 => Ok(ErrorCode::BookingNotEligible),
            7003 => Ok(ErrorCode::BookingAlreadyAssigned),
            7004 => Ok(ErrorCode::BookingInvalidTransition),
            7005 => Ok(ErrorCode::ScheduleDateInvalid),
            7101 => Ok(ErrorCode::MissionNotFound),
            7102 => Ok(ErrorCode::MissionInvalidTransition),
            7103 => Ok(ErrorCode::TechnicianUnavailable),
            7104 => Ok(ErrorCode::TechnicianScheduleConflict),
            7105 => Ok(ErrorCode::ReportReasonRequired),
            7201 => Ok(ErrorCode::ServicePackageNotFound),

            // User
            8001 => Ok(ErrorCode::UserNotFound),
            8002 => Ok(ErrorCode::UserDeleted),
            8003 => Ok(ErrorCode::CannotDeleteSelf),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::ExternalServiceFailed),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
