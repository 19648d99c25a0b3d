//! Unified error system for the Aqua backend
//!
//! - [`ErrorCode`]: numeric codes shared with the frontend
//! - [`ErrorCategory`]: domain of a code, derived from its range
//! - [`AppError`]: code, message and optional details
//! - [`ApiResponse`]: the `{status, code, message, data, details}` envelope
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Catalog errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Voucher errors
//! - 7xxx: Booking errors
//! - 8xxx: User errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::OrderNotFound);
//!
//! let err = AppError::validation("Cart is empty")
//!     .with_detail("field", "cart_item_ids");
//!
//! let response = ApiResponse::<()>::from(err);
//! assert_eq!(response.status, 400);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult, ErrorDetails};
