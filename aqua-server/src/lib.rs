//! aqua-server - aquarium retail and service-booking backend
//!
//! - Catalog, cart, checkout with vouchers
//! - Payments by bank transfer, VNPay redirect or PayOS checkout, reconciled
//!   through signed callbacks and a pending-payment sweep
//! - Installation / maintenance bookings with technician missions
//! - Setup packages (product bundles)

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod payment;
pub mod services;
pub mod state;
pub mod storage;
pub mod util;

pub use config::Config;
pub use state::AppState;
