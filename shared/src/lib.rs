//! Shared types for the Aqua backend
//!
//! Domain models, status machines, request/response DTOs and the unified
//! error system used by the server and its API clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use models::PaginatedResponse;
