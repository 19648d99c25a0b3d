//! Domain models
//!
//! Entities, closed status enums and the request/response payloads exchanged
//! over the HTTP API. Status strings are persisted lowercase (`as_db` /
//! `from_db`) and serialized as SCREAMING_SNAKE_CASE in JSON.

/// Implements `from_db` / `as_db`, `TryFrom<String>` and `Display` for a
/// closed status enum.
macro_rules! db_enum {
    ($name:ident, $kind:literal { $($variant:ident => $db:literal),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Parse from database string value (lowercase)
            pub fn from_db(s: &str) -> Option<Self> {
                match s {
                    $($db => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Database string representation (lowercase)
            pub fn as_db(&self) -> &'static str {
                match self {
                    $(Self::$variant => $db,)+
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::common::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_db(&value)
                    .ok_or_else(|| $crate::models::common::UnknownVariant::new($kind, value))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_db())
            }
        }
    };
}

pub mod booking;
pub mod cart;
pub mod catalog;
pub mod common;
pub mod order;
pub mod payment;
pub mod setup_package;
pub mod user;
pub mod voucher;

// Re-exports
pub use booking::*;
pub use cart::*;
pub use catalog::*;
pub use common::*;
pub use order::*;
pub use payment::*;
pub use setup_package::*;
pub use user::*;
pub use voucher::*;
