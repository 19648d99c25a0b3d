//! Authentication and role checks

pub mod jwt;
pub mod rate_limit;

use uuid::Uuid;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::UserRole;

pub use jwt::{auth_middleware, create_token, optional_auth_middleware};
pub use rate_limit::{RateLimiter, client_ip};

/// Authenticated caller extracted from a bearer token
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Manager or admin
    pub fn require_staff(&self) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::RoleRequired))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }

    pub fn require_role(&self, role: UserRole) -> AppResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::RoleRequired))
        }
    }

    /// Owner of the resource, or staff
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_staff()
    }

    pub fn require_access(&self, owner_id: Uuid) -> AppResult<()> {
        if self.can_access(owner_id) {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::NotOwner))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: UserRole) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            role,
        }
    }

    #[test]
    fn test_staff_can_access_any() {
        let manager = identity(UserRole::Manager);
        assert!(manager.can_access(Uuid::new_v4()));
        assert!(manager.require_staff().is_ok());
        assert!(manager.require_admin().is_err());
    }

    #[test]
    fn test_customer_only_owns_self() {
        let customer = identity(UserRole::Customer);
        assert!(customer.can_access(customer.user_id));
        assert_eq!(
            customer.require_access(Uuid::new_v4()).unwrap_err().code,
            ErrorCode::NotOwner
        );
        assert!(customer.require_staff().is_err());
    }
}
