//! Accounts: registration, login and admin user management

use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    LoginRequest, LoginResponse, PaginatedResponse, ProfileUpdate, RegisterRequest, User,
    UserCreate, UserFilter, UserProfile, UserRole, UserStatus,
};
use shared::util::now;

use super::{found, validate};
use crate::auth::{Identity, create_token};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::util::{hash_password, verify_password};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_hash(password: &str) -> ServiceResult<String> {
    hash_password(password).map_err(|e| ServiceError::Db(e.to_string().into()))
}

/// Insert a new account, rejecting a taken email
async fn insert_account(
    state: &AppState,
    email: &str,
    password: &str,
    full_name: String,
    phone: Option<String>,
    address: Option<String>,
    role: UserRole,
) -> ServiceResult<User> {
    let email = normalize_email(email);
    let mut uow = state.store.begin().await?;
    if uow.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::new(ErrorCode::EmailAlreadyRegistered).into());
    }

    let now = now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: password_hash(password)?,
        full_name,
        phone,
        address,
        role,
        status: UserStatus::Available,
        created_at: now,
        updated_at: now,
    };
    uow.insert_user(&user).await?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account created");
    Ok(user)
}

/// Customer self-registration
pub async fn register(state: &AppState, req: RegisterRequest) -> ServiceResult<UserProfile> {
    validate(&req)?;
    let user = insert_account(
        state,
        &req.email,
        &req.password,
        req.full_name,
        req.phone,
        req.address,
        UserRole::Customer,
    )
    .await?;
    Ok(UserProfile::from(&user))
}

pub async fn login(state: &AppState, req: LoginRequest) -> ServiceResult<LoginResponse> {
    let mut uow = state.store.begin().await?;
    let user = uow
        .find_user_by_email(&normalize_email(&req.email))
        .await?
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(AppError::invalid_credentials)?;
    drop(uow);

    if !user.is_available() {
        return Err(AppError::new(ErrorCode::AccountDisabled).into());
    }

    let (token, expires_at) = create_token(user.id, &user.email, user.role, &state.jwt_secret)
        .map_err(|e| ServiceError::Db(e.into()))?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(LoginResponse {
        token,
        expires_at,
        user: UserProfile::from(&user),
    })
}

pub async fn me(state: &AppState, caller: &Identity) -> ServiceResult<UserProfile> {
    let mut uow = state.store.begin().await?;
    let user = found(uow.find_user(caller.user_id).await?, ErrorCode::UserNotFound)?;
    Ok(UserProfile::from(&user))
}

pub async fn update_profile(
    state: &AppState,
    caller: &Identity,
    req: ProfileUpdate,
) -> ServiceResult<UserProfile> {
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut user = found(uow.find_user(caller.user_id).await?, ErrorCode::UserNotFound)?;
    if let Some(full_name) = req.full_name {
        user.full_name = full_name;
    }
    if req.phone.is_some() {
        user.phone = req.phone;
    }
    if req.address.is_some() {
        user.address = req.address;
    }
    user.updated_at = now();
    uow.update_user(&user).await?;
    uow.commit().await?;
    Ok(UserProfile::from(&user))
}

pub async fn list_users(
    state: &AppState,
    caller: &Identity,
    filter: UserFilter,
) -> ServiceResult<PaginatedResponse<UserProfile>> {
    caller.require_admin()?;
    let mut uow = state.store.begin().await?;
    let page = uow.list_users(&filter).await?;
    Ok(page.map(|u| UserProfile::from(&u)))
}

/// Available technicians, for assignment pickers
pub async fn list_technicians(
    state: &AppState,
    caller: &Identity,
) -> ServiceResult<Vec<UserProfile>> {
    caller.require_staff()?;
    let filter = UserFilter {
        role: Some(UserRole::Technician),
        status: Some(UserStatus::Available),
        limit: Some(shared::models::MAX_PAGE_SIZE),
        ..Default::default()
    };
    let mut uow = state.store.begin().await?;
    let page = uow.list_users(&filter).await?;
    Ok(page.data.iter().map(UserProfile::from).collect())
}

/// Admin-created staff or technician account
pub async fn create_user(
    state: &AppState,
    caller: &Identity,
    req: UserCreate,
) -> ServiceResult<UserProfile> {
    caller.require_admin()?;
    validate(&req)?;
    let user = insert_account(
        state,
        &req.email,
        &req.password,
        req.full_name,
        req.phone,
        req.address,
        req.role,
    )
    .await?;
    Ok(UserProfile::from(&user))
}

pub async fn update_role(
    state: &AppState,
    caller: &Identity,
    user_id: Uuid,
    role: UserRole,
) -> ServiceResult<UserProfile> {
    caller.require_admin()?;
    let mut uow = state.store.begin().await?;
    let mut user = found(uow.find_user(user_id).await?, ErrorCode::UserNotFound)?;
    user.role = role;
    user.updated_at = now();
    uow.update_user(&user).await?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, role = %role, "User role changed");
    Ok(UserProfile::from(&user))
}

/// Soft delete: the account is kept with status Deleted
pub async fn delete_user(state: &AppState, caller: &Identity, user_id: Uuid) -> ServiceResult<()> {
    caller.require_admin()?;
    if caller.user_id == user_id {
        return Err(AppError::new(ErrorCode::CannotDeleteSelf).into());
    }
    let mut uow = state.store.begin().await?;
    let mut user = found(uow.find_user(user_id).await?, ErrorCode::UserNotFound)?;
    if !user.is_available() {
        return Err(AppError::new(ErrorCode::UserDeleted).into());
    }
    user.status = UserStatus::Deleted;
    user.updated_at = now();
    uow.update_user(&user).await?;
    uow.commit().await?;

    tracing::info!(user_id = %user_id, "User deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::test_app;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "aquarium123".into(),
            full_name: "Lan Nguyen".into(),
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = test_app();
        let profile = register(&app.state, registration("Lan@Example.com")).await.unwrap();
        assert_eq!(profile.email, "lan@example.com");
        assert_eq!(profile.role, UserRole::Customer);

        let login_resp = login(
            &app.state,
            LoginRequest {
                email: "lan@example.com".into(),
                password: "aquarium123".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(login_resp.user.id, profile.id);
        assert!(!login_resp.token.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let app = test_app();
        register(&app.state, registration("a@example.com")).await.unwrap();
        let err: AppError = register(&app.state, registration("A@example.com"))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::EmailAlreadyRegistered);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let app = test_app();
        register(&app.state, registration("b@example.com")).await.unwrap();
        let err: AppError = login(
            &app.state,
            LoginRequest {
                email: "b@example.com".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_login() {
        let app = test_app();
        let admin = app.user(UserRole::Admin).await;
        let profile = register(&app.state, registration("c@example.com")).await.unwrap();
        delete_user(&app.state, &admin, profile.id).await.unwrap();

        let err: AppError = login(
            &app.state,
            LoginRequest {
                email: "c@example.com".into(),
                password: "aquarium123".into(),
            },
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::AccountDisabled);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let app = test_app();
        let admin = app.user(UserRole::Admin).await;
        let err: AppError = delete_user(&app.state, &admin, admin.user_id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::CannotDeleteSelf);
    }

    #[tokio::test]
    async fn test_list_technicians() {
        let app = test_app();
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        app.user(UserRole::Customer).await;

        let techs = list_technicians(&app.state, &manager).await.unwrap();
        assert_eq!(techs.len(), 1);
        assert_eq!(techs[0].id, tech.user_id);
    }
}
