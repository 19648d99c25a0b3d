//! JWT issuing and the bearer-token middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::UserRole;

use super::Identity;
use crate::state::AppState;

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    /// Role name in database form
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a token, returning it with its expiry
pub fn create_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    secret: &str,
) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::hours(JWT_EXPIRY_HOURS);
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.as_db().to_string(),
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

/// Verify a token and build the caller identity
pub fn decode_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired)
            }
            _ => AppError::invalid_token("Invalid or expired token"),
        }
    })?;

    let claims = token_data.claims;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::invalid_token("Invalid subject"))?;
    let role =
        UserRole::from_db(&claims.role).ok_or_else(|| AppError::invalid_token("Invalid role"))?;

    Ok(Identity {
        user_id,
        email: claims.email,
        role,
    })
}

/// Middleware that verifies the bearer token and inserts [`Identity`]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::not_authenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format"))?;

    let identity = decode_token(token, &state.jwt_secret)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Like [`auth_middleware`] but lets anonymous requests through
///
/// Public catalog routes use this so staff tokens still unlock
/// staff-only views.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| decode_token(token, &state.jwt_secret).ok());
    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let id = Uuid::new_v4();
        let (token, expires_at) = create_token(id, "a@b.vn", UserRole::Technician, "s3cret").unwrap();
        assert!(expires_at > Utc::now());

        let identity = decode_token(&token, "s3cret").unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.role, UserRole::Technician);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (token, _) = create_token(Uuid::new_v4(), "a@b.vn", UserRole::Admin, "one").unwrap();
        let err = decode_token(&token, "two").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }
}
