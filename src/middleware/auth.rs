use crate::entities::user::{self, Entity as UserEntity, Role};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::middleware::logging::ApiError;

/// Token lifetime without "remember me".
pub const SESSION_HOURS: i64 = 24;
/// Token lifetime with "remember me".
pub const REMEMBER_ME_DAYS: i64 = 30;

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = match validate_token(&state.db, &state.keys, token, state.role).await {
        Ok(claims) => claims,
        Err(AuthError::WrongRole) => {
            return Err(ApiError::Forbidden(format!(
                "This action requires a {} account",
                state.role
            )))
        }
        Err(AuthError::Db(err)) => return Err(ApiError::Db(err)),
        Err(err) => {
            debug!(error = %err, "Rejected token");
            return Err(ApiError::Unauthorized(err.to_string()));
        }
    };

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i32,
    pub role: Role,
    pub exp: usize,
}

/// HMAC keys for issuing and checking access tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub keys: Arc<JwtKeys>,
    pub role: Role,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid user id or role")]
    InvalidUser,
    #[error("Wrong role for this route")]
    WrongRole,
    #[error("Token expired or malformed")]
    InvalidToken,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

pub fn generate_token(
    keys: &JwtKeys,
    user_id: i32,
    role: Role,
    remember_me: bool,
) -> Result<String, AuthError> {
    let lifetime = if remember_me {
        Duration::days(REMEMBER_ME_DAYS)
    } else {
        Duration::hours(SESSION_HOURS)
    };
    let exp = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or(AuthError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims { user_id, role, exp };

    encode(&Header::default(), &claims, &keys.encoding).map_err(|_| AuthError::GenerationFail)
}

pub fn decode_token(keys: &JwtKeys, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
}

/// Decodes `token` and checks that its user still exists with the role the
/// route group needs.
pub async fn validate_token(
    db: &DatabaseConnection,
    keys: &JwtKeys,
    token: &str,
    req_role: Role,
) -> Result<Claims, AuthError> {
    let claims = decode_token(keys, token)?;

    let exists = UserEntity::find_by_id(claims.user_id)
        .filter(user::Column::Role.eq(claims.role))
        .one(db)
        .await?
        .is_some();

    if !exists {
        return Err(AuthError::InvalidUser);
    }
    if claims.role != req_role {
        return Err(AuthError::WrongRole);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode() {
        let keys = JwtKeys::new("test-secret");
        let token = generate_token(&keys, 7, Role::Seller, false).expect("token");
        let claims = decode_token(&keys, &token).expect("valid token");

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, Role::Seller);
    }

    #[test]
    fn remember_me_lasts_longer() {
        let keys = JwtKeys::new("test-secret");
        let short = decode_token(&keys, &generate_token(&keys, 1, Role::Buyer, false).unwrap())
            .unwrap();
        let long = decode_token(&keys, &generate_token(&keys, 1, Role::Buyer, true).unwrap())
            .unwrap();

        let day = 24 * 60 * 60;
        assert!(long.exp - short.exp >= (REMEMBER_ME_DAYS as usize - 1) * day);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = generate_token(&JwtKeys::new("one"), 1, Role::Buyer, false).unwrap();
        assert!(matches!(
            decode_token(&JwtKeys::new("two"), &token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = JwtKeys::new("test-secret");
        let claims = Claims {
            user_id: 1,
            role: Role::Buyer,
            exp: (Utc::now().timestamp() - 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(matches!(
            decode_token(&keys, &token),
            Err(AuthError::InvalidToken)
        ));
    }
}
