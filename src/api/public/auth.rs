use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::api::validation::required;
use crate::entities::user::{self, hash_password, Entity as UserEntity, Role};
use crate::identity::create_account;
use crate::middleware::{
    auth::{generate_token, JwtKeys},
    logging::{conflict_on_constraint, ApiError},
};

pub fn auth_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

async fn register(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    payload.validate_for_role()?;

    let email = normalize_email(&payload.email);
    let password = hash_password(&payload.password)
        .map_err(|err| ApiError::PasswordHash(err.to_string()))?;

    let txn = db.begin().await?;
    let id = create_account(
        &txn,
        &email,
        &password,
        payload.role,
        payload.store_name.as_deref().map(str::trim),
    )
    .await
    .map_err(|err| conflict_on_constraint(err, "An account with this email already exists"))?;
    txn.commit().await?;

    info!(user_id = id, role = %payload.role, "Registered account");
    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            id,
            email,
            role: payload.role,
        }),
    ))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(keys): Extension<Arc<JwtKeys>>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate()?;

    let model = UserEntity::find()
        .filter(user::Column::Email.eq(normalize_email(&payload.email)))
        .one(&*db)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    model
        .check_hash(&payload.password)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let token = generate_token(&keys, model.id, model.role, payload.remember_me)
        .map_err(|_| ApiError::TokenGeneration)?;

    Ok(Json(TokenResponse {
        token,
        role: model.role,
    }))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct RegisterPayload {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 150, message = "Email should not exceed 150 characters")
    )]
    email: String,
    #[validate(length(min = 8, max = 32, message = "Password must be 8 to 32 characters long"))]
    password: String,
    role: Role,
    #[validate(length(max = 80, message = "Store name should not exceed 80 characters"))]
    store_name: Option<String>,
}

impl RegisterPayload {
    fn validate_for_role(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let store_name = self.store_name.as_deref().map(str::trim).unwrap_or_default();
        if self.role == Role::Seller && store_name.is_empty() {
            errors.add(
                "store_name",
                ValidationError::new("required")
                    .with_message("Sellers need a store name.".into()),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Deserialize, Validate, Debug)]
struct LoginPayload {
    #[validate(
        custom(function = "required", message = "Email address is required."),
        length(max = 150, message = "Email should not exceed 150 characters")
    )]
    email: String,
    #[validate(
        custom(function = "required", message = "Password is required."),
        length(max = 32, message = "Password should not exceed 32 characters")
    )]
    password: String,
    #[serde(default)]
    remember_me: bool,
}

#[derive(Serialize)]
struct AccountResponse {
    id: i32,
    email: String,
    role: Role,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
    role: Role,
}
