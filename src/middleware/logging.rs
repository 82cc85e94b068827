use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::{json, Map, Value};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};
use validator::ValidationErrors;

use crate::images::ImageError;

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<LoggedError>() {
        Some(logged) => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %logged.0,
            "Failed to process request"
        ),
        None => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
    }

    response
}

/// Full error text attached to error responses for `logging_middleware`.
/// The client only ever sees the public message.
#[derive(Clone, Debug)]
pub struct LoggedError(pub String);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error("Failed to validate: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
    #[error("Failed to generate token")]
    TokenGeneration,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Db(_) | Self::PasswordHash(_) | Self::TokenGeneration => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Image(err) => match err {
                ImageError::InvalidDataUrl(_) | ImageError::UnsupportedType(_) => {
                    StatusCode::BAD_REQUEST
                }
                ImageError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ImageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ImageError::Http(_) | ImageError::Host(_) => StatusCode::BAD_GATEWAY,
            },
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Db(_) | Self::PasswordHash(_) | Self::TokenGeneration => {
                "Internal server error".to_string()
            }
            Self::Validation(_) => "Validation failed".to_string(),
            Self::Image(ImageError::Io(_)) => "Internal server error".to_string(),
            Self::Image(ImageError::Http(_) | ImageError::Host(_)) => {
                "Image host is unavailable".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Turns unique and foreign key violations into a conflict with `message`,
/// everything else stays a database error.
pub fn conflict_on_constraint(err: DbErr, message: &str) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_))
        | Some(SqlErr::ForeignKeyConstraintViolation(_)) => ApiError::Conflict(message.to_string()),
        _ => ApiError::Db(err),
    }
}

fn validation_fields(errors: &ValidationErrors) -> Value {
    let mut fields = Map::new();
    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<Value> = field_errors
            .iter()
            .map(|err| match &err.message {
                Some(message) => Value::String(message.to_string()),
                None => Value::String(err.code.to_string()),
            })
            .collect();
        fields.insert(field.to_string(), Value::Array(messages));
    }
    Value::Object(fields)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({
                "error": self.public_message(),
                "fields": validation_fields(errors),
            }),
            _ => json!({ "error": self.public_message() }),
        };

        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(LoggedError(self.to_string()));
        response
    }
}
