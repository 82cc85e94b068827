pub mod address;
pub mod cart;
pub mod order;

use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::identity::require_buyer;
use crate::middleware::{auth::Claims, logging::ApiError};

use address::address_router;
use cart::cart_router;
use order::order_router;

pub fn buyer_api_router() -> Router {
    Router::new()
        .route("/buyer/me", get(current_buyer))
        .merge(cart_router())
        .merge(address_router())
        .merge(order_router())
}

async fn current_buyer(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;
    Ok(Json(json!({ "buyer_id": buyer_id })))
}
