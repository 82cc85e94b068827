pub mod auth;
pub mod category;
pub mod images;
pub mod product;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use auth::auth_router;
use category::category_router;
use product::product_router;

pub fn public_api_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_router())
        .merge(category_router())
        .merge(product_router())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
