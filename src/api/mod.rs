pub mod buyer;
pub mod public;
pub mod seller;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::entities::user::Role;
use crate::images::ImageHost;
use crate::middleware::{
    auth::{auth_middleware, AuthState, JwtKeys},
    logging::logging_middleware,
};

use buyer::buyer_api_router;
use public::{images::images_router, public_api_router};
use seller::seller_api_router;

/// Largest decoded image the product endpoints accept.
#[derive(Clone, Copy, Debug)]
pub struct FileSizeLimit(pub usize);

/// Shared resources every router is built from.
#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<DatabaseConnection>,
    pub images: Arc<dyn ImageHost>,
    pub keys: Arc<JwtKeys>,
    pub file_size_limit: usize,
}

impl AppContext {
    fn auth_state(&self, role: Role) -> AuthState {
        AuthState {
            db: self.db.clone(),
            keys: self.keys.clone(),
            role,
        }
    }
}

pub fn create_api_router(ctx: AppContext) -> Router {
    // Images travel base64 encoded inside JSON.
    let body_limit = ctx.file_size_limit / 3 * 4 + 64 * 1024;

    let buyer_routes = buyer_api_router().layer(from_fn_with_state(
        ctx.auth_state(Role::Buyer),
        auth_middleware,
    ));
    let seller_routes = seller_api_router().layer(from_fn_with_state(
        ctx.auth_state(Role::Seller),
        auth_middleware,
    ));

    let api = public_api_router()
        .merge(buyer_routes)
        .nest("/seller", seller_routes);

    Router::new()
        .nest("/api", api)
        .merge(images_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(ctx.db))
        .layer(Extension(ctx.images))
        .layer(Extension(ctx.keys))
        .layer(Extension(FileSizeLimit(ctx.file_size_limit)))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
