pub mod product;

use axum::Router;

use product::seller_product_router;

pub fn seller_api_router() -> Router {
    Router::new().merge(seller_product_router())
}
