use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use std::sync::Arc;

use crate::entities::category::{self, Entity as CategoryEntity};
use crate::middleware::logging::ApiError;

pub fn category_router() -> Router {
    Router::new().route("/categories", get(get_categories))
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<Vec<category::Model>>, ApiError> {
    let categories = CategoryEntity::find()
        .order_by_asc(category::Column::Id)
        .all(&*db)
        .await?;
    Ok(Json(categories))
}
