use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::{public::product::ProductResponse, validation::required, FileSizeLimit};
use crate::entities::{
    bag, category,
    category::clamp_category,
    product::{self, price_to_cents, Entity as ProductEntity},
};
use crate::identity::require_seller;
use crate::images::{public_id_of, ImageData, ImageHost};
use crate::middleware::{
    auth::Claims,
    logging::{conflict_on_constraint, ApiError},
};

const DEFAULT_STOCK: i32 = 1;

//ROUTERS
pub fn seller_product_router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
}

//ROUTES
async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(FileSizeLimit(limit)): Extension<FileSizeLimit>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    payload.validate()?;
    let seller_id = require_seller(&*db, claims.user_id).await?;
    let image = ImageData::from_data_url(&payload.image, limit)?;

    let image_id = images.upload(&image, None).await?;

    let new_product = product::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        title: Set(payload.title.trim().to_owned()),
        description: Set(payload.description.trim().to_owned()),
        price_in_cents: Set(price_to_cents(payload.price)),
        stock: Set(payload.stock.unwrap_or(DEFAULT_STOCK)),
        image: Set(image_id.clone()),
        category_id: Set(payload.category.clamped()),
        seller_id: Set(seller_id),
        created_at: Set(Utc::now()),
    };

    let created = match new_product.insert(&*db).await {
        Ok(model) => model,
        Err(err) => {
            if let Err(cleanup) = images.delete(&image_id).await {
                warn!(image = %image_id, error = %cleanup, "Failed to remove orphaned image");
            }
            return Err(err.into());
        }
    };

    info!(product_id = %created.id, seller_id, "Created product");
    let categ = category::Entity::find_by_id(created.category_id)
        .one(&*db)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse::new(created, categ, images.as_ref())),
    ))
}

async fn list_products(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let seller_id = require_seller(&*db, claims.user_id).await?;

    let products = ProductEntity::find()
        .filter(product::Column::SellerId.eq(seller_id))
        .find_also_related(category::Entity)
        .order_by_desc(product::Column::CreatedAt)
        .order_by_asc(product::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(
        products
            .into_iter()
            .map(|(prod, categ)| ProductResponse::new(prod, categ, images.as_ref()))
            .collect(),
    ))
}

async fn update_product(
    Path(id): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(FileSizeLimit(limit)): Extension<FileSizeLimit>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ProductInput>,
) -> Result<Json<ProductResponse>, ApiError> {
    payload.validate()?;
    let seller_id = require_seller(&*db, claims.user_id).await?;

    let current = own_product(&*db, &id, seller_id).await?;

    // Clients echo the current image url back unless a new image was dropped.
    let mut new_image = None;
    if !payload.image.contains(&current.image) {
        let image = ImageData::from_data_url(&payload.image, limit)?;
        match images.upload(&image, public_id_of(&current.image)).await {
            Ok(new_id) => new_image = Some(new_id),
            Err(err) => warn!(product_id = %id, error = %err, "Keeping the current image"),
        }
    }

    let txn = db.begin().await?;
    let existing = own_product(&txn, &id, seller_id).await?;
    let image_id = new_image.unwrap_or_else(|| existing.image.clone());

    let mut product: product::ActiveModel = existing.into();
    product.title = Set(payload.title.trim().to_owned());
    product.description = Set(payload.description.trim().to_owned());
    product.price_in_cents = Set(price_to_cents(payload.price));
    product.category_id = Set(payload.category.clamped());
    if let Some(stock) = payload.stock {
        product.stock = Set(stock);
    }
    product.image = Set(image_id);

    let updated = product.update(&txn).await?;
    txn.commit().await?;

    let categ = category::Entity::find_by_id(updated.category_id)
        .one(&*db)
        .await?;
    Ok(Json(ProductResponse::new(updated, categ, images.as_ref())))
}

async fn delete_product(
    Path(id): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let txn = db.begin().await?;
    let seller_id = require_seller(&txn, claims.user_id).await?;
    let existing = own_product(&txn, &id, seller_id).await?;

    bag::Entity::delete_many()
        .filter(bag::Column::ProductId.eq(id.clone()))
        .filter(bag::Column::CheckedOut.eq(false))
        .exec(&txn)
        .await?;

    ProductEntity::delete_many()
        .filter(product::Column::Id.eq(id.clone()))
        .filter(product::Column::SellerId.eq(seller_id))
        .exec(&txn)
        .await
        .map_err(|err| {
            conflict_on_constraint(err, "This product is part of an order and cannot be deleted")
        })?;
    txn.commit().await?;

    // The product is gone either way, a stale image only costs storage.
    if let Err(err) = images.delete(&existing.image).await {
        warn!(image = %existing.image, error = %err, "Failed to delete product image");
    }

    Ok(Json(json!({
        "message": "Resource deleted successfully."
    })))
}

//HELPERS
async fn own_product<C: ConnectionTrait>(
    conn: &C,
    id: &str,
    seller_id: i32,
) -> Result<product::Model, ApiError> {
    ProductEntity::find_by_id(id.to_owned())
        .filter(product::Column::SellerId.eq(seller_id))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))
}

//Structs
/// Category as sent by the product form, a number or a numeric string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum CategoryInput {
    Id(i64),
    Text(String),
}

impl CategoryInput {
    fn clamped(&self) -> i32 {
        match self {
            CategoryInput::Id(id) => clamp_category(&id.to_string()),
            CategoryInput::Text(text) => clamp_category(text),
        }
    }
}

#[derive(Deserialize, Validate, Debug)]
struct ProductInput {
    #[validate(
        custom(function = "required", message = "Title is required."),
        length(max = 120, message = "Title should not exceed 120 characters")
    )]
    title: String,
    #[validate(length(max = 5000, message = "Description should not exceed 5000 characters"))]
    description: String,
    #[validate(range(
        min = 0.01,
        max = 1_000_000.0,
        message = "Price must be between 0.01 and 1000000"
    ))]
    price: f64,
    category: CategoryInput,
    #[validate(range(min = 0, max = 1_000_000, message = "Stock must be between 0 and 1000000"))]
    stock: Option<i32>,
    /// A `data:` url with new image bytes, or the current image url.
    image: String,
}
