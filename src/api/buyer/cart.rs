use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use validator::Validate;

use crate::entities::{bag, product, seller};
use crate::identity::{cart_id, require_buyer};
use crate::images::ImageHost;
use crate::middleware::{auth::Claims, logging::ApiError};

/// Upper bound for the item count of a single cart line.
pub const MAX_ITEM_COUNT: i32 = 10_000;

//ROUTERS
pub fn cart_router() -> Router {
    Router::new()
        .route("/cart", get(get_cart_items).post(add_to_cart))
        .route("/cart/count", get(get_item_count))
        .route("/cart/selected", get(get_selected_cart_items))
        .route("/cart/price", get(get_cart_items_price))
        .route("/cart/select", patch(toggle_all_bags_select))
        .route("/cart/:id", put(update_item_count).delete(delete_item))
        .route("/cart/:id/select", patch(toggle_bag_select))
        .route("/cart/:id/increment", post(increment_item_count))
        .route("/cart/:id/decrement", post(decrement_item_count))
}

//ROUTES
async fn get_item_count(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<i64>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;
    let cart_id = cart_id(&*db, buyer_id).await?;

    let count: i64 = open_bags(cart_id)
        .all(&*db)
        .await?
        .iter()
        .map(|bag| i64::from(bag.item_count))
        .sum();

    Ok(Json(count))
}

async fn get_cart_items(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;
    let cart_id = cart_id(&*db, buyer_id).await?;

    let items = cart_items(&*db, images.as_ref(), cart_id, false).await?;
    Ok(Json(items))
}

async fn get_selected_cart_items(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;
    let cart_id = cart_id(&*db, buyer_id).await?;

    let items = cart_items(&*db, images.as_ref(), cart_id, true).await?;
    Ok(Json(items))
}

async fn get_cart_items_price(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<i64>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;
    let cart_id = cart_id(&*db, buyer_id).await?;

    let selected = open_bags(cart_id)
        .filter(bag::Column::Selected.eq(true))
        .find_also_related(product::Entity)
        .all(&*db)
        .await?;

    let total: i64 = selected
        .iter()
        .filter_map(|(bag, prod)| {
            prod.as_ref()
                .map(|prod| prod.price_in_cents * i64::from(bag.item_count))
        })
        .sum();

    Ok(Json(total))
}

async fn add_to_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddToCart>,
) -> Result<(StatusCode, Json<bag::Model>), ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;
    let cart_id = cart_id(&txn, buyer_id).await?;

    product::Entity::find_by_id(payload.id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {} id was found.", payload.id)))?;

    let existing = open_bags(cart_id)
        .filter(bag::Column::ProductId.eq(payload.id.clone()))
        .one(&txn)
        .await?;

    let (status, entry) = match existing {
        Some(entry) => {
            let item_count = grown_item_count(entry.item_count, payload.quantity)?;
            let mut entry: bag::ActiveModel = entry.into();
            entry.item_count = Set(item_count);
            (StatusCode::OK, entry.update(&txn).await?)
        }
        None => {
            let entry = bag::ActiveModel {
                cart_id: Set(cart_id),
                product_id: Set(payload.id),
                item_count: Set(payload.quantity),
                selected: Set(true),
                checked_out: Set(false),
                order_id: Set(None),
                ..Default::default()
            };
            (StatusCode::CREATED, entry.insert(&txn).await?)
        }
    };
    txn.commit().await?;

    Ok((status, Json(entry)))
}

async fn toggle_bag_select(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ToggleBag>,
) -> Result<Json<bag::Model>, ApiError> {
    let txn = db.begin().await?;
    let entry = find_own_bag(&txn, claims.user_id, id).await?;

    let mut entry: bag::ActiveModel = entry.into();
    entry.selected = Set(!payload.is_selected);
    let entry = entry.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(entry))
}

async fn toggle_all_bags_select(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ToggleAll>,
) -> Result<Json<Value>, ApiError> {
    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;
    let cart_id = cart_id(&txn, buyer_id).await?;

    let result = bag::Entity::update_many()
        .col_expr(bag::Column::Selected, Expr::value(!payload.should_deselect))
        .filter(bag::Column::CartId.eq(cart_id))
        .filter(bag::Column::CheckedOut.eq(false))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(Json(json!({
        "updated": result.rows_affected
    })))
}

async fn increment_item_count(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<bag::Model>, ApiError> {
    let txn = db.begin().await?;
    let entry = find_own_bag(&txn, claims.user_id, id).await?;

    let item_count = grown_item_count(entry.item_count, 1)?;
    let entry = set_item_count(&txn, entry, item_count).await?;
    txn.commit().await?;

    Ok(Json(entry))
}

async fn decrement_item_count(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<bag::Model>, ApiError> {
    let txn = db.begin().await?;
    let entry = find_own_bag(&txn, claims.user_id, id).await?;

    if entry.item_count <= 1 {
        return Err(ApiError::BadRequest(
            "Item count cannot go below 1, remove the item instead.".to_string(),
        ));
    }

    let item_count = entry.item_count - 1;
    let entry = set_item_count(&txn, entry, item_count).await?;
    txn.commit().await?;

    Ok(Json(entry))
}

async fn update_item_count(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateCount>,
) -> Result<Json<bag::Model>, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let entry = find_own_bag(&txn, claims.user_id, id).await?;
    let entry = set_item_count(&txn, entry, payload.quantity).await?;
    txn.commit().await?;

    Ok(Json(entry))
}

async fn delete_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let txn = db.begin().await?;
    let entry = find_own_bag(&txn, claims.user_id, id).await?;

    bag::Entity::delete_by_id(entry.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "message": "Resource deleted successfully."
    })))
}

//HELPERS
fn grown_item_count(current: i32, added: i32) -> Result<i32, ApiError> {
    current
        .checked_add(added)
        .filter(|count| *count <= MAX_ITEM_COUNT)
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "A cart item cannot hold more than {MAX_ITEM_COUNT} units."
            ))
        })
}

fn open_bags(cart_id: i32) -> sea_orm::Select<bag::Entity> {
    bag::Entity::find()
        .filter(bag::Column::CartId.eq(cart_id))
        .filter(bag::Column::CheckedOut.eq(false))
        .order_by_asc(bag::Column::Id)
}

/// A bag of the caller's open cart, 404 for anything else.
async fn find_own_bag<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    id: i32,
) -> Result<bag::Model, ApiError> {
    let buyer_id = require_buyer(conn, user_id).await?;
    let cart_id = cart_id(conn, buyer_id).await?;

    open_bags(cart_id)
        .filter(bag::Column::Id.eq(id))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No cart item with {id} id was found.")))
}

async fn set_item_count<C: ConnectionTrait>(
    conn: &C,
    entry: bag::Model,
    item_count: i32,
) -> Result<bag::Model, DbErr> {
    let mut entry: bag::ActiveModel = entry.into();
    entry.item_count = Set(item_count);
    entry.update(conn).await
}

async fn cart_items<C: ConnectionTrait>(
    conn: &C,
    images: &dyn ImageHost,
    cart_id: i32,
    selected_only: bool,
) -> Result<Vec<CartItem>, DbErr> {
    let mut query = open_bags(cart_id);
    if selected_only {
        query = query.filter(bag::Column::Selected.eq(true));
    }
    let bags = query.find_also_related(product::Entity).all(conn).await?;

    let seller_ids: Vec<i32> = bags
        .iter()
        .filter_map(|(_, prod)| prod.as_ref().map(|prod| prod.seller_id))
        .collect();
    let stores: HashMap<i32, String> = seller::Entity::find()
        .filter(seller::Column::Id.is_in(seller_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|seller| (seller.id, seller.store_name))
        .collect();

    Ok(bags
        .into_iter()
        .filter_map(|(entry, prod)| {
            let prod = prod?;
            let store_name = stores.get(&prod.seller_id).cloned().unwrap_or_default();
            Some(CartItem {
                id: entry.id,
                selected: entry.selected,
                item_count: entry.item_count,
                product_id: entry.product_id,
                item: CartProduct {
                    image_url: images.url(&prod.image),
                    image: prod.image,
                    title: prod.title,
                    stock: prod.stock,
                    price_in_cents: prod.price_in_cents,
                    seller: StoreRef { store_name },
                },
            })
        })
        .collect())
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct AddToCart {
    id: String,
    #[validate(range(
        min = 1,
        max = MAX_ITEM_COUNT,
        message = "Quantity must be between 1 and 10000"
    ))]
    quantity: i32,
}

#[derive(Deserialize, Validate, Debug)]
struct UpdateCount {
    #[validate(range(
        min = 1,
        max = MAX_ITEM_COUNT,
        message = "Quantity must be between 1 and 10000"
    ))]
    quantity: i32,
}

#[derive(Deserialize, Debug)]
struct ToggleBag {
    is_selected: bool,
}

#[derive(Deserialize, Debug)]
struct ToggleAll {
    #[serde(default)]
    should_deselect: bool,
}

#[derive(Serialize, Debug)]
struct CartItem {
    id: i32,
    selected: bool,
    item_count: i32,
    product_id: String,
    item: CartProduct,
}

#[derive(Serialize, Debug)]
struct CartProduct {
    image: String,
    image_url: String,
    title: String,
    stock: i32,
    price_in_cents: i64,
    seller: StoreRef,
}

#[derive(Serialize, Debug)]
struct StoreRef {
    store_name: String,
}
