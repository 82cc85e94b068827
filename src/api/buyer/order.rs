use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::entities::{
    address, bag, cart,
    order::{self, Entity as OrderEntity, Status},
    product,
};
use crate::identity::{cart_id, require_buyer};
use crate::images::ImageHost;
use crate::middleware::{auth::Claims, logging::ApiError};

//ROUTERS
pub fn order_router() -> Router {
    Router::new()
        .route("/orders", get(list_orders).post(checkout))
        .route("/orders/:id", get(get_order))
}

//ROUTES
async fn checkout(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Checkout>,
) -> Result<(StatusCode, Json<OrderDetail>), ApiError> {
    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;

    let shipping = address::Entity::find_by_id(payload.address_id)
        .filter(address::Column::BuyerId.eq(buyer_id))
        .one(&txn)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No address with {} id was found.", payload.address_id))
        })?;

    let cart_id = cart_id(&txn, buyer_id).await?;
    let selected = bag::Entity::find()
        .filter(bag::Column::CartId.eq(cart_id))
        .filter(bag::Column::CheckedOut.eq(false))
        .filter(bag::Column::Selected.eq(true))
        .order_by_asc(bag::Column::Id)
        .find_also_related(product::Entity)
        .all(&txn)
        .await?;

    if selected.is_empty() {
        return Err(ApiError::BadRequest(
            "Select at least one cart item to check out.".to_string(),
        ));
    }

    let mut total_in_cents = 0;
    let mut lines = Vec::with_capacity(selected.len());
    for (entry, prod) in selected {
        let prod = prod.ok_or_else(|| {
            ApiError::Conflict(format!("Product {} is no longer available", entry.product_id))
        })?;
        if prod.stock < entry.item_count {
            return Err(ApiError::Conflict(format!(
                "Only {} of \"{}\" left in stock",
                prod.stock, prod.title
            )));
        }
        total_in_cents += prod.price_in_cents * i64::from(entry.item_count);
        lines.push((entry, prod));
    }

    for (entry, prod) in &lines {
        product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(entry.item_count),
            )
            .filter(product::Column::Id.eq(prod.id.clone()))
            .exec(&txn)
            .await?;
    }

    let placed = order::ActiveModel {
        buyer_id: Set(buyer_id),
        address_id: Set(shipping.id),
        total_in_cents: Set(total_in_cents),
        status: Set(Status::Placed),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let bag_ids: Vec<i32> = lines.iter().map(|(entry, _)| entry.id).collect();
    bag::Entity::update_many()
        .col_expr(bag::Column::CheckedOut, Expr::value(true))
        .col_expr(bag::Column::OrderId, Expr::value(placed.id))
        .filter(bag::Column::Id.is_in(bag_ids))
        .exec(&txn)
        .await?;

    close_cart_if_empty(&txn, cart_id).await?;
    txn.commit().await?;

    info!(order_id = placed.id, buyer_id, total_in_cents, "Placed order");
    let items = lines
        .into_iter()
        .map(|(entry, prod)| OrderLine::new(entry, prod, images.as_ref()))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(OrderDetail::new(placed, Some(shipping), items)),
    ))
}

async fn list_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<order::Model>>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;

    let orders = OrderEntity::find()
        .filter(order::Column::BuyerId.eq(buyer_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(orders))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<OrderDetail>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;

    let (placed, shipping) = OrderEntity::find_by_id(id)
        .filter(order::Column::BuyerId.eq(buyer_id))
        .find_also_related(address::Entity)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found.")))?;

    let items = bag::Entity::find()
        .filter(bag::Column::OrderId.eq(placed.id))
        .order_by_asc(bag::Column::Id)
        .find_also_related(product::Entity)
        .all(&*db)
        .await?
        .into_iter()
        .filter_map(|(entry, prod)| Some(OrderLine::new(entry, prod?, images.as_ref())))
        .collect();

    Ok(Json(OrderDetail::new(placed, shipping, items)))
}

/// Marks the cart checked out once every bag in it has been ordered, so the
/// buyer's next cart call opens a fresh one.
async fn close_cart_if_empty<C: ConnectionTrait>(conn: &C, cart_id: i32) -> Result<(), DbErr> {
    let remaining = bag::Entity::find()
        .filter(bag::Column::CartId.eq(cart_id))
        .filter(bag::Column::CheckedOut.eq(false))
        .count(conn)
        .await?;

    if remaining == 0 {
        cart::Entity::update_many()
            .col_expr(cart::Column::CheckedOut, Expr::value(true))
            .filter(cart::Column::Id.eq(cart_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

//Structs
#[derive(Deserialize, Debug)]
struct Checkout {
    address_id: i32,
}

#[derive(Serialize, Debug)]
struct OrderDetail {
    id: i32,
    status: Status,
    total_in_cents: i64,
    created_at: DateTime<Utc>,
    address: Option<address::Model>,
    items: Vec<OrderLine>,
}

impl OrderDetail {
    fn new(placed: order::Model, shipping: Option<address::Model>, items: Vec<OrderLine>) -> Self {
        OrderDetail {
            id: placed.id,
            status: placed.status,
            total_in_cents: placed.total_in_cents,
            created_at: placed.created_at,
            address: shipping,
            items,
        }
    }
}

#[derive(Serialize, Debug)]
struct OrderLine {
    product_id: String,
    item_count: i32,
    item: OrderedProduct,
}

#[derive(Serialize, Debug)]
struct OrderedProduct {
    title: String,
    price_in_cents: i64,
    image: String,
    image_url: String,
}

impl OrderLine {
    fn new(entry: bag::Model, prod: product::Model, images: &dyn ImageHost) -> Self {
        OrderLine {
            product_id: entry.product_id,
            item_count: entry.item_count,
            item: OrderedProduct {
                image_url: images.url(&prod.image),
                title: prod.title,
                price_in_cents: prod.price_in_cents,
                image: prod.image,
            },
        }
    }
}
