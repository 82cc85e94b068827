use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::api::validation::{required, POSTAL_CODE_REGEX};
use crate::entities::address::{self, Entity as AddressEntity};
use crate::identity::require_buyer;
use crate::middleware::{
    auth::Claims,
    logging::{conflict_on_constraint, ApiError},
};

//ROUTERS
pub fn address_router() -> Router {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route("/addresses/:id", put(update_address).delete(delete_address))
}

//ROUTES
async fn list_addresses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<address::Model>>, ApiError> {
    let buyer_id = require_buyer(&*db, claims.user_id).await?;

    let addresses = AddressEntity::find()
        .filter(address::Column::BuyerId.eq(buyer_id))
        .order_by_desc(address::Column::IsDefault)
        .order_by_asc(address::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(addresses))
}

async fn create_address(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddressInput>,
) -> Result<(StatusCode, Json<address::Model>), ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;

    let existing = AddressEntity::find()
        .filter(address::Column::BuyerId.eq(buyer_id))
        .count(&txn)
        .await?;
    let is_default = payload.is_default || existing == 0;
    if is_default {
        clear_default(&txn, buyer_id).await?;
    }

    let created = address::ActiveModel {
        buyer_id: Set(buyer_id),
        address_line1: Set(payload.address_line1.trim().to_owned()),
        city: Set(payload.city.trim().to_owned()),
        postal_code: Set(payload.postal_code.trim().to_owned()),
        region: Set(payload.region.trim().to_owned()),
        country: Set(payload.country.trim().to_owned()),
        is_default: Set(is_default),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_address(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddressInput>,
) -> Result<Json<address::Model>, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;
    let existing = find_own_address(&txn, buyer_id, id).await?;

    if payload.is_default {
        clear_default(&txn, buyer_id).await?;
    }

    let mut entry: address::ActiveModel = existing.into();
    entry.address_line1 = Set(payload.address_line1.trim().to_owned());
    entry.city = Set(payload.city.trim().to_owned());
    entry.postal_code = Set(payload.postal_code.trim().to_owned());
    entry.region = Set(payload.region.trim().to_owned());
    entry.country = Set(payload.country.trim().to_owned());
    entry.is_default = Set(payload.is_default);
    let updated = entry.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(updated))
}

async fn delete_address(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let txn = db.begin().await?;
    let buyer_id = require_buyer(&txn, claims.user_id).await?;
    let existing = find_own_address(&txn, buyer_id, id).await?;

    AddressEntity::delete_by_id(existing.id)
        .exec(&txn)
        .await
        .map_err(|err| {
            conflict_on_constraint(err, "This address is used by an order and cannot be deleted")
        })?;

    // Hand the default over to the oldest remaining address.
    if existing.is_default {
        let next = AddressEntity::find()
            .filter(address::Column::BuyerId.eq(buyer_id))
            .order_by_asc(address::Column::Id)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            let mut next: address::ActiveModel = next.into();
            next.is_default = Set(true);
            next.update(&txn).await?;
        }
    }
    txn.commit().await?;

    Ok(Json(json!({
        "message": "Resource deleted successfully."
    })))
}

async fn find_own_address<C: ConnectionTrait>(
    conn: &C,
    buyer_id: i32,
    id: i32,
) -> Result<address::Model, ApiError> {
    AddressEntity::find_by_id(id)
        .filter(address::Column::BuyerId.eq(buyer_id))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No address with {id} id was found.")))
}

async fn clear_default<C: ConnectionTrait>(conn: &C, buyer_id: i32) -> Result<(), DbErr> {
    AddressEntity::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::BuyerId.eq(buyer_id))
        .exec(conn)
        .await?;
    Ok(())
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct AddressInput {
    #[validate(
        custom(function = "required", message = "Address is required."),
        length(max = 120, message = "Address should not exceed 120 characters")
    )]
    address_line1: String,
    #[validate(
        custom(function = "required", message = "City is required."),
        length(max = 80, message = "City should not exceed 80 characters")
    )]
    city: String,
    #[validate(regex(path = *POSTAL_CODE_REGEX, message = "Enter a valid postal code."))]
    postal_code: String,
    #[validate(
        custom(function = "required", message = "Region is required."),
        length(max = 80, message = "Region should not exceed 80 characters")
    )]
    region: String,
    #[validate(
        custom(function = "required", message = "Country is required."),
        length(max = 80, message = "Country should not exceed 80 characters")
    )]
    country: String,
    #[serde(default)]
    is_default: bool,
}
