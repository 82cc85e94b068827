//! Resolves the authenticated user to the buyer, seller and cart rows that
//! ownership filters are built from.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

use crate::entities::{buyer, cart, seller, user, user::Role};
use crate::middleware::logging::ApiError;

pub async fn buyer_id<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<Option<i32>, DbErr> {
    Ok(buyer::Entity::find()
        .filter(buyer::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .map(|buyer| buyer.id))
}

pub async fn seller_id<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<Option<i32>, DbErr> {
    Ok(seller::Entity::find()
        .filter(seller::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .map(|seller| seller.id))
}

pub async fn require_buyer<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<i32, ApiError> {
    buyer_id(conn, user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("No buyer profile for this account".to_string()))
}

pub async fn require_seller<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<i32, ApiError> {
    seller_id(conn, user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("No seller profile for this account".to_string()))
}

/// The buyer's open cart, created on first use. A buyer has at most one cart
/// that is not checked out, enforced by the `cart_one_open` index.
pub async fn cart_id<C: ConnectionTrait>(conn: &C, buyer_id: i32) -> Result<i32, DbErr> {
    if let Some(id) = open_cart_id(conn, buyer_id).await? {
        return Ok(id);
    }

    let inserted = cart::Entity::insert(cart::ActiveModel {
        buyer_id: Set(buyer_id),
        checked_out: Set(false),
        ..Default::default()
    })
    .exec(conn)
    .await;

    match inserted {
        Ok(inserted) => Ok(inserted.last_insert_id),
        // A concurrent request opened the cart first.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            open_cart_id(conn, buyer_id).await?.ok_or(err)
        }
        Err(err) => Err(err),
    }
}

async fn open_cart_id<C: ConnectionTrait>(conn: &C, buyer_id: i32) -> Result<Option<i32>, DbErr> {
    Ok(cart::Entity::find()
        .filter(cart::Column::BuyerId.eq(buyer_id))
        .filter(cart::Column::CheckedOut.eq(false))
        .order_by_asc(cart::Column::Id)
        .one(conn)
        .await?
        .map(|cart| cart.id))
}

/// Inserts a user and the matching buyer or seller profile. Returns the user id.
pub async fn create_account<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    password_hash: &str,
    role: Role,
    store_name: Option<&str>,
) -> Result<i32, DbErr> {
    let user_id = user::Entity::insert(user::ActiveModel {
        email: Set(email.to_owned()),
        password: Set(password_hash.to_owned()),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .exec(conn)
    .await?
    .last_insert_id;

    match role {
        Role::Buyer => {
            buyer::Entity::insert(buyer::ActiveModel {
                user_id: Set(user_id),
                ..Default::default()
            })
            .exec(conn)
            .await?;
        }
        Role::Seller => {
            seller::Entity::insert(seller::ActiveModel {
                user_id: Set(user_id),
                store_name: Set(store_name.unwrap_or_default().to_owned()),
                ..Default::default()
            })
            .exec(conn)
            .await?;
        }
    }

    Ok(user_id)
}
