pub mod address;
pub mod bag;
pub mod buyer;
pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod seller;
pub mod user;

use sea_orm::{
    sea_query::TableCreateStatement, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Schema, Set, TransactionTrait,
};

use crate::entities::user::Role;
use crate::identity::create_account;

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children so foreign keys resolve.
    let statements: Vec<TableCreateStatement> = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(buyer::Entity),
        schema.create_table_from_entity(seller::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(address::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(bag::Entity),
    ];

    for mut statement in statements {
        statement.if_not_exists();
        db.execute(backend.build(&statement)).await?;
    }

    // At most one open cart per buyer.
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS cart_one_open ON cart (buyer_id) WHERE NOT checked_out",
    )
    .await?;

    Ok(())
}

/// Inserts the known categories that are not in the table yet.
pub async fn seed_categories(db: &DatabaseConnection) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    for (index, name) in category::KNOWN_CATEGORIES.iter().enumerate() {
        let id = index as i32 + 1;
        if category::Entity::find_by_id(id).one(&txn).await?.is_none() {
            category::Entity::insert(category::ActiveModel {
                id: Set(id),
                name: Set((*name).to_owned()),
            })
            .exec(&txn)
            .await?;
        }
    }

    txn.commit().await
}

/// Creates `buyer@example.com` and `seller@example.com`, both with the
/// password `Secret15`, unless they already exist.
pub async fn seed_demo_accounts(db: &DatabaseConnection) -> Result<(), DbErr> {
    let password_hash = user::hash_password("Secret15")
        .map_err(|err| DbErr::Custom(format!("Failed to hash password: {err}")))?;

    let txn = db.begin().await?;

    for (email, role) in [
        ("buyer@example.com", Role::Buyer),
        ("seller@example.com", Role::Seller),
    ] {
        let exists = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let store_name = (role == Role::Seller).then_some("Demo Store");
        create_account(&txn, email, &password_hash, role, store_name).await?;
    }

    txn.commit().await
}
