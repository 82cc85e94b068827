use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price_in_cents: i64,
    pub stock: i32,
    /// Image host id, `v<version>/<folder>/<public_id>`.
    pub image: String,
    pub category_id: i32,
    #[sea_orm(indexed)]
    pub seller_id: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::category::Entity",
        from = "Column::CategoryId",
        to = "crate::entities::category::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "crate::entities::seller::Entity",
        from = "Column::SellerId",
        to = "crate::entities::seller::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Seller,
}

impl Related<crate::entities::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<crate::entities::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Converts a decimal price into whole cents, rounding half away from zero.
pub fn price_to_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}
