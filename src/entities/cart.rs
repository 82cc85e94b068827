use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cart")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub buyer_id: i32,
    pub checked_out: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::buyer::Entity",
        from = "Column::BuyerId",
        to = "crate::entities::buyer::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Buyer,
    #[sea_orm(has_many = "crate::entities::bag::Entity")]
    Bag,
}

impl Related<crate::entities::buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<crate::entities::bag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
