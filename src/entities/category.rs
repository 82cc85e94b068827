use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Highest seeded category id. Products naming anything else land here.
pub const MAX_CATEGORY_ID: i32 = 7;

/// Categories seeded at startup, in id order starting from 1.
pub const KNOWN_CATEGORIES: [&str; 7] = [
    "Electronics",
    "Fashion",
    "Home",
    "Beauty",
    "Sports",
    "Books",
    "Other",
];

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "category")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Maps client supplied category input onto a known category id.
///
/// Non numeric input and ids outside `1..=MAX_CATEGORY_ID` fall back to the
/// last category.
pub fn clamp_category(raw: &str) -> i32 {
    match raw.trim().parse::<i32>() {
        Ok(id) if (1..=MAX_CATEGORY_ID).contains(&id) => id,
        _ => MAX_CATEGORY_ID,
    }
}
