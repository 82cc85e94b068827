use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::{
    category,
    product::{self, Entity as ProductEntity},
};
use crate::images::ImageHost;
use crate::middleware::logging::ApiError;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;
const MAX_PAGE: u64 = 1_000_000;

pub fn product_router() -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/:id", get(get_product))
}

async fn get_products(
    params: Result<Query<GetProductsQuery>, QueryRejection>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let (offset, page_size) = params.window()?;

    let mut half_result = ProductEntity::find().find_also_related(category::Entity);

    if let Some(category_id) = params.category {
        half_result = half_result.filter(product::Column::CategoryId.eq(category_id));
    }

    if let Some(query) = params.query.as_deref().map(str::trim) {
        if !query.is_empty() {
            half_result = half_result.filter(product::Column::Title.contains(query));
        }
    }

    let products = half_result
        .order_by_desc(product::Column::CreatedAt)
        .order_by_asc(product::Column::Id)
        .limit(page_size)
        .offset(offset)
        .all(&*db)
        .await?;

    let response = products
        .into_iter()
        .map(|(prod, categ)| ProductResponse::new(prod, categ, images.as_ref()))
        .collect();
    Ok(Json(response))
}

async fn get_product(
    Path(id): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
) -> Result<Json<ProductResponse>, ApiError> {
    let (prod, categ) = ProductEntity::find_by_id(id.clone())
        .find_also_related(category::Entity)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))?;

    Ok(Json(ProductResponse::new(prod, categ, images.as_ref())))
}

#[derive(Deserialize)]
struct GetProductsQuery {
    category: Option<i32>,
    query: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
}

impl GetProductsQuery {
    /// Row offset and page size. Pages start at 1 and stop at `MAX_PAGE`.
    fn window(&self) -> Result<(u64, u64), ApiError> {
        let page = self.page.unwrap_or(1).max(1);
        if page > MAX_PAGE {
            return Err(ApiError::BadRequest(format!(
                "Page must be at most {MAX_PAGE}"
            )));
        }
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Ok(((page - 1) * page_size, page_size))
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
}

/// Product as listed to buyers and to its seller.
#[derive(Serialize, Debug)]
pub struct ProductResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price_in_cents: i64,
    pub stock: i32,
    pub image: String,
    pub image_url: String,
    pub category: Option<CategoryRef>,
    pub seller_id: i32,
    pub created_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn new(
        value: product::Model,
        category: Option<category::Model>,
        images: &dyn ImageHost,
    ) -> ProductResponse {
        ProductResponse {
            image_url: images.url(&value.image),
            id: value.id,
            title: value.title,
            description: value.description,
            price_in_cents: value.price_in_cents,
            stock: value.stock,
            image: value.image,
            category: category.map(|categ| CategoryRef {
                id: categ.id,
                name: categ.name,
            }),
            seller_id: value.seller_id,
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paging(page: Option<u64>, page_size: Option<u64>) -> GetProductsQuery {
        GetProductsQuery {
            category: None,
            query: None,
            page,
            page_size,
        }
    }

    #[test]
    fn window_defaults_and_clamps() {
        assert_eq!(paging(None, None).window().unwrap(), (0, DEFAULT_PAGE_SIZE));
        assert_eq!(paging(Some(0), Some(0)).window().unwrap(), (0, 1));
        assert_eq!(paging(Some(3), Some(500)).window().unwrap(), (200, MAX_PAGE_SIZE));
        assert_eq!(
            paging(Some(MAX_PAGE), Some(MAX_PAGE_SIZE)).window().unwrap(),
            ((MAX_PAGE - 1) * MAX_PAGE_SIZE, MAX_PAGE_SIZE)
        );
    }

    #[test]
    fn window_rejects_pages_past_the_cap() {
        assert!(matches!(
            paging(Some(u64::MAX), None).window(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(paging(Some(MAX_PAGE + 1), Some(1)).window().is_err());
    }
}
