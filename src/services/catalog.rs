use std::sync::Arc;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use tracing::instrument;

use crate::entities::prelude::Product;
use crate::entities::product;
use crate::errors::ServiceError;

/// Read-only storefront view of the product catalog. Writes happen through
/// the back office, outside this service.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductSearchQuery {
    pub category: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists sellable products, newest first, optionally narrowed to a
    /// category. Returns the page plus the total match count.
    #[instrument(skip(self))]
    pub async fn list_active(
        &self,
        query: &ProductSearchQuery,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, 100);

        let mut find = Product::find().filter(product::Column::Active.eq(true));
        if let Some(category) = &query.category {
            find = find.filter(product::Column::Category.eq(category.clone()));
        }

        let paginator = find
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Fetches a single product by its storefront slug, active or not; the
    /// caller decides whether an inactive product is presentable.
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found.".to_string()))
    }
}
