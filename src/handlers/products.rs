use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::product;
use crate::errors::ServiceError;
use crate::handlers::common::{success_response, PaginatedResponse};
use crate::services::catalog::ProductSearchQuery;
use crate::AppState;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:slug", get(get_product))
}

#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            slug: model.slug,
            name: model.name,
            category: model.category,
            description: model.description,
            price: model.price,
            original_price: model.original_price,
            image_url: model.image_url,
            active: model.active,
            featured: model.featured,
            created_at: model.created_at,
        }
    }
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let query = ProductSearchQuery {
        category: params.category,
        page: params.page,
        per_page: params.per_page,
    };
    let (products, total) = state.services.catalog.list_active(&query).await?;
    let data: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data,
        params.page,
        params.per_page,
        total,
    )))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_by_slug(&slug).await?;
    Ok(success_response(ProductResponse::from(product)))
}
