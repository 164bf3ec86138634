use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::entities::order::OrderStatus;
use crate::entities::prelude::{Order, OrderItem};
use crate::entities::{order, order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub email: String,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub billing_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            checkout_session_id: model.checkout_session_id,
            payment_intent_id: model.payment_intent_id,
            email: model.email,
            status: model.status,
            subtotal: model.subtotal,
            shipping: model.shipping,
            total: model.total,
            billing_name: model.billing_name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// An order line joined to its product for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_id: i64,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderLineResponse>,
}

/// Order reads for the confirmation page and the back office, plus the
/// status update the back office drives fulfilment with.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<OrderWithItems, ServiceError> {
        let model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found.".to_string()))?;
        self.with_items(model).await
    }

    /// Looks an order up by the hosted-payment session id round-tripped
    /// through the success redirect.
    #[instrument(skip(self))]
    pub async fn find_by_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let model = Order::find()
            .filter(order::Column::CheckoutSessionId.eq(session_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Could not load order.".to_string()))?;
        self.with_items(model).await
    }

    /// Newest-first page of orders for the back office.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderResponse>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(OrderResponse::from)
            .collect();
        Ok((orders, total))
    }

    /// Sets an order's status. Any of the six states may be set from any
    /// other state; there is no transition validation.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found.".to_string()))?;
        let old_status = model.status;

        let mut active: order::ActiveModel = model.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;
        info!(order_id, %old_status, %new_status, "order status updated");
        Ok(OrderResponse::from(updated))
    }

    async fn with_items(&self, model: order::Model) -> Result<OrderWithItems, ServiceError> {
        let items = self.load_items(model.id).await?;
        Ok(OrderWithItems {
            order: OrderResponse::from(model),
            items,
        })
    }

    async fn load_items(&self, order_id: i64) -> Result<Vec<OrderLineResponse>, ServiceError> {
        let rows = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(crate::entities::prelude::Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(item, product)| line_response(item, product))
            .collect())
    }
}

fn line_response(
    item: order_item::Model,
    product: Option<product::Model>,
) -> OrderLineResponse {
    let (name, image_url) = product
        .map(|p| (p.name, p.image_url))
        .unwrap_or_default();
    OrderLineResponse {
        product_id: item.product_id,
        name,
        quantity: item.quantity,
        price: item.price,
        image_url,
    }
}
