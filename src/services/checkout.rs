use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::ShippingConfig;
use crate::entities::order::OrderStatus;
use crate::entities::prelude::Product;
use crate::entities::{order, order_item, product};
use crate::errors::{CheckoutError, ServiceError};
use crate::events::{Event, EventSender};
use crate::payments::{HostedSession, SessionLineItem, StripeClient};

/// Largest stored-vs-submitted price difference treated as rounding noise
/// rather than genuine price drift.
pub const PRICE_TOLERANCE: Decimal = dec!(0.01);

/// One line of the client-held cart as submitted at checkout. Name and
/// price are display values; the catalog is re-read before anything is
/// charged or persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[serde(default)]
    pub items: Vec<CartLineInput>,
    #[serde(default)]
    pub email: String,
}

/// A cart line after catalog re-validation: the authoritative product row
/// plus the submitted quantity.
#[derive(Debug, Clone)]
pub struct ValidatedLine {
    pub product: product::Model,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Result of a successful checkout: the persisted order and where to send
/// the shopper.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order_id: i64,
    pub session_id: String,
    pub url: String,
}

/// Derives order totals from re-validated lines. Client-computed totals are
/// never consulted; every view that displays totals goes through this same
/// function.
pub fn compute_totals(lines: &[ValidatedLine], shipping: &ShippingConfig) -> OrderTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| line.product.price * Decimal::from(line.quantity))
        .sum();
    let shipping_fee = if subtotal >= shipping.free_threshold {
        Decimal::ZERO
    } else {
        shipping.flat_fee
    };
    OrderTotals {
        subtotal,
        shipping: shipping_fee,
        total: subtotal + shipping_fee,
    }
}

/// Converts a submitted cart into a pending order with a hosted payment
/// session: intake validation, catalog re-validation, total computation,
/// session creation, then the order write.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    stripe: Arc<StripeClient>,
    shipping: ShippingConfig,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        stripe: Arc<StripeClient>,
        shipping: ShippingConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            stripe,
            shipping,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(item_count = input.items.len()))]
    pub async fn checkout(&self, input: CheckoutInput) -> Result<CheckoutOutcome, ServiceError> {
        // Intake: a loose presence check, not RFC validation. Quantities are
        // trusted as submitted.
        if input.email.trim().is_empty() || !input.email.contains('@') {
            return Err(CheckoutError::InvalidEmail.into());
        }
        if input.items.is_empty() {
            return Err(CheckoutError::EmptyCart.into());
        }

        let lines = self.revalidate_cart(&input.items).await?;
        let totals = compute_totals(&lines, &self.shipping);

        // The session is created before the local order; a write failure
        // below strands the external session. Known gap, see DESIGN.md.
        let session = self
            .create_payment_session(&input.email, &lines, &totals)
            .await?;

        let order = self
            .persist_pending_order(&input.email, &lines, &totals, &session)
            .await?;

        self.event_sender
            .send(Event::CheckoutCompleted {
                order_id: order.id,
                checkout_session_id: session.id.clone(),
            })
            .await;
        self.event_sender.send(Event::OrderCreated(order.id)).await;

        info!(
            order_id = order.id,
            total = %totals.total,
            "checkout completed, redirecting to hosted payment page"
        );
        Ok(CheckoutOutcome {
            order_id: order.id,
            session_id: session.id,
            url: session.url,
        })
    }

    /// Re-reads every referenced product in one batch and confirms each cart
    /// line still names an existing, sellable product at the submitted
    /// price. Any single failure aborts the whole checkout.
    async fn revalidate_cart(
        &self,
        items: &[CartLineInput],
    ) -> Result<Vec<ValidatedLine>, ServiceError> {
        let mut ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        ids.sort_unstable();
        ids.dedup();

        let products = Product::find()
            .filter(product::Column::Id.is_in(ids.clone()))
            .all(&*self.db)
            .await?;
        if products.len() != ids.len() {
            return Err(CheckoutError::ProductsMissing.into());
        }
        let by_id: HashMap<i64, product::Model> =
            products.into_iter().map(|p| (p.id, p)).collect();

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = by_id
                .get(&item.id)
                .ok_or(CheckoutError::ProductMissing(item.id))?;
            if !product.active {
                return Err(CheckoutError::ProductInactive(product.name.clone()).into());
            }
            if (product.price - item.price).abs() > PRICE_TOLERANCE {
                return Err(CheckoutError::PriceMismatch.into());
            }
            lines.push(ValidatedLine {
                product: product.clone(),
                quantity: item.quantity,
            });
        }
        Ok(lines)
    }

    async fn create_payment_session(
        &self,
        email: &str,
        lines: &[ValidatedLine],
        totals: &OrderTotals,
    ) -> Result<HostedSession, ServiceError> {
        let mut line_items = Vec::with_capacity(lines.len());
        for line in lines {
            line_items.push(SessionLineItem {
                name: line.product.name.clone(),
                unit_amount: StripeClient::to_minor_units(line.product.price)?,
                quantity: line.quantity,
                image_url: line.product.image_url.clone(),
            });
        }
        let shipping_amount = StripeClient::to_minor_units(totals.shipping)?;

        self.stripe
            .create_checkout_session(email, &line_items, shipping_amount)
            .await
    }

    /// Writes the order and its lines in one transaction; a pending order
    /// with no items (or the reverse) must never be observable.
    async fn persist_pending_order(
        &self,
        email: &str,
        lines: &[ValidatedLine],
        totals: &OrderTotals,
        session: &HostedSession,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let created = order::ActiveModel {
            checkout_session_id: Set(session.id.clone()),
            email: Set(email.to_string()),
            status: Set(OrderStatus::Pending),
            subtotal: Set(totals.subtotal),
            shipping: Set(totals.shipping),
            total: Set(totals.total),
            shipping_address: Set(serde_json::json!({})),
            billing_name: Set(String::new()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for line in lines {
            order_item::ActiveModel {
                order_id: Set(created.id),
                product_id: Set(line.product.id),
                quantity: Set(line.quantity),
                price: Set(line.product.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(created)
    }
}
