pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::ShippingConfig;
use crate::events::EventSender;
use crate::payments::StripeClient;
use crate::services::catalog::ProductCatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;

/// Aggregate of the services the HTTP handlers dispatch to.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        stripe: Arc<StripeClient>,
        shipping: ShippingConfig,
    ) -> Self {
        let catalog = Arc::new(ProductCatalogService::new(db.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            stripe,
            shipping,
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(db, event_sender));
        Self {
            catalog,
            checkout,
            orders,
        }
    }
}
