#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bloom_api::config::{AppConfig, ShippingConfig, StripeConfig};
use bloom_api::entities::product;
use bloom_api::events::EventSender;
use bloom_api::handlers::AppServices;
use bloom_api::migrator::Migrator;
use bloom_api::payments::StripeClient;
use bloom_api::{app, AppState};

/// A fully wired application over an in-memory SQLite database and a mock
/// payment API.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<DatabaseConnection>,
    pub payment_server: MockServer,
}

impl TestApp {
    /// Boots the app with the payment API answering every session-creation
    /// request with a fixed session.
    pub async fn spawn() -> Self {
        let payment_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_123",
                "url": "https://checkout.example.test/pay/cs_test_123"
            })))
            .mount(&payment_server)
            .await;

        Self::spawn_with_payment_server(payment_server).await
    }

    /// Boots the app with the payment API failing every request, for
    /// exercising the external-dependency error path.
    pub async fn spawn_with_failing_payments() -> Self {
        let payment_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "The payment network is unavailable." }
            })))
            .mount(&payment_server)
            .await;

        Self::spawn_with_payment_server(payment_server).await
    }

    async fn spawn_with_payment_server(payment_server: MockServer) -> Self {
        // A single connection so every statement sees the same in-memory
        // database.
        let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&db, None).await.expect("run migrations");
        let db = Arc::new(db);

        let config = test_config(payment_server.uri());

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(bloom_api::events::process_events(event_rx));

        let stripe =
            Arc::new(StripeClient::new(config.stripe.clone()).expect("build payment client"));
        let services = AppServices::new(
            db.clone(),
            event_sender,
            stripe,
            config.shipping.clone(),
        );

        let state = Arc::new(AppState {
            db: db.clone(),
            config,
            services,
        });

        Self {
            router: app(state),
            db,
            payment_server,
        }
    }

    /// Inserts a catalog product and returns the stored row.
    pub async fn seed_product(
        &self,
        slug: &str,
        name: &str,
        price: Decimal,
        active: bool,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            slug: Set(slug.to_string()),
            name: Set(name.to_string()),
            category: Set("wellness".to_string()),
            description: Set(format!("{} description", name)),
            price: Set(price),
            original_price: Set(None),
            image_url: Set(Some(format!("https://cdn.example.test/{}.jpg", slug))),
            active: Set(active),
            featured: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("insert product")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router response")
    }
}

fn test_config(payment_api_base: String) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 8080,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_acquire_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        stripe: StripeConfig {
            secret_key: "sk_test_key".to_string(),
            api_base: payment_api_base,
            success_url: "https://shop.test/checkout/success".to_string(),
            cancel_url: "https://shop.test/checkout/cancel".to_string(),
            allowed_countries: vec!["US".to_string(), "CA".to_string()],
            currency: "usd".to_string(),
        },
        shipping: ShippingConfig::default(),
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Parses a decimal field that serializes as a JSON string.
pub fn decimal_field(value: &Value, key: &str) -> Decimal {
    value[key]
        .as_str()
        .unwrap_or_else(|| panic!("field {} missing or not a string: {}", key, value))
        .parse()
        .expect("decimal field")
}
