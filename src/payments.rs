use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::config::StripeConfig;
use crate::errors::ServiceError;

/// Literal placeholder the payment provider substitutes with the session id
/// when redirecting back to the storefront.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// One line of the hosted-checkout session, in minor currency units.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: i32,
    pub image_url: Option<String>,
}

/// The provider's session handle: an opaque id plus the URL the shopper is
/// redirected to.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// Client for the hosted-checkout payment API. The base URL is
/// configurable so tests can point it at a local mock server.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to construct HTTP client for the payment API")?;
        Ok(Self { http, config })
    }

    /// Converts a major-unit decimal amount to minor units (cents),
    /// rounding half-up on the multiplied value.
    pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| {
                ServiceError::PaymentProvider(format!("amount {} is out of range", amount))
            })
    }

    /// Creates a hosted checkout session describing the order's line items,
    /// a fixed-amount shipping option, and the allowed destination
    /// countries. Returns the provider's session id and redirect URL.
    #[instrument(skip(self, line_items))]
    pub async fn create_checkout_session(
        &self,
        email: &str,
        line_items: &[SessionLineItem],
        shipping_amount: i64,
    ) -> Result<HostedSession, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("customer_email".into(), email.into()),
            (
                "success_url".into(),
                format!(
                    "{}?session_id={}",
                    self.config.success_url, SESSION_ID_PLACEHOLDER
                ),
            ),
            ("cancel_url".into(), self.config.cancel_url.clone()),
        ];

        for (i, country) in self.config.allowed_countries.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{}]", i),
                country.clone(),
            ));
        }

        for (i, item) in line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                self.config.currency.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            if let Some(image) = &item.image_url {
                form.push((
                    format!("line_items[{}][price_data][product_data][images][0]", i),
                    image.clone(),
                ));
            }
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        let display_name = if shipping_amount == 0 {
            "Free shipping"
        } else {
            "Standard shipping"
        };
        form.push((
            "shipping_options[0][shipping_rate_data][type]".into(),
            "fixed_amount".into(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][display_name]".into(),
            display_name.into(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][fixed_amount][amount]".into(),
            shipping_amount.to_string(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][fixed_amount][currency]".into(),
            self.config.currency.clone(),
        ));

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentProvider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "payment session creation failed");
            return Err(ServiceError::PaymentProvider(payment_error_message(
                status, &body,
            )));
        }

        response
            .json::<HostedSession>()
            .await
            .map_err(|e| ServiceError::PaymentProvider(e.to_string()))
    }
}

/// Pulls the human-readable message out of the provider's error envelope,
/// falling back to the HTTP status.
fn payment_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| format!("payment API returned {}", status))
}
