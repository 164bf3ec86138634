use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration, layered from `config/default.toml`, an
/// environment-specific file, and `APP__`-prefixed environment variables
/// (e.g. `APP__STRIPE__SECRET_KEY`).
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (Postgres in production, SQLite elsewhere).
    pub database_url: String,

    /// Server host address.
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment ("development", "production", ...).
    pub environment: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins. Absent means
    /// permissive, which is the storefront development default.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool settings.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Hosted-payment provider settings.
    pub stripe: StripeConfig,

    /// Shipping fee tiering.
    #[serde(default)]
    pub shipping: ShippingConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StripeConfig {
    /// API secret key. Must be provided via config file or
    /// `APP__STRIPE__SECRET_KEY`; there is no default.
    pub secret_key: String,

    /// Base URL of the payment API. Overridden in tests.
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,

    /// Storefront page the provider redirects to after payment. The session
    /// id placeholder is appended as a query parameter so the confirmation
    /// page can look the order up.
    pub success_url: String,

    /// Storefront page the provider redirects to when the shopper backs out.
    pub cancel_url: String,

    /// ISO 3166-1 alpha-2 codes the provider may collect shipping
    /// addresses for.
    #[serde(default = "default_allowed_countries")]
    pub allowed_countries: Vec<String>,

    /// Lowercase ISO 4217 currency code for line items and shipping.
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShippingConfig {
    /// Flat fee charged below the free-shipping threshold.
    #[serde(default = "default_shipping_flat_fee")]
    pub flat_fee: Decimal,

    /// Order subtotal at or above which shipping is free.
    #[serde(default = "default_free_shipping_threshold")]
    pub free_threshold: Decimal,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            flat_fee: default_shipping_flat_fee(),
            free_threshold: default_free_shipping_threshold(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_allowed_countries() -> Vec<String> {
    vec!["US".to_string(), "CA".to_string(), "GB".to_string()]
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_shipping_flat_fee() -> Decimal {
    Decimal::new(1000, 2) // 10.00
}

fn default_free_shipping_threshold() -> Decimal {
    Decimal::new(5000, 2) // 50.00
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Loads and validates the application configuration.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://bloom.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("stripe.api_base", default_stripe_api_base())?
        .set_default("stripe.success_url", "http://localhost:3000/checkout/success")?
        .set_default("stripe.cancel_url", "http://localhost:3000/checkout/cancel")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // The payment secret has no default on purpose; fail with a clear
    // message instead of a deserialization error.
    if config.get_string("stripe.secret_key").is_err() {
        error!("Payment API key is not configured. Set APP__STRIPE__SECRET_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "stripe.secret_key is required but not configured. Set APP__STRIPE__SECRET_KEY."
                .into(),
        )));
    }

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate()
        .map_err(|e| AppConfigError::Validation(e.to_string()))?;
    Ok(cfg)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("bloom_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .json()
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn shipping_defaults_match_storefront_tiering() {
        let shipping = ShippingConfig::default();
        assert_eq!(shipping.flat_fee, dec!(10.00));
        assert_eq!(shipping.free_threshold, dec!(50.00));
    }

    #[test]
    fn default_countries_are_alpha2() {
        for code in default_allowed_countries() {
            assert_eq!(code.len(), 2);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }
}
