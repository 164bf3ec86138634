use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON body returned for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request").
    pub error: String,
    /// Human-readable error description shown to the shopper.
    pub message: String,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

/// Rejections raised while turning a submitted cart into an order. The
/// display strings are the exact messages the storefront shows; catalog
/// failures do not say which item failed, except for deactivated products,
/// which are named.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("A valid email address is required.")]
    InvalidEmail,

    #[error("Your cart is empty.")]
    EmptyCart,

    /// The batch catalog read returned fewer products than the cart named.
    #[error("Some products could not be found. Please refresh your cart.")]
    ProductsMissing,

    /// Per-line re-check after the batch read.
    #[error("Some products could not be found. Please refresh your cart.")]
    ProductMissing(i64),

    #[error("\"{0}\" is no longer available.")]
    ProductInactive(String),

    #[error("Product prices have changed. Please refresh your cart.")]
    PriceMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The hosted-payment API call failed. The provider's message is passed
    /// through to the response, matching the storefront's behaviour.
    #[error("{0}")]
    PaymentProvider(String),

    #[error("Unknown order status: {0}")]
    InvalidStatus(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Checkout(_) | Self::InvalidStatus(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message carried in the response body. Storage failures collapse to a
    /// generic message; everything else is shopper-facing as-is.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
