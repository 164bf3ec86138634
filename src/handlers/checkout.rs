use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::services::checkout::{CheckoutInput, CheckoutOutcome};
use crate::AppState;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_checkout))
        .route("/session/:session_id", get(get_order_by_session))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    url: String,
    session_id: String,
    order_id: i64,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        Self {
            url: outcome.url,
            session_id: outcome.session_id,
            order_id: outcome.order_id,
        }
    }
}

/// Validate the submitted cart, open a hosted payment session, persist the
/// pending order, and hand the client the redirect URL.
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.checkout.checkout(payload).await?;
    Ok(created_response(CheckoutResponse::from(outcome)))
}

/// Confirmation-page lookup, keyed by the session id round-tripped through
/// the success redirect.
async fn get_order_by_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_checkout_session(&session_id)
        .await?;
    Ok(success_response(order))
}
