//! Integration tests for the storefront catalog reads.

mod common;

use axum::http::Method;
use common::{decimal_field, response_json, TestApp};
use rust_decimal_macros::dec;

#[tokio::test]
async fn listing_excludes_deactivated_products() {
    let app = TestApp::spawn().await;
    app.seed_product("bloom-vibrator", "Bloom Vibrator", dec!(79.00), true)
        .await;
    app.seed_product("retired-wand", "Retired Wand", dec!(45.00), false)
        .await;

    let response = app.request(Method::GET, "/api/v1/products", None).await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["slug"], "bloom-vibrator");
}

#[tokio::test]
async fn listing_filters_by_category() {
    let app = TestApp::spawn().await;
    app.seed_product("bloom-vibrator", "Bloom Vibrator", dec!(79.00), true)
        .await;

    let response = app
        .request(Method::GET, "/api/v1/products?category=wellness", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);

    let response = app
        .request(Method::GET, "/api/v1/products?category=apparel", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn product_detail_by_slug() {
    let app = TestApp::spawn().await;
    app.seed_product("bloom-vibrator", "Bloom Vibrator", dec!(79.00), true)
        .await;

    let response = app
        .request(Method::GET, "/api/v1/products/bloom-vibrator", None)
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["name"], "Bloom Vibrator");
    assert_eq!(decimal_field(&body, "price"), dec!(79.00));
    assert_eq!(body["category"], "wellness");
}

#[tokio::test]
async fn unknown_slug_is_404() {
    let app = TestApp::spawn().await;

    let response = app
        .request(Method::GET, "/api/v1/products/does-not-exist", None)
        .await;
    assert_eq!(response.status(), 404);

    let body = response_json(response).await;
    assert_eq!(body["message"], "Product not found.");
}
