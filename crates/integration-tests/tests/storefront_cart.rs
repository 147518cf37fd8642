//! Integration tests for the cart page: quantities, fragments and headers.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use tillpoint_integration_tests::{PAY_ORIGIN, TestApp};

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn().await;
    assert_eq!(app.get_text("/health").await, "ok");
}

#[tokio::test]
async fn test_empty_cart_disables_checkout() {
    let app = TestApp::spawn().await;

    let body = app.get_text("/cart").await;

    assert!(body.contains("Your cart is empty."));
    assert!(body.contains("class=\"checkout-button\" disabled"));
}

#[tokio::test]
async fn test_add_then_change_quantities() {
    let app = TestApp::spawn().await;
    app.add_to_cart("tee", 2).await;

    let body = app.get_text("/cart").await;
    assert!(body.contains("Tee"));
    assert!(body.contains("$39.98"));

    let resp = app.post_form("/cart/increment", &[("product_id", "tee")]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<html"), "plain posts get the full page");
    assert!(body.contains("$59.97"));
}

#[tokio::test]
async fn test_decrement_to_zero_removes_line() {
    let app = TestApp::spawn().await;
    app.add_to_cart("mug", 1).await;

    let resp = app.post_htmx("/cart/decrement", &[("product_id", "mug")]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();

    assert!(!body.contains("<html"), "HTMX gets the panel fragment");
    assert!(body.contains("id=\"cart-panel\""));
    assert!(body.contains("Your cart is empty."));
}

#[tokio::test]
async fn test_htmx_add_returns_count_and_trigger() {
    let app = TestApp::spawn().await;

    let resp = app
        .post_htmx("/cart/add", &[("product_id", "tee"), ("quantity", "3")])
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("hx-trigger").unwrap(), "cart-updated");
    assert!(resp.text().await.unwrap().contains(">3</span>"));
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app.post_form("/cart/add", &[("product_id", "hat")]).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_carts_are_per_visitor() {
    let app = TestApp::spawn().await;
    app.add_to_cart("tee", 1).await;

    let stranger = TestApp::client();
    let body = stranger
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("Your cart is empty."));
}

#[tokio::test]
async fn test_security_headers_allow_checkout_origin() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/cart")).send().await.unwrap();
    let csp = resp
        .headers()
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap();

    assert!(csp.contains(&format!("form-action 'self' {PAY_ORIGIN}")));
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_product_page_shows_price() {
    let app = TestApp::spawn().await;

    let body = app.get_text("/products/tee").await;

    assert!(body.contains("Tee"));
    assert!(body.contains("$19.99"));
}

#[tokio::test]
async fn test_pages_load_enhancement_script() {
    let app = TestApp::spawn().await;

    assert!(app.get_text("/cart").await.contains(r#"<script src="/static/js/cart.js" defer></script>"#));

    let resp = app.client.get(app.url("/static/js/cart.js")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("HX-Request"));
}
