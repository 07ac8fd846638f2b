//! What each payment widget callback does to the cart.
//!
//! Every test orders the jacket out of a cart holding the jacket twice and
//! the shirt once, then reports one widget outcome.

#![allow(clippy::unwrap_used)]

use thriftshop_integration_tests::{
    PRODUCT_A, PRODUCT_A_NAME, PRODUCT_B_NAME, TestContext, location,
};

#[tokio::test]
async fn test_pending_clears_whole_cart() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    ctx.place_order(&[PRODUCT_A]).await;

    let response = ctx.post_form("/checkout/payment/pending", &[]).await;
    assert_eq!(location(&response), "/profile");

    let cart = ctx.text("/cart").await;
    assert!(!cart.contains(PRODUCT_A_NAME));
    assert!(!cart.contains(PRODUCT_B_NAME));
    assert!(cart.contains("Order saved."));
    assert!(ctx.text("/cart/count").await.contains("\"></span>"));
}

#[tokio::test]
async fn test_error_keeps_cart_and_returns_to_it() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    ctx.place_order(&[PRODUCT_A]).await;

    let response = ctx
        .post_form("/checkout/payment/error", &[("status_message", "Card declined")])
        .await;
    assert_eq!(location(&response), "/cart");

    let cart = ctx.text("/cart").await;
    assert!(cart.contains(PRODUCT_A_NAME));
    assert!(cart.contains(PRODUCT_B_NAME));
    assert!(cart.contains("Card declined"));
    assert!(ctx.text("/cart/count").await.contains(">3</span>"));
}

#[tokio::test]
async fn test_close_keeps_cart() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    ctx.place_order(&[PRODUCT_A]).await;

    let response = ctx.post_form("/checkout/payment/close", &[]).await;
    assert_eq!(location(&response), "/profile");

    let cart = ctx.text("/cart").await;
    assert!(cart.contains(PRODUCT_A_NAME));
    assert!(cart.contains(PRODUCT_B_NAME));
    assert!(cart.contains("You closed the payment window."));
    assert!(ctx.text("/cart/count").await.contains(">3</span>"));
}

#[tokio::test]
async fn test_callback_not_throttled_after_submit_burst() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;

    // Refused submits still count against the checkout limit.
    for _ in 0..8 {
        let response = ctx.submit_checkout(&[PRODUCT_A], "   ").await;
        assert_eq!(location(&response), "/cart");
    }
    ctx.place_order(&[PRODUCT_A]).await;

    assert_eq!(ctx.get("/checkout/pay").await.status(), 200);
    let response = ctx.post_form("/checkout/payment/success", &[]).await;
    assert_eq!(location(&response), "/profile");

    let cart = ctx.text("/cart").await;
    assert!(!cart.contains(PRODUCT_A_NAME));
    assert!(cart.contains(PRODUCT_B_NAME));
}
