//! End-to-end checkout of a partial cart selection.
//!
//! Cart holds the jacket twice and the shirt once; only the jacket is
//! checked out. The order, the quote and the cart afterwards must all cover
//! exactly the checked item.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;

use thriftshop_integration_tests::{
    CITY_ID, PRODUCT_A, PRODUCT_A_NAME, PRODUCT_B, PRODUCT_B_NAME, PROVINCE_ID, SNAP_TOKEN,
    TestContext, location,
};

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::start().await;
    let response = ctx.get("/health").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_catalog_lists_products() {
    let ctx = TestContext::start().await;
    let body = ctx.get("/").await.text().await.unwrap();
    assert!(body.contains(PRODUCT_A_NAME));
    assert!(body.contains(PRODUCT_B_NAME));
    assert!(body.contains("Rp 10.000"));

    let detail = ctx.get(&format!("/products/{PRODUCT_B}")).await;
    assert_eq!(detail.status(), 200);
    let body = detail.text().await.unwrap();
    assert!(body.contains("No description available"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::start().await;
    assert_eq!(ctx.get("/products/nope").await.status(), 404);
}

#[tokio::test]
async fn test_add_to_cart_requires_sign_in() {
    let ctx = TestContext::start().await;
    let response = ctx.post_form(&format!("/cart/add/{PRODUCT_A}"), &[]).await;
    assert_eq!(location(&response), "/login");

    let count = ctx.get("/cart/count").await.text().await.unwrap();
    assert!(count.contains("\"></span>"), "badge should be empty: {count}");
}

#[tokio::test]
async fn test_partial_checkout_keeps_unchecked_items() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;

    for id in [PRODUCT_A, PRODUCT_A, PRODUCT_B] {
        let response = ctx.post_form(&format!("/cart/add/{id}"), &[]).await;
        assert_eq!(location(&response), format!("/products/{id}"));
    }
    assert!(ctx.get("/cart/count").await.text().await.unwrap().contains(">3</span>"));

    let cart = ctx.get("/cart").await.text().await.unwrap();
    assert!(cart.contains(PRODUCT_A_NAME));
    assert!(cart.contains(PRODUCT_B_NAME));
    assert!(cart.contains("DKI Jakarta"));

    // Only the jacket is checked: 2 x 10000 plus 9000 freight.
    let panel = ctx.choose_destination(&[PRODUCT_A]).await;
    assert!(panel.contains("Rp 20.000"), "subtotal missing: {panel}");
    assert!(panel.contains("Rp 29.000"), "total missing: {panel}");

    let quote = ctx.recorded.quotes().pop().unwrap();
    let quoted = quote["items"].as_array().unwrap();
    assert_eq!(quoted.len(), 1);
    assert_eq!(quoted[0]["id"], PRODUCT_A);
    assert_eq!(quoted[0]["quantity"], 2);

    let response = ctx
        .post_form(
            "/checkout",
            &[
                ("selected", PRODUCT_A),
                ("province", "11"),
                ("city", "152"),
                ("district", "2096"),
                ("courier", "jne"),
                ("address", "Jl. Melawai 10"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/checkout/pay");

    let orders = ctx.recorded.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(
        orders[0],
        json!({
            "items": [{ "id": PRODUCT_A, "quantity": 2, "price": 10000 }],
            "totalPrice": 29000,
            "destination_id": 2096,
            "courier": "jne",
            "shipping_address": "Jl. Melawai 10, Kec. Kebayoran Baru, Jakarta Selatan, Prov. DKI Jakarta"
        })
    );

    let pay = ctx.get("/checkout/pay").await;
    assert_eq!(pay.status(), 200);
    assert!(pay.text().await.unwrap().contains(SNAP_TOKEN));

    let response = ctx
        .post_form(
            "/checkout/payment/success",
            &[("status_message", "Success, transaction is found")],
        )
        .await;
    assert_eq!(location(&response), "/profile");

    let cart = ctx.get("/cart").await.text().await.unwrap();
    assert!(cart.contains(PRODUCT_B_NAME));
    assert!(!cart.contains(PRODUCT_A_NAME));
    assert!(cart.contains("Payment successful!"));
    assert!(ctx.get("/cart/count").await.text().await.unwrap().contains(">1</span>"));
}

#[tokio::test]
async fn test_checkout_without_address_sends_nothing() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    ctx.post_form(&format!("/cart/add/{PRODUCT_A}"), &[]).await;
    ctx.get("/cart").await;
    ctx.choose_destination(&[PRODUCT_A]).await;

    let response = ctx
        .post_form(
            "/checkout",
            &[
                ("selected", PRODUCT_A),
                ("district", "2096"),
                ("courier", "jne"),
                ("address", "   "),
            ],
        )
        .await;
    assert_eq!(location(&response), "/cart");
    assert!(ctx.recorded.orders().is_empty());

    let cart = ctx.get("/cart").await.text().await.unwrap();
    assert!(cart.contains(PRODUCT_A_NAME));
}

#[tokio::test]
async fn test_payment_page_without_pending_payment_redirects() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    let response = ctx.get("/checkout/pay").await;
    assert_eq!(location(&response), "/profile");
}

#[tokio::test]
async fn test_reselecting_province_resets_destination_and_cost() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;
    ctx.post_form(&format!("/cart/add/{PRODUCT_A}"), &[]).await;
    ctx.get("/cart").await;

    let panel = ctx.choose_destination(&[PRODUCT_A]).await;
    assert!(panel.contains("Rp 19.000"), "total missing: {panel}");

    let panel = ctx
        .post_form(
            "/cart/shipping/province",
            &[
                ("province", PROVINCE_ID),
                ("city", CITY_ID),
                ("district", "2096"),
                ("courier", "jne"),
                ("selected", PRODUCT_A),
            ],
        )
        .await
        .text()
        .await
        .unwrap();

    assert!(panel.contains("Jakarta Selatan"), "cities reloaded: {panel}");
    assert!(!panel.contains(&format!("value=\"{CITY_ID}\" selected")));
    assert!(!panel.contains("Kebayoran Baru"));
    assert!(!panel.contains("Rp 9.000"));
    assert!(!panel.contains("Rp 19.000"));
    assert!(panel.contains("Rp 0"));

    // The stale district in the form must not be used for an order.
    let quotes = ctx.recorded.quotes().len();
    let response = ctx
        .post_form(
            "/checkout",
            &[("selected", PRODUCT_A), ("courier", "jne"), ("address", "Jl. Melawai 10")],
        )
        .await;
    assert_eq!(location(&response), "/cart");
    assert!(ctx.recorded.orders().is_empty());
    assert_eq!(ctx.recorded.quotes().len(), quotes);
}
