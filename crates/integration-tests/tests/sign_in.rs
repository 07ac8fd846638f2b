//! Sign-in entry point.
//!
//! The provider lives on another origin and the CSP only allows forms to
//! submit to this one, so sign-in must start from a link, not a form post.

#![allow(clippy::unwrap_used)]

use thriftshop_integration_tests::{TestContext, location};

#[tokio::test]
async fn test_login_page_links_to_provider_redirect() {
    let ctx = TestContext::start().await;

    let response = ctx.get("/login").await;
    let csp = response
        .headers()
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(csp.contains("form-action 'self'"), "csp: {csp}");

    let page = response.text().await.unwrap();
    assert!(page.contains("href=\"/auth/login\""), "login link missing: {page}");
    assert!(!page.contains("action=\"/auth/login\""));

    let response = ctx.get("/auth/login").await;
    let authorize = location(&response);
    assert!(authorize.starts_with(&format!("{}/auth/v1/authorize", ctx.upstream_url)));
}

#[tokio::test]
async fn test_login_start_rejects_form_post() {
    let ctx = TestContext::start().await;
    let response = ctx.post_form("/auth/login", &[]).await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn test_sign_in_shows_account_in_nav() {
    let ctx = TestContext::start().await;
    ctx.sign_in().await;

    let home = ctx.text("/").await;
    assert!(home.contains("Sari"), "display name missing: {home}");
    assert!(home.contains("action=\"/auth/logout\""));
}
