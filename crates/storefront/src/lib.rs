//! 56 Thrift Shop storefront library.
//!
//! The storefront renders the catalog, cart, checkout and admin panel on
//! top of the shop's REST backend. Exposed as a library so the binary and
//! the integration tests build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod filters;
pub mod htmx;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shipping;
pub mod state;

use axum::{
    Router,
    body::Body,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    create_session_layer, csp_nonce_middleware, request_id_middleware, request_span,
    security_headers_middleware,
};
use crate::state::AppState;

/// Directory served under `/static`.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Build the full application router with its middleware stack.
///
/// See [`middleware`] for the layer order.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(from_fn(request_id_middleware))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}
