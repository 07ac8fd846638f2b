//! Content security policy with a per-request nonce.
//!
//! Inline scripts (the cart event listener, the payment widget callbacks)
//! carry `nonce="..."`; everything else must come from this origin or one
//! of the few third-party origins the pages need.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// CDN serving the HTMX script.
pub const HTMX_ORIGIN: &str = "https://unpkg.com";

/// Host of the product images.
pub const IMAGE_ORIGIN: &str = "https://res.cloudinary.com";

/// A CSP nonce value for inline scripts.
///
/// Each request gets a unique, cryptographically random nonce (128-bit, base64-encoded).
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Get the nonce value for use in templates.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Middleware that generates a CSP nonce and stores it in request extensions.
///
/// Must run before `security_headers_middleware` so the nonce is available
/// when building the CSP header.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!(
                "CSP nonce not found in request extensions - middleware may be misconfigured"
            );
            Self(String::new())
        }))
    }
}

/// Build the policy for one response.
///
/// `payment_origin` is the origin of the payment widget script; the widget
/// also opens its own frame and talks to its API on that origin.
#[must_use]
pub fn content_security_policy(nonce: Option<&str>, payment_origin: Option<&str>) -> String {
    let nonce_source = nonce
        .filter(|n| !n.is_empty())
        .map(|n| format!(" 'nonce-{n}'"))
        .unwrap_or_default();
    let payment = payment_origin
        .map(|origin| format!(" {origin}"))
        .unwrap_or_default();

    format!(
        "default-src 'none'; \
         script-src 'self'{nonce_source} {HTMX_ORIGIN}{payment}; \
         style-src 'self'{payment}; \
         font-src 'self'; \
         img-src 'self' data: {IMAGE_ORIGIN}{payment}; \
         connect-src 'self'{payment}; \
         frame-src{frame}; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'",
        frame = if payment.is_empty() {
            " 'none'".to_string()
        } else {
            payment.clone()
        },
    )
}
