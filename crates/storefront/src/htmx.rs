//! HTMX request and response helpers.

use askama::Template;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};

use crate::models::Toast;

/// Event name fired after any cart mutation.
pub const CART_UPDATED: &str = "cart-updated";

/// Whether the request was issued by HTMX (`HX-Request: true`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HxRequest(pub bool);

impl HxRequest {
    /// Read the flag from request parts.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self(
            parts
                .headers
                .get("hx-request")
                .is_some_and(|v| v.as_bytes() == b"true"),
        )
    }
}

impl<S> FromRequestParts<S> for HxRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Navigate to `to`.
///
/// HTMX follows `HX-Redirect` with a full page load; plain form posts get a
/// `303 See Other`.
#[must_use]
pub fn redirect(htmx: bool, to: &str) -> Response {
    if htmx {
        match HeaderValue::from_str(to) {
            Ok(value) => {
                let mut response = StatusCode::OK.into_response();
                response.headers_mut().insert("hx-redirect", value);
                response
            }
            Err(_) => Redirect::to("/").into_response(),
        }
    } else {
        Redirect::to(to).into_response()
    }
}

/// Attach `HX-Trigger: cart-updated` to a response.
pub fn cart_updated(response: impl IntoResponse) -> Response {
    (AppendHeaders([("HX-Trigger", CART_UPDATED)]), response).into_response()
}

/// Toast fragment swapped into the page's toast stack out of band.
#[derive(Template)]
#[template(path = "partials/toast_oob.html")]
pub struct ToastOob<'a> {
    pub toasts: &'a [Toast],
}

/// Render `fragment` followed by out-of-band toasts.
pub fn with_toasts(fragment: impl Template, toasts: &[Toast]) -> Response {
    let mut body = match fragment.render() {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render fragment");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !toasts.is_empty() {
        match (ToastOob { toasts }).render() {
            Ok(html) => body.push_str(&html),
            Err(e) => tracing::error!(error = %e, "Failed to render toasts"),
        }
    }
    Html(body).into_response()
}

/// Only out-of-band toasts, for requests that swap nothing else.
#[must_use]
pub fn toasts_only(toasts: &[Toast]) -> Response {
    match (ToastOob { toasts }).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render toasts");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_modes() {
        let hx = redirect(true, "/login");
        assert_eq!(hx.status(), StatusCode::OK);
        assert_eq!(hx.headers().get("hx-redirect").unwrap(), "/login");

        let plain = redirect(false, "/login");
        assert_eq!(plain.status(), StatusCode::SEE_OTHER);
        assert_eq!(plain.headers().get("location").unwrap(), "/login");
    }

    #[test]
    fn test_cart_updated_header() {
        let response = cart_updated("ok");
        assert_eq!(response.headers().get("hx-trigger").unwrap(), CART_UPDATED);
    }

    #[test]
    fn test_toasts_render_out_of_band() {
        let response = toasts_only(&[Toast::error("Out of stock")]);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
