//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Request ID (settle `x-request-id` before the request span exists)
//! 2. Sentry layers (hub per request, capture errors)
//! 3. `TraceLayer` (request span carrying the request id)
//! 4. CSP nonce (generate per-request nonce for inline scripts)
//! 5. Security headers (CSP, frame and isolation headers)
//! 6. Session layer (tower-sessions with in-memory store)
//! 7. Rate limiting (governor, on sign-in and checkout routes only)

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, clear_auth_session, current_auth, set_auth_session,
};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{auth_rate_limiter, checkout_rate_limiter};
pub use request_id::{request_id_middleware, request_span};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
