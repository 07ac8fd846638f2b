//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Product grid
//! GET  /products/{id}                  - Product detail
//!
//! # Cart (HTMX fragments)
//! GET  /cart                           - Cart page with checkout panel
//! POST /cart/add/{id}                  - Add one unit (signed in only)
//! POST /cart/items/{id}/quantity       - Change quantity by `delta`
//! POST /cart/items/{id}/remove         - Remove a line
//! POST /cart/summary                   - Recompute totals for the checked items
//! GET  /cart/count                     - Cart count badge (fragment)
//! GET  /cart/events                    - Cart change stream (SSE)
//!
//! # Shipping (HTMX fragments, return the checkout panel)
//! POST /cart/shipping/province         - Choose province, load cities
//! POST /cart/shipping/city             - Choose city, load districts
//! POST /cart/shipping/district         - Choose district, quote
//! POST /cart/shipping/courier          - Choose courier, quote
//!
//! # Checkout
//! POST /checkout                       - Submit the checked items (rate limited)
//! GET  /checkout/pay                   - Payment widget page
//! POST /checkout/payment/{outcome}     - Widget callback
//!
//! # Profile (requires auth)
//! GET  /profile                        - Order history
//! POST /profile/orders/{id}/pay        - Reopen payment for a pending order
//! POST /profile/orders/{id}/received   - Confirm receipt
//!
//! # Auth
//! GET  /login                          - Login page
//! GET  /auth/login                     - Redirect to the provider (rate limited)
//! GET  /auth/callback                  - Provider callback (rate limited)
//! POST /auth/logout                    - Sign out
//!
//! # Admin (requires admin role)
//! GET  /admin?tab=orders|products      - Dashboard
//! GET  /admin/products/new             - New product form
//! POST /admin/products                 - Create product (multipart)
//! POST /admin/orders/{id}/status       - Change order status
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod products;
pub mod profile;
pub mod shipping;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::request::Parts,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::cart::{CartStore, CartStorage};
use crate::error::AppError;
use crate::middleware::{
    CspNonce, auth_rate_limiter, checkout_rate_limiter, current_auth,
};
use crate::models::{Toast, visitor_key};
use crate::services::auth::AuthSession;
use crate::state::AppState;

/// Signed-in visitor as shown in the navbar.
#[derive(Debug, Clone)]
pub struct NavUser {
    pub name: String,
    pub is_admin: bool,
}

/// Everything the page layout needs.
///
/// Extracting it drains the queued toasts, so handlers that may redirect
/// instead of rendering should call [`PageContext::load`] only once they
/// know they will render.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub nonce: String,
    pub cart_count: u32,
    pub user: Option<NavUser>,
    pub toasts: Vec<Toast>,
    pub auth: Option<AuthSession>,
}

impl PageContext {
    /// Gather the layout data for one request.
    pub async fn load(session: &Session, state: &AppState, nonce: String) -> Self {
        let auth = current_auth(session, state).await;
        let cart_count = match CartStorage::load(session).await {
            Ok(items) => items.iter().map(|i| i.quantity).sum(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart for navbar");
                0
            }
        };
        let user = auth.as_ref().map(|a| NavUser {
            name: a.display_name().to_string(),
            is_admin: a.is_admin(),
        });

        Self {
            nonce,
            cart_count,
            user,
            toasts: Toast::drain(session).await,
            auth,
        }
    }

    /// Whether a visitor is signed in.
    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        Ok(Self::load(&session, state, nonce).await)
    }
}

/// Open the visitor's cart with change notifications attached.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn open_cart(session: &Session, state: &AppState) -> Result<CartStore<Session>, AppError> {
    let visitor = visitor_key(session).await?;
    let notifier = state.cart_events().notifier(visitor);
    Ok(CartStore::load(session.clone(), Some(notifier)).await?)
}

/// Create the cart and shipping routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{id}", post(cart::add))
        .route("/items/{id}/quantity", post(cart::change_quantity))
        .route("/items/{id}/remove", post(cart::remove))
        .route("/summary", post(cart::summary))
        .route("/count", get(cart::count))
        .route("/events", get(cart::events))
        .route("/shipping/province", post(shipping::province))
        .route("/shipping/city", post(shipping::city))
        .route("/shipping/district", post(shipping::district))
        .route("/shipping/courier", post(shipping::courier))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::submit))
        .layer(checkout_rate_limiter())
        .route("/pay", get(checkout::pay))
        .route("/payment/{outcome}", post(checkout::payment_outcome))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show))
        .route("/orders/{id}/pay", post(profile::pay))
        .route("/orders/{id}/received", post(profile::confirm_received))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard::show))
        .route("/products/new", get(admin::products::new_form))
        .route(
            "/products",
            post(admin::products::create)
                .layer(DefaultBodyLimit::max(admin::products::MAX_UPLOAD_BYTES)),
        )
        .route("/orders/{id}/status", post(admin::orders::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/products/{id}", get(products::show))
        .route("/login", get(auth::login_page))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/profile", profile_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
}
