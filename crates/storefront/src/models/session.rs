//! Session-related types.
//!
//! Everything the storefront remembers about a visitor lives in their
//! `tower_sessions` session under one of these keys.

use tower_sessions::Session;

/// Session keys.
pub mod keys {
    /// Key for the cart item list.
    pub const CART: &str = "cart";

    /// Key for the shipping selection (province, city, district, courier, cost).
    pub const SHIPPING: &str = "shipping";

    /// Key for the signed-in state (`AuthSession`).
    pub const AUTH: &str = "auth";

    /// Key for OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the PKCE code verifier of the pending sign-in.
    pub const OAUTH_VERIFIER: &str = "oauth_verifier";

    /// Key for the payment the widget page should open.
    pub const PENDING_PAYMENT: &str = "pending_payment";

    /// Key for one-shot notices.
    pub const TOASTS: &str = "toasts";

    /// Key for the visitor's cart event channel.
    pub const VISITOR: &str = "visitor";
}

/// Stable key identifying this visitor's cart events.
///
/// Generated on first use; the session id itself is not assigned until the
/// session is first saved, so it cannot serve as the key.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn visitor_key(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(key) = session.get::<String>(keys::VISITOR).await? {
        return Ok(key);
    }
    let key = uuid::Uuid::new_v4().to_string();
    session.insert(keys::VISITOR, &key).await?;
    Ok(key)
}
