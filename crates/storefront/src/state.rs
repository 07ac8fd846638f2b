//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::cart::CartEvents;
use crate::config::StorefrontConfig;
use crate::services::auth::AuthClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the API clients, the cart event hub and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    auth: AuthClient,
    cart_events: CartEvents,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let backend = BackendClient::new(&config.backend);
        let auth = AuthClient::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                auth,
                cart_events: CartEvents::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the authentication provider client.
    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    /// Get a reference to the cart change hub.
    #[must_use]
    pub fn cart_events(&self) -> &CartEvents {
        &self.inner.cart_events
    }
}
