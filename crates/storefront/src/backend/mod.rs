//! Client for the shop's backend REST API.
//!
//! The backend owns pricing, inventory, orders, payment sessions and
//! shipping rates. This client only forwards requests and decodes the
//! responses; nothing is retried automatically.
//!
//! The product list and product details are cached with `moka` for one
//! minute. Creating a product drops the cached catalog. Shipping locations
//! and quotes are always fetched fresh.

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use thriftshop_core::{LocationId, OrderId, ProductId};

use crate::config::BackendConfig;

use cache::{CacheKey, CacheValue};
pub use types::*;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl BackendError {
    /// Message suitable for a visitor-facing notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Http(_) | Self::Parse(_) => {
                "The shop server could not be reached. Please try again.".to_string()
            }
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Uses the JSON `message` field when present, otherwise the raw text.
fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message
        && !message.trim().is_empty()
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the backend REST API.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.trim_end_matches('/').to_string(),
                cache,
            }),
        }
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(BackendError::Api {
                status,
                message: extract_message(status, &body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List every product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .send(self.request(Method::GET, "/products", None))
            .await?;

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the backend reports 404, or any other
    /// request failure.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, BackendError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("/products/{}", url_segment(id.as_str()));
        let product: Product = match self.send(self.request(Method::GET, &path, None)).await {
            Ok(product) => product,
            Err(BackendError::Api {
                status: StatusCode::NOT_FOUND,
                ..
            }) => return Err(BackendError::NotFound(format!("Product {id}"))),
            Err(e) => return Err(e),
        };

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Create a product with its images.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is rejected or the request fails.
    #[instrument(skip(self, token, product), fields(name = %product.name, images = product.images.len()))]
    pub async fn create_product(
        &self,
        token: &str,
        product: NewProduct,
    ) -> Result<serde_json::Value, BackendError> {
        let mut form = multipart::Form::new()
            .text("name", product.name)
            .text("price", product.price)
            .text("stock", product.stock)
            .text("description", product.description);

        for image in product.images {
            let part = multipart::Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part("images", part);
        }

        let created = self
            .send(
                self.request(Method::POST, "/products", Some(token))
                    .multipart(form),
            )
            .await?;

        self.inner.cache.invalidate_all();
        Ok(created)
    }

    /// Orders across the shop, for the admin panel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn product_stats(&self, token: &str) -> Result<OrderStats, BackendError> {
        self.send(self.request(Method::GET, "/products/stats", Some(token)))
            .await
    }

    // =========================================================================
    // Shipping
    // =========================================================================

    /// All provinces.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn provinces(&self) -> Result<Vec<Location>, BackendError> {
        self.send(self.request(Method::GET, "/products/shipping/provinces", None))
            .await
    }

    /// Cities of a province.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn cities(&self, province: LocationId) -> Result<Vec<Location>, BackendError> {
        let path = format!("/products/shipping/cities/{province}");
        self.send(self.request(Method::GET, &path, None)).await
    }

    /// Districts of a city.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn districts(&self, city: LocationId) -> Result<Vec<Location>, BackendError> {
        let path = format!("/products/shipping/districts/{city}");
        self.send(self.request(Method::GET, &path, None)).await
    }

    /// Freight quote for the given items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. A quote the backend could not
    /// produce comes back as `success: false`, not as an error.
    #[instrument(skip(self, request), fields(destination = %request.destination_id, courier = %request.courier))]
    pub async fn shipping_cost<T: Serialize + Sync>(
        &self,
        request: &ShippingQuoteRequest<'_, T>,
    ) -> Result<ShippingQuote, BackendError> {
        self.send(
            self.request(Method::POST, "/products/shipping/cost", None)
                .json(request),
        )
        .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Submit an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order or the request fails.
    #[instrument(skip(self, token, order), fields(items = order.items.len(), total = %order.total_price))]
    pub async fn create_order(
        &self,
        token: &str,
        order: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError> {
        self.send(
            self.request(Method::POST, "/products/orders", Some(token))
                .json(order),
        )
        .await
    }

    /// Orders of the signed-in buyer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn my_orders(&self, token: &str) -> Result<Vec<Order>, BackendError> {
        self.send(self.request(Method::GET, "/products/orders/my-orders", Some(token)))
            .await
    }

    /// Request a status change for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the transition or the request
    /// fails.
    #[instrument(skip(self, token), fields(order_id = %id, status = %update.status))]
    pub async fn update_order_status(
        &self,
        token: &str,
        id: &OrderId,
        update: &StatusUpdate,
    ) -> Result<(), BackendError> {
        let path = format!("/products/order-status/{}", url_segment(id.as_str()));
        let _: serde_json::Value = self
            .send(self.request(Method::PATCH, &path, Some(token)).json(update))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Profile of the token's owner. Missing profiles default to a buyer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &str) -> Result<Profile, BackendError> {
        let response: MeResponse = self
            .send(self.request(Method::GET, "/auth/me", Some(token)))
            .await?;
        Ok(response.profile.unwrap_or_default())
    }
}

/// Percent-encode an id for use as a single path segment.
fn url_segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
