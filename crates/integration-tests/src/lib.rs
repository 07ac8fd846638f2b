//! End-to-end harness for the storefront.
//!
//! Each test spawns the real storefront router next to an in-process fake
//! of the backend REST API and the auth provider, both bound to ephemeral
//! ports, and drives it with a cookie-enabled `reqwest` client that does
//! not follow redirects.
//!
//! ```rust,ignore
//! let ctx = TestContext::start().await;
//! ctx.sign_in().await;
//! let response = ctx.post_form("/cart/add/prod-a", &[]).await;
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};

use thriftshop_storefront::config::{AuthConfig, BackendConfig, PaymentConfig, StorefrontConfig};
use thriftshop_storefront::state::AppState;

/// Product id of the jacket, priced 10000.
pub const PRODUCT_A: &str = "prod-a";
/// Product id of the shirt, priced 5000.
pub const PRODUCT_B: &str = "prod-b";
pub const PRODUCT_A_NAME: &str = "Vintage Denim Jacket";
pub const PRODUCT_B_NAME: &str = "Batik Shirt";

pub const PROVINCE_ID: &str = "11";
pub const CITY_ID: &str = "152";
pub const DISTRICT_ID: &str = "2096";

/// Freight the fake backend quotes for any request.
pub const SHIPPING_COST: i64 = 9000;
/// Payment token the fake backend issues for every order.
pub const SNAP_TOKEN: &str = "snap-test-token";

/// Requests the fake backend received.
#[derive(Clone, Default)]
pub struct Recorded {
    orders: Arc<Mutex<Vec<Value>>>,
    quotes: Arc<Mutex<Vec<Value>>>,
}

impl Recorded {
    /// Bodies of `POST /products/orders`, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.orders.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Bodies of `POST /products/shipping/cost`, oldest first.
    #[must_use]
    pub fn quotes(&self) -> Vec<Value> {
        self.quotes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn push(list: &Mutex<Vec<Value>>, body: Value) {
        if let Ok(mut list) = list.lock() {
            list.push(body);
        }
    }
}

fn catalog() -> Vec<Value> {
    vec![
        json!({
            "id": PRODUCT_A,
            "name": PRODUCT_A_NAME,
            "price": 10000,
            "stock": 3,
            "description": "Trucker jacket, size M",
            "image_url": ["https://res.cloudinary.com/demo/jacket.jpg"],
            "weight": 800
        }),
        json!({
            "id": PRODUCT_B,
            "name": PRODUCT_B_NAME,
            "price": 5000,
            "stock": 1,
            "description": null,
            "image_url": null,
            "weight": 300
        }),
    ]
}

async fn list_products() -> Json<Vec<Value>> {
    Json(catalog())
}

async fn get_product(Path(id): Path<String>) -> Response {
    match catalog().into_iter().find(|p| p["id"] == id.as_str()) {
        Some(product) => Json(product).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Product not found" })),
        )
            .into_response(),
    }
}

async fn me() -> Json<Value> {
    Json(json!({ "profile": { "role": "buyer", "full_name": "Sari" } }))
}

async fn provinces() -> Json<Value> {
    Json(json!([{ "id": 11, "name": "DKI Jakarta" }]))
}

async fn cities(Path(_province): Path<i64>) -> Json<Value> {
    Json(json!([{ "id": 152, "name": "Jakarta Selatan" }]))
}

async fn districts(Path(_city): Path<i64>) -> Json<Value> {
    Json(json!([{ "id": 2096, "name": "Kebayoran Baru" }]))
}

async fn shipping_cost(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    Recorded::push(&recorded.quotes, body);
    Json(json!({ "success": true, "cost": SHIPPING_COST }))
}

async fn create_order(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    Recorded::push(&recorded.orders, body);
    Json(json!({ "token": SNAP_TOKEN }))
}

async fn my_orders() -> Json<Value> {
    Json(json!([]))
}

async fn token() -> Json<Value> {
    Json(json!({
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "user": { "id": "user-1", "email": "sari@example.com" }
    }))
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn fake_router(recorded: Recorded) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route("/api/products/orders", post(create_order))
        .route("/api/products/orders/my-orders", get(my_orders))
        .route("/api/products/shipping/provinces", get(provinces))
        .route("/api/products/shipping/cities/{id}", get(cities))
        .route("/api/products/shipping/districts/{id}", get(districts))
        .route("/api/products/shipping/cost", post(shipping_cost))
        .route("/api/auth/me", get(me))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .with_state(recorded)
}

async fn bind() -> (tokio::net::TcpListener, SocketAddr) {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap_or_else(|e| panic!("failed to bind test listener: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("listener has no address: {e}"));
    (listener, addr)
}

/// A running storefront with its fake upstreams.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub upstream_url: String,
    pub recorded: Recorded,
}

impl TestContext {
    /// Spawn the fake upstreams and the storefront.
    ///
    /// # Panics
    ///
    /// Panics if a listener cannot be bound or the client cannot be built.
    pub async fn start() -> Self {
        let recorded = Recorded::default();
        let (fake_listener, fake_addr) = bind().await;
        let fake = fake_router(recorded.clone());
        tokio::spawn(async move {
            let _ = axum::serve(fake_listener, fake).await;
        });
        let upstream_url = format!("http://{fake_addr}");

        let (listener, addr) = bind().await;
        let base_url = format!("http://{addr}");
        let config = StorefrontConfig {
            host: addr.ip(),
            port: addr.port(),
            base_url: base_url.clone(),
            backend: BackendConfig {
                api_url: format!("{upstream_url}/api"),
            },
            auth: AuthConfig {
                url: upstream_url.clone(),
                anon_key: SecretString::from("test-anon-key"),
                provider: "google".to_string(),
            },
            payment: PaymentConfig {
                client_key: "SB-Mid-client-test".to_string(),
                snap_url: "https://app.sandbox.midtrans.com/snap/snap.js".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };
        let app = thriftshop_storefront::app(AppState::new(config));
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| panic!("failed to build client: {e}"));

        Self {
            client,
            base_url,
            upstream_url,
            recorded,
        }
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET` a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {path} failed: {e}"))
    }

    /// `POST` a urlencoded form to a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {path} failed: {e}"))
    }

    /// Sign in through the fake provider.
    ///
    /// # Panics
    ///
    /// Panics if any step of the sign-in redirect chain is not as expected.
    pub async fn sign_in(&self) {
        let response = self.get("/auth/login").await;
        let authorize = location(&response);
        assert!(
            authorize.starts_with(&format!("{}/auth/v1/authorize", self.upstream_url)),
            "unexpected provider redirect: {authorize}"
        );

        let authorize = url::Url::parse(&authorize)
            .unwrap_or_else(|e| panic!("invalid provider redirect: {e}"));
        let redirect_to = query_param(&authorize, "redirect_to");
        let redirect_to =
            url::Url::parse(&redirect_to).unwrap_or_else(|e| panic!("invalid redirect_to: {e}"));
        let state = query_param(&redirect_to, "state");

        let response = self
            .get(&format!("/auth/callback?code=code-1&state={state}"))
            .await;
        assert_eq!(location(&response), "/", "sign-in should land on the home page");
    }

    /// Choose province, city and district in the checkout panel.
    ///
    /// # Panics
    ///
    /// Panics if a selector request fails.
    pub async fn choose_destination(&self, selected: &[&str]) -> String {
        let response = self
            .post_form("/cart/shipping/province", &[("province", PROVINCE_ID)])
            .await;
        assert!(response.status().is_success());
        let response = self
            .post_form(
                "/cart/shipping/city",
                &[("province", PROVINCE_ID), ("city", CITY_ID)],
            )
            .await;
        assert!(response.status().is_success());

        let mut form = vec![
            ("province", PROVINCE_ID),
            ("city", CITY_ID),
            ("district", DISTRICT_ID),
            ("courier", "jne"),
        ];
        form.extend(selected.iter().map(|id| ("selected", *id)));
        let response = self.post_form("/cart/shipping/district", &form).await;
        assert!(response.status().is_success());
        response
            .text()
            .await
            .unwrap_or_else(|e| panic!("unreadable panel: {e}"))
    }

    /// Submit the cart form for `selected` to the fake destination.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn submit_checkout(&self, selected: &[&str], address: &str) -> reqwest::Response {
        let mut form = vec![
            ("province", PROVINCE_ID),
            ("city", CITY_ID),
            ("district", DISTRICT_ID),
            ("courier", "jne"),
            ("address", address),
        ];
        form.extend(selected.iter().map(|id| ("selected", *id)));
        self.post_form("/checkout", &form).await
    }

    /// Fill the cart with the jacket twice and the shirt once, then place
    /// an order for `selected`.
    ///
    /// # Panics
    ///
    /// Panics if any step does not land where a successful checkout would.
    pub async fn place_order(&self, selected: &[&str]) {
        for id in [PRODUCT_A, PRODUCT_A, PRODUCT_B] {
            let response = self.post_form(&format!("/cart/add/{id}"), &[]).await;
            assert_eq!(location(&response), format!("/products/{id}"));
        }
        self.get("/cart").await;
        self.choose_destination(selected).await;

        let response = self.submit_checkout(selected, "Jl. Melawai 10").await;
        assert_eq!(location(&response), "/checkout/pay");
    }

    /// Text of a storefront page.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is unreadable.
    pub async fn text(&self, path: &str) -> String {
        self.get(path)
            .await
            .text()
            .await
            .unwrap_or_else(|e| panic!("unreadable body for {path}: {e}"))
    }
}

/// The `Location` header of a redirect.
///
/// # Panics
///
/// Panics if the response is not a redirect with a readable location.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    assert!(
        response.status().is_redirection(),
        "expected a redirect, got {}",
        response.status()
    );
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| panic!("redirect without location"))
}

fn query_param(url: &url::Url, key: &str) -> String {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| panic!("missing {key} in {url}"))
}
