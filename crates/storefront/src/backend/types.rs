//! Records exchanged with the backend REST API.
//!
//! These mirror the JSON the backend produces and accepts. They are held
//! only in transient view state or in the visitor's session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use thriftshop_core::{
    Courier, LocationId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Role,
};

// =============================================================================
// Catalog
// =============================================================================

/// A product as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub description: Option<String>,
    /// Image URLs in display order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_url: Vec<String>,
    /// Shipping weight in grams, when the backend knows it.
    #[serde(default)]
    pub weight: Option<u32>,
}

impl Product {
    /// First image, used for cards and cart rows.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.image_url.first().map(String::as_str)
    }
}

/// A product in the visitor's cart.
///
/// Carries the product fields as they were when added, plus a quantity.
/// A cart holds at most one entry per product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// Default shipping weight in grams for items without one.
    pub const DEFAULT_WEIGHT_GRAMS: u32 = 1000;

    /// Start a cart entry for `product` with quantity 1.
    #[must_use]
    pub const fn new(product: Product) -> Self {
        Self {
            product,
            quantity: 1,
        }
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }

    /// Weight times quantity, in grams.
    #[must_use]
    pub fn line_weight(&self) -> u64 {
        u64::from(
            self.product
                .weight
                .unwrap_or(Self::DEFAULT_WEIGHT_GRAMS),
        ) * u64::from(self.quantity)
    }
}

/// Payload for creating a product from the admin panel.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: String,
    pub stock: String,
    pub description: String,
    pub images: Vec<ImageUpload>,
}

/// One uploaded image, forwarded as a multipart part.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// =============================================================================
// Orders
// =============================================================================

/// Buyer reference embedded in admin order listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Product reference embedded in an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemProduct {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_url: Vec<String>,
}

/// One line of an order, priced at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub quantity: u32,
    pub price_at_purchase: Price,
    #[serde(default)]
    pub products: Option<OrderItemProduct>,
}

/// An order as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub total_amount: Price,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profiles: Option<Buyer>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub snap_token: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub order_items: Vec<OrderItem>,
}

/// Response of `GET /products/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderStats {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub orders: Vec<Order>,
}

/// One submitted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: ProductId,
    pub quantity: u32,
    pub price: Price,
}

/// Body of `POST /products/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    #[serde(rename = "totalPrice")]
    pub total_price: Price,
    pub destination_id: LocationId,
    pub courier: Courier,
    pub shipping_address: String,
}

/// Response of `POST /products/orders`.
///
/// A missing token means the backend finalized the order without payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of `PATCH /products/order-status/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

// =============================================================================
// Shipping
// =============================================================================

/// A province, city or district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// Body of `POST /products/shipping/cost`.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingQuoteRequest<'a, T: Serialize> {
    pub destination_id: LocationId,
    pub courier: Courier,
    pub items: &'a [T],
}

/// Response of `POST /products/shipping/cost`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingQuote {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub cost: Price,
}

// =============================================================================
// Profile
// =============================================================================

/// Profile of the signed-in visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct MeResponse {
    #[serde(default)]
    pub profile: Option<Profile>,
}

/// Error body the backend uses for failures.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub message: Option<String>,
}

/// Treat a JSON `null` the same as a missing list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_tolerates_sparse_records() {
        let product: Product = serde_json::from_str(
            r#"{"id":"p1","name":"Denim Jacket","price":150000,"image_url":null}"#,
        )
        .unwrap();
        assert_eq!(product.stock, 0);
        assert!(product.image_url.is_empty());
        assert!(product.primary_image().is_none());
        assert!(product.weight.is_none());
    }

    #[test]
    fn test_order_with_items_and_buyer() {
        let order: Order = serde_json::from_str(
            r#"{
                "id": "o1",
                "total_amount": 45000,
                "status": "shipped",
                "created_at": "2025-01-10T08:00:00Z",
                "profiles": {"full_name": "Sari"},
                "tracking_number": "JNE123",
                "order_items": [
                    {"id": "i1", "quantity": 2, "price_at_purchase": 20000,
                     "products": {"name": "Shirt", "image_url": ["https://img/1.jpg"]}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(
            order.profiles.and_then(|b| b.full_name).as_deref(),
            Some("Sari")
        );
        assert!(order.snap_token.is_none());
    }

    #[test]
    fn test_create_order_request_wire_names() {
        let request = CreateOrderRequest {
            items: vec![OrderLine {
                id: ProductId::new("a"),
                quantity: 2,
                price: Price::new(10_000),
            }],
            total_price: Price::new(29_000),
            destination_id: LocationId::new(5),
            courier: Courier::Jne,
            shipping_address: "Jl. Mawar 1".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["totalPrice"], 29_000);
        assert_eq!(json["destination_id"], 5);
        assert_eq!(json["courier"], "jne");
        assert_eq!(json["items"][0]["quantity"], 2);
    }

    #[test]
    fn test_cart_item_is_flat_product_plus_quantity() {
        let item: CartItem = serde_json::from_str(
            r#"{"id":"p1","name":"Shirt","price":20000,"stock":3,"image_url":[],"quantity":2}"#,
        )
        .unwrap();
        assert_eq!(item.product.id.as_str(), "p1");
        assert_eq!(item.line_total(), Price::new(40_000));
        assert_eq!(item.line_weight(), 2000);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "Shirt");
        assert_eq!(json["quantity"], 2);
    }

    #[test]
    fn test_missing_token_means_finalized() {
        let response: CreateOrderResponse = serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(response.token.is_none());
    }
}
