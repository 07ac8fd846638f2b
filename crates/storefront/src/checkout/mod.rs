//! Turning the checked cart items into an order.
//!
//! Nothing is sent to the backend until the destination district, the
//! street address and at least one checked item are all present.

pub mod payment;

pub use payment::{CartEffect, PaymentKind, PaymentOutcome, PendingPayment};

use thiserror::Error;

use thriftshop_core::{Courier, ProductId};

use crate::backend::{CreateOrderRequest, OrderLine};
use crate::cart::{CartSelection, CartStorage, CartStore};
use crate::shipping::ShippingSelection;

/// Why a checkout cannot be submitted yet. Shown inline on the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Please choose the destination district first.")]
    MissingDistrict,
    #[error("Please fill in the full shipping address.")]
    MissingAddress,
    #[error("Please select at least one item to check out.")]
    NothingSelected,
}

/// Last value of `key` in urlencoded pairs.
#[must_use]
pub fn field<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// The cart form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    /// Checked product ids, in form order.
    pub selected: Vec<ProductId>,
    /// Street, house number and similar details.
    pub address: String,
    pub courier: Option<Courier>,
}

impl CheckoutForm {
    /// Build from urlencoded pairs, where `selected` may repeat.
    #[must_use]
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "selected" => {
                    let id = ProductId::new(value.as_str());
                    if !form.selected.contains(&id) {
                        form.selected.push(id);
                    }
                }
                "address" => form.address.clone_from(value),
                "courier" => form.courier = value.parse().ok(),
                _ => {}
            }
        }
        form
    }
}

/// A checkout that passed every precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCheckout {
    pub selection: CartSelection,
    pub shipping_address: String,
}

/// Check the preconditions, in the order the visitor fills them in.
///
/// # Errors
///
/// Returns the first missing precondition.
pub fn validate<S: CartStorage>(
    form: &CheckoutForm,
    cart: &CartStore<S>,
    shipping: &ShippingSelection,
) -> Result<ValidCheckout, CheckoutError> {
    if shipping.district.is_none() {
        return Err(CheckoutError::MissingDistrict);
    }

    let detail = form.address.trim();
    if detail.is_empty() {
        return Err(CheckoutError::MissingAddress);
    }

    let selection = cart.selection(&form.selected);
    if selection.is_empty() {
        return Err(CheckoutError::NothingSelected);
    }

    Ok(ValidCheckout {
        selection,
        shipping_address: full_address(detail, shipping),
    })
}

/// `"{detail}, Kec. {district}, {city}, Prov. {province}"`.
#[must_use]
pub fn full_address(detail: &str, shipping: &ShippingSelection) -> String {
    format!(
        "{}, Kec. {}, {}, Prov. {}",
        detail.trim(),
        shipping.district_name().unwrap_or_default(),
        shipping.city_name().unwrap_or_default(),
        shipping.province_name().unwrap_or_default(),
    )
}

/// Order payload for a validated checkout.
///
/// Returns `None` if the shipping selection has no district.
#[must_use]
pub fn build_order(checkout: &ValidCheckout, shipping: &ShippingSelection) -> Option<CreateOrderRequest> {
    let destination_id = shipping.district?;
    Some(CreateOrderRequest {
        items: checkout
            .selection
            .items
            .iter()
            .map(|item| OrderLine {
                id: item.product.id.clone(),
                quantity: item.quantity,
                price: item.product.price,
            })
            .collect(),
        total_price: checkout.selection.subtotal + shipping.cost,
        destination_id,
        courier: shipping.courier,
        shipping_address: checkout.shipping_address.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thriftshop_core::{LocationId, Price};

    use super::*;
    use crate::backend::{Location, ShippingQuote};
    use crate::cart::testing::MemoryStorage;
    use crate::cart::tests::product;

    fn loc(id: i64, name: &str) -> Location {
        Location {
            id: LocationId::new(id),
            name: name.to_string(),
        }
    }

    fn shipping(cost: i64) -> ShippingSelection {
        let mut s = ShippingSelection::default();
        s.set_provinces(vec![loc(1, "Jawa Barat")]);
        s.select_province(Some(LocationId::new(1)));
        s.set_cities(vec![loc(10, "Bandung")]);
        s.select_city(Some(LocationId::new(10)));
        s.set_districts(vec![loc(100, "Coblong")]);
        s.select_district(Some(LocationId::new(100)));
        s.apply_quote(Ok(ShippingQuote {
            success: true,
            cost: Price::new(cost),
        }));
        s
    }

    async fn cart_a2_b1() -> (CartStore<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::default();
        let mut cart = CartStore::load(storage.clone(), None).await.unwrap();
        cart.add(product("A", 10_000, None)).await.unwrap();
        cart.add(product("A", 10_000, None)).await.unwrap();
        cart.add(product("B", 5_000, None)).await.unwrap();
        (cart, storage)
    }

    fn form(selected: &[&str], address: &str) -> CheckoutForm {
        let mut pairs: Vec<(String, String)> = selected
            .iter()
            .map(|id| ("selected".to_string(), (*id).to_string()))
            .collect();
        pairs.push(("address".to_string(), address.to_string()));
        pairs.push(("courier".to_string(), "sicepat".to_string()));
        CheckoutForm::from_pairs(&pairs)
    }

    #[test]
    fn test_form_collects_repeated_keys() {
        let f = form(&["a", "b", "a"], "Jl. Mawar 1");
        assert_eq!(f.selected, vec![ProductId::new("a"), ProductId::new("b")]);
        assert_eq!(f.courier, Some(Courier::Sicepat));
        assert_eq!(f.address, "Jl. Mawar 1");
    }

    #[tokio::test]
    async fn test_blocked_without_district() {
        let (cart, _) = cart_a2_b1().await;
        let err = validate(&form(&["A"], "Jl. Mawar 1"), &cart, &ShippingSelection::default());
        assert_eq!(err.unwrap_err(), CheckoutError::MissingDistrict);
    }

    #[tokio::test]
    async fn test_blocked_without_address() {
        let (cart, _) = cart_a2_b1().await;
        let err = validate(&form(&["A"], "   "), &cart, &shipping(9_000));
        assert_eq!(err.unwrap_err(), CheckoutError::MissingAddress);
    }

    #[tokio::test]
    async fn test_blocked_without_selection() {
        let (cart, _) = cart_a2_b1().await;
        let err = validate(&form(&[], "Jl. Mawar 1"), &cart, &shipping(9_000));
        assert_eq!(err.unwrap_err(), CheckoutError::NothingSelected);
        let err = validate(&form(&["gone"], "Jl. Mawar 1"), &cart, &shipping(9_000));
        assert_eq!(err.unwrap_err(), CheckoutError::NothingSelected);
    }

    #[tokio::test]
    async fn test_full_address_format() {
        let (cart, _) = cart_a2_b1().await;
        let valid = validate(&form(&["A"], "  Jl. Mawar 1 "), &cart, &shipping(9_000)).unwrap();
        assert_eq!(
            valid.shipping_address,
            "Jl. Mawar 1, Kec. Coblong, Bandung, Prov. Jawa Barat"
        );
    }

    #[tokio::test]
    async fn test_only_checked_items_are_ordered_and_paid_for() {
        let (mut cart, storage) = cart_a2_b1().await;
        let mut s = shipping(9_000);
        s.select_courier(Courier::Jne);

        let valid = validate(&form(&["A"], "Jl. Mawar 1"), &cart, &s).unwrap();
        assert_eq!(valid.selection.subtotal, Price::new(20_000));

        let order = build_order(&valid, &s).unwrap();
        assert_eq!(
            order.items,
            vec![OrderLine {
                id: ProductId::new("A"),
                quantity: 2,
                price: Price::new(10_000),
            }]
        );
        assert_eq!(order.total_price, Price::new(29_000));
        assert_eq!(order.destination_id, LocationId::new(100));
        assert_eq!(order.courier, Courier::Jne);

        let payment = PendingPayment::checkout("snap-token".to_string(), valid.selection.ids());
        match PaymentOutcome::Success.cart_effect(&payment) {
            CartEffect::Remove(ids) => cart.remove_many(&ids).await.unwrap(),
            other => panic!("unexpected effect {other:?}"),
        }

        assert!(!cart.contains(&ProductId::new("A")));
        assert!(cart.contains(&ProductId::new("B")));
        assert_eq!(storage.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_payment_empties_cart() {
        let (mut cart, _) = cart_a2_b1().await;
        let payment = PendingPayment::checkout("t".to_string(), vec![ProductId::new("A")]);
        assert_eq!(PaymentOutcome::Pending.cart_effect(&payment), CartEffect::Clear);
        cart.clear().await.unwrap();
        assert!(cart.is_empty());
    }
}
