//! Payment widget outcomes.
//!
//! The widget runs in the browser and reports back through one of four
//! callbacks, which post to `/checkout/payment/{outcome}`. What happens to
//! the cart depends on the outcome and on whether the payment was opened
//! from a fresh checkout or retried from the order history.

use serde::{Deserialize, Serialize};

use thriftshop_core::{OrderId, ProductId};

use crate::models::Toast;

/// Where the payment was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// Straight after submitting the cart.
    Checkout,
    /// "Pay now" on an existing pending order.
    Retry,
}

/// A payment the widget page should open, kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    /// Widget session token issued by the backend.
    pub token: String,
    /// Cart items the order was placed for.
    pub item_ids: Vec<ProductId>,
    pub kind: PaymentKind,
    /// Order being retried, if any.
    pub order_id: Option<OrderId>,
}

impl PendingPayment {
    /// Payment for a freshly submitted cart.
    #[must_use]
    pub const fn checkout(token: String, item_ids: Vec<ProductId>) -> Self {
        Self {
            token,
            item_ids,
            kind: PaymentKind::Checkout,
            order_id: None,
        }
    }

    /// Payment for an existing order.
    #[must_use]
    pub const fn retry(token: String, order_id: OrderId) -> Self {
        Self {
            token,
            item_ids: Vec::new(),
            kind: PaymentKind::Retry,
            order_id: Some(order_id),
        }
    }
}

/// Which widget callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Pending,
    Error,
    Close,
}

/// What an outcome does to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEffect {
    /// Leave the cart alone.
    Keep,
    /// Remove exactly these items.
    Remove(Vec<ProductId>),
    /// Empty the cart.
    Clear,
}

impl PaymentOutcome {
    /// Cart change for this outcome.
    #[must_use]
    pub fn cart_effect(&self, payment: &PendingPayment) -> CartEffect {
        if payment.kind == PaymentKind::Retry {
            return CartEffect::Keep;
        }
        match self {
            Self::Success => CartEffect::Remove(payment.item_ids.clone()),
            Self::Pending => CartEffect::Clear,
            Self::Error | Self::Close => CartEffect::Keep,
        }
    }

    /// Notice for the visitor. `status_message` is the widget's own error
    /// text, when it gave one.
    #[must_use]
    pub fn notice(&self, kind: PaymentKind, status_message: Option<&str>) -> Toast {
        let widget_message = status_message
            .map(str::trim)
            .filter(|m| !m.is_empty());

        match (self, kind) {
            (Self::Success, _) => Toast::success("Payment successful!"),
            (Self::Pending, PaymentKind::Checkout) => {
                Toast::info("Order saved. Please complete your payment soon.")
            }
            (Self::Pending, PaymentKind::Retry) => Toast::info("Waiting for payment..."),
            (Self::Error, PaymentKind::Checkout) => {
                Toast::error(widget_message.unwrap_or("Payment failed!"))
            }
            (Self::Error, PaymentKind::Retry) => Toast::error(
                widget_message.unwrap_or("Payment failed, please try again."),
            ),
            (Self::Close, PaymentKind::Checkout) => Toast::warning("You closed the payment window."),
            (Self::Close, PaymentKind::Retry) => {
                Toast::warning("Please complete your payment soon.")
            }
        }
    }

    /// Page to send the visitor to afterwards.
    #[must_use]
    pub const fn redirect(&self, kind: PaymentKind) -> &'static str {
        match (self, kind) {
            (Self::Error, PaymentKind::Checkout) => "/cart",
            _ => "/profile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToastLevel;

    fn checkout() -> PendingPayment {
        PendingPayment::checkout("tok".to_string(), vec![ProductId::new("a")])
    }

    #[test]
    fn test_success_removes_only_submitted_items() {
        assert_eq!(
            PaymentOutcome::Success.cart_effect(&checkout()),
            CartEffect::Remove(vec![ProductId::new("a")])
        );
        assert_eq!(PaymentOutcome::Success.redirect(PaymentKind::Checkout), "/profile");
    }

    #[test]
    fn test_pending_clears_whole_cart() {
        assert_eq!(
            PaymentOutcome::Pending.cart_effect(&checkout()),
            CartEffect::Clear
        );
    }

    #[test]
    fn test_error_and_close_keep_cart() {
        assert_eq!(PaymentOutcome::Error.cart_effect(&checkout()), CartEffect::Keep);
        assert_eq!(PaymentOutcome::Close.cart_effect(&checkout()), CartEffect::Keep);
        assert_eq!(PaymentOutcome::Error.redirect(PaymentKind::Checkout), "/cart");
        assert_eq!(PaymentOutcome::Close.redirect(PaymentKind::Checkout), "/profile");
    }

    #[test]
    fn test_retry_never_touches_cart() {
        let retry = PendingPayment::retry("tok".to_string(), OrderId::new("o1"));
        for outcome in [
            PaymentOutcome::Success,
            PaymentOutcome::Pending,
            PaymentOutcome::Error,
            PaymentOutcome::Close,
        ] {
            assert_eq!(outcome.cart_effect(&retry), CartEffect::Keep);
            assert_eq!(outcome.redirect(PaymentKind::Retry), "/profile");
        }
    }

    #[test]
    fn test_error_notice_prefers_widget_message() {
        let toast = PaymentOutcome::Error.notice(PaymentKind::Checkout, Some("Card declined"));
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(toast.message, "Card declined");

        let fallback = PaymentOutcome::Error.notice(PaymentKind::Checkout, Some("  "));
        assert_eq!(fallback.message, "Payment failed!");
        assert_eq!(
            PaymentOutcome::Close
                .notice(PaymentKind::Checkout, None)
                .level,
            ToastLevel::Warning
        );
    }
}
