//! Status enums for orders and profiles.
//!
//! The backend owns the order lifecycle. These enums only describe what the
//! storefront displays and which follow-up actions it offers; the backend
//! validates every transition it receives.

use serde::{Deserialize, Serialize};

/// Order lifecycle status, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, waiting for payment.
    #[default]
    Pending,
    /// Paid through the payment provider.
    Paid,
    /// Handed to the courier (carries a tracking number).
    Shipped,
    /// Cancelled by an operator.
    Cancelled,
    /// Receipt confirmed by the buyer.
    Completed,
}

/// A status change an operator can request from the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdminAction {
    /// Status that will be requested.
    pub target: OrderStatus,
    /// Whether the operator has to supply a tracking number.
    pub requires_tracking: bool,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Shipped,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Buyer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Awaiting payment",
            Self::Paid => "Processing",
            Self::Shipped => "Shipped",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }

    /// Status changes the admin panel offers for an order in this status.
    ///
    /// `shipped -> completed` is a buyer action and is not listed here.
    #[must_use]
    pub const fn admin_actions(&self) -> &'static [AdminAction] {
        const SHIP: AdminAction = AdminAction {
            target: OrderStatus::Shipped,
            requires_tracking: true,
        };
        const CANCEL: AdminAction = AdminAction {
            target: OrderStatus::Cancelled,
            requires_tracking: false,
        };

        match self {
            Self::Pending => &[SHIP, CANCEL],
            Self::Paid => &[SHIP],
            Self::Shipped | Self::Cancelled | Self::Completed => &[],
        }
    }

    /// Whether the buyer can still open the payment widget for this order.
    #[must_use]
    pub const fn buyer_can_pay(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the buyer can confirm receipt of this order.
    #[must_use]
    pub const fn buyer_can_confirm(&self) -> bool {
        matches!(self, Self::Shipped)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Profile role reported by the backend's `/auth/me`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Store operator with access to the admin panel.
    Admin,
    /// Any other signed-in visitor.
    #[default]
    #[serde(other)]
    Buyer,
}

impl Role {
    /// Whether this role may open the admin panel.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Buyer => write!(f, "buyer"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_pending_can_ship_with_tracking_or_cancel() {
        let actions = OrderStatus::Pending.admin_actions();
        assert_eq!(actions.len(), 2);
        assert!(
            actions
                .iter()
                .any(|a| a.target == OrderStatus::Shipped && a.requires_tracking)
        );
        assert!(
            actions
                .iter()
                .any(|a| a.target == OrderStatus::Cancelled && !a.requires_tracking)
        );
    }

    #[test]
    fn test_paid_only_ships() {
        let actions = OrderStatus::Paid.admin_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions.first().unwrap().target, OrderStatus::Shipped);
    }

    #[test]
    fn test_terminal_and_buyer_owned_states_offer_no_admin_actions() {
        assert!(OrderStatus::Shipped.admin_actions().is_empty());
        assert!(OrderStatus::Cancelled.admin_actions().is_empty());
        assert!(OrderStatus::Completed.admin_actions().is_empty());
    }

    #[test]
    fn test_buyer_actions() {
        assert!(OrderStatus::Pending.buyer_can_pay());
        assert!(!OrderStatus::Paid.buyer_can_pay());
        assert!(OrderStatus::Shipped.buyer_can_confirm());
        assert!(!OrderStatus::Completed.buyer_can_confirm());
    }

    #[test]
    fn test_role_unknown_values_are_buyers() {
        let admin: Role = serde_json::from_str("\"admin\"").unwrap();
        let user: Role = serde_json::from_str("\"user\"").unwrap();
        assert!(admin.is_admin());
        assert_eq!(user, Role::Buyer);
    }
}
