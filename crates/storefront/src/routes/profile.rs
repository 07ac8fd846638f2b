//! Buyer order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::{OrderId, OrderStatus};

use crate::backend::{Order, StatusUpdate};
use crate::checkout::PendingPayment;
use crate::error::AppError;
use crate::filters;
use crate::htmx::{self, HxRequest};
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{Toast, session_keys};
use crate::routes::PageContext;
use crate::routes::checkout::MISSING_TOKEN;
use crate::state::AppState;

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub invoice: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub created_at: Option<String>,
    pub buyer: String,
    pub total: String,
    pub tracking_number: Option<String>,
    pub items: Vec<OrderItemView>,
    pub can_pay: bool,
    pub can_confirm: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let invoice: String = order
            .id
            .as_str()
            .chars()
            .take(8)
            .collect::<String>()
            .to_uppercase();

        Self {
            id: order.id.to_string(),
            invoice,
            status: order.status,
            status_label: order.status.label(),
            created_at: order
                .created_at
                .map(|at| at.format("%d %b %Y, %H:%M").to_string()),
            buyer: order
                .profiles
                .as_ref()
                .and_then(|p| p.full_name.clone())
                .unwrap_or_else(|| "Unknown buyer".to_string()),
            total: order.total_amount.display(),
            tracking_number: order.tracking_number.clone().filter(|t| !t.is_empty()),
            items: order
                .order_items
                .iter()
                .map(|item| OrderItemView {
                    name: item
                        .products
                        .as_ref()
                        .map_or_else(|| "Deleted product".to_string(), |p| p.name.clone()),
                    image: item
                        .products
                        .as_ref()
                        .and_then(|p| p.image_url.first().cloned()),
                    quantity: item.quantity,
                    price: item.price_at_purchase.display(),
                })
                .collect(),
            can_pay: order.status.buyer_can_pay(),
            can_confirm: order.status.buyer_can_confirm(),
        }
    }
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderView>,
    pub error: Option<String>,
}

/// Display the buyer's orders.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAuth(auth): RequireAuth,
) -> impl IntoResponse {
    let (orders, error) = match state.backend().my_orders(&auth.access_token).await {
        Ok(orders) => (orders.iter().map(OrderView::from).collect(), None),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id, "Failed to fetch orders");
            (
                Vec::new(),
                Some("Could not load your order history.".to_string()),
            )
        }
    };

    ProfileTemplate {
        page: PageContext::load(&session, &state, nonce).await,
        orders,
        error,
    }
}

/// Reopen the payment widget for a pending order.
#[instrument(skip(state, session, auth))]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = OrderId::new(id);
    let orders = state.backend().my_orders(&auth.access_token).await?;

    let token = orders
        .into_iter()
        .find(|o| o.id == id && o.status.buyer_can_pay())
        .and_then(|o| o.snap_token)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        Toast::error(MISSING_TOKEN).queue(&session).await;
        return Ok(htmx::redirect(is_htmx, "/profile"));
    };

    session
        .insert(session_keys::PENDING_PAYMENT, PendingPayment::retry(token, id))
        .await?;
    Ok(htmx::redirect(is_htmx, "/checkout/pay"))
}

/// Confirm that a shipped order arrived.
#[instrument(skip(state, session, auth))]
pub async fn confirm_received(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    let update = StatusUpdate {
        status: OrderStatus::Completed,
        tracking_number: None,
    };

    let toast = match state
        .backend()
        .update_order_status(&auth.access_token, &OrderId::new(id), &update)
        .await
    {
        Ok(()) => Toast::success("Order confirmed. Enjoy your purchase!"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to confirm receipt");
            Toast::error(e.user_message())
        }
    };
    toast.queue(&session).await;
    htmx::redirect(is_htmx, "/profile")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thriftshop_core::{OrderItemId, Price};

    use super::*;
    use crate::backend::{Buyer, OrderItem, OrderItemProduct};

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new("3f9a1c2e-aaaa-bbbb"),
            total_amount: Price::new(29_000),
            status,
            created_at: None,
            profiles: Some(Buyer {
                full_name: Some("Sari".to_string()),
            }),
            tracking_number: Some(String::new()),
            snap_token: None,
            order_items: vec![OrderItem {
                id: OrderItemId::new("i1"),
                quantity: 2,
                price_at_purchase: Price::new(10_000),
                products: None,
            }],
        }
    }

    #[test]
    fn test_order_view_fields() {
        let view = OrderView::from(&order(OrderStatus::Shipped));
        assert_eq!(view.invoice, "3F9A1C2E");
        assert_eq!(view.total, "Rp 29.000");
        assert_eq!(view.buyer, "Sari");
        assert!(view.tracking_number.is_none());
        assert!(view.can_confirm);
        assert!(!view.can_pay);
        assert_eq!(view.items.first().unwrap().name, "Deleted product");
    }

    #[test]
    fn test_only_pending_orders_can_be_paid() {
        assert!(OrderView::from(&order(OrderStatus::Pending)).can_pay);
        assert!(!OrderView::from(&order(OrderStatus::Paid)).can_pay);
    }

    #[test]
    fn test_item_uses_first_product_image() {
        let mut order = order(OrderStatus::Paid);
        if let Some(item) = order.order_items.first_mut() {
            item.products = Some(OrderItemProduct {
                name: "Flannel".to_string(),
                image_url: vec!["https://res.cloudinary.com/f.jpg".to_string()],
            });
        }
        let view = OrderView::from(&order);
        let item = view.items.first().unwrap();
        assert_eq!(item.name, "Flannel");
        assert_eq!(item.image.as_deref(), Some("https://res.cloudinary.com/f.jpg"));
        assert_eq!(item.price, "Rp 10.000");
    }
}
