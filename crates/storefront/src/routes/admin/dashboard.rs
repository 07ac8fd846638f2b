//! Admin dashboard: orders and products tabs.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::OrderStatus;

use crate::backend::{Order, Product};
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::routes::PageContext;
use crate::routes::profile::OrderView;
use crate::state::AppState;

/// Dashboard tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdminTab {
    #[default]
    Orders,
    Products,
}

impl AdminTab {
    /// Tab named in the query string. Unknown names fall back to orders.
    #[must_use]
    pub fn from_query(tab: Option<&str>) -> Self {
        match tab {
            Some("products") => Self::Products,
            _ => Self::Orders,
        }
    }
}

/// Dashboard query parameters.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
}

/// A status change button.
#[derive(Clone)]
pub struct ActionView {
    pub target: &'static str,
    pub label: &'static str,
    pub requires_tracking: bool,
}

/// Order row for the admin table.
#[derive(Clone)]
pub struct AdminOrderView {
    pub order: OrderView,
    pub actions: Vec<ActionView>,
}

impl From<&Order> for AdminOrderView {
    fn from(order: &Order) -> Self {
        let actions = order
            .status
            .admin_actions()
            .iter()
            .map(|action| ActionView {
                target: action.target.as_str(),
                label: match action.target {
                    OrderStatus::Shipped => "Ship with tracking number",
                    OrderStatus::Cancelled => "Cancel order",
                    other => other.label(),
                },
                requires_tracking: action.requires_tracking,
            })
            .collect();

        Self {
            order: OrderView::from(order),
            actions,
        }
    }
}

/// Product row for the admin table.
#[derive(Clone)]
pub struct AdminProductView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub stock: i64,
}

impl From<&Product> for AdminProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image: product.primary_image().map(ToString::to_string),
            price: product.price.display(),
            stock: product.stock,
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub page: PageContext,
    pub tab: AdminTab,
    pub orders: Vec<AdminOrderView>,
    pub products: Vec<AdminProductView>,
    pub errors: Vec<String>,
}

impl DashboardTemplate {
    #[must_use]
    pub fn on_orders(&self) -> bool {
        self.tab == AdminTab::Orders
    }
}

/// Display the dashboard.
///
/// Products and order stats are fetched concurrently; either may fail
/// without hiding the other.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAdmin(auth): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let backend = state.backend();
    let (products, stats) = tokio::join!(
        backend.list_products(),
        backend.product_stats(&auth.access_token)
    );

    let mut errors = Vec::new();
    let products = match products {
        Ok(products) => products.iter().map(AdminProductView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch products");
            errors.push(format!("Products: {}", e.user_message()));
            Vec::new()
        }
    };
    let orders = match stats {
        Ok(stats) => stats.orders.iter().map(AdminOrderView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch order stats");
            errors.push(format!("Orders: {}", e.user_message()));
            Vec::new()
        }
    };

    DashboardTemplate {
        page: PageContext::load(&session, &state, nonce).await,
        tab: AdminTab::from_query(query.tab.as_deref()),
        orders,
        products,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use thriftshop_core::{OrderId, Price};

    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new("o1"),
            total_amount: Price::new(10_000),
            status,
            created_at: None,
            profiles: None,
            tracking_number: None,
            snap_token: None,
            order_items: vec![],
        }
    }

    #[test]
    fn test_paid_order_offers_shipping_only() {
        let view = AdminOrderView::from(&order(OrderStatus::Paid));
        assert_eq!(view.actions.len(), 1);
        assert!(view.actions.iter().all(|a| a.target == "shipped" && a.requires_tracking));
    }

    #[test]
    fn test_finished_orders_offer_nothing() {
        for status in [OrderStatus::Shipped, OrderStatus::Cancelled, OrderStatus::Completed] {
            assert!(AdminOrderView::from(&order(status)).actions.is_empty());
        }
        assert_eq!(AdminOrderView::from(&order(OrderStatus::Pending)).actions.len(), 2);
    }

    #[test]
    fn test_unknown_tab_falls_back_to_orders() {
        assert_eq!(AdminTab::from_query(Some("products")), AdminTab::Products);
        assert_eq!(AdminTab::from_query(Some("orders")), AdminTab::Orders);
        assert_eq!(AdminTab::from_query(Some("nope")), AdminTab::Orders);
        assert_eq!(AdminTab::from_query(None), AdminTab::Orders);
    }
}
