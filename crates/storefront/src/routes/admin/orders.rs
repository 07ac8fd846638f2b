//! Admin order status changes.

use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::{OrderId, OrderStatus};

use crate::backend::StatusUpdate;
use crate::htmx::{self, HxRequest};
use crate::middleware::RequireAdmin;
use crate::models::Toast;
use crate::state::AppState;

const DASHBOARD: &str = "/admin?tab=orders";

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Why a status change was refused before contacting the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusFormError {
    #[error("Unknown order status.")]
    UnknownStatus,
    #[error("Please enter a tracking number before shipping.")]
    MissingTracking,
}

impl StatusForm {
    /// Build the update to send.
    ///
    /// Only the requested status is checked here; whether the transition is
    /// allowed is decided by the backend.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown status, or for shipping without a
    /// tracking number.
    pub fn to_update(&self) -> Result<StatusUpdate, StatusFormError> {
        let status: OrderStatus = self
            .status
            .trim()
            .parse()
            .map_err(|_| StatusFormError::UnknownStatus)?;

        let tracking_number = self
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);

        if status == OrderStatus::Shipped && tracking_number.is_none() {
            return Err(StatusFormError::MissingTracking);
        }

        Ok(StatusUpdate {
            status,
            tracking_number: if status == OrderStatus::Shipped {
                tracking_number
            } else {
                None
            },
        })
    }
}

/// Request a status change.
///
/// # Route
///
/// `POST /admin/orders/{id}/status`
#[instrument(skip(state, session, auth, form))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Response {
    let toast = match form.to_update() {
        Err(e) => Toast::error(e.to_string()),
        Ok(update) => match state
            .backend()
            .update_order_status(&auth.access_token, &OrderId::new(id.as_str()), &update)
            .await
        {
            Ok(()) => {
                tracing::info!(order_id = %id, status = %update.status, "Order status changed");
                Toast::success(format!("Order updated to {}.", update.status.label()))
            }
            Err(e) => {
                tracing::warn!(error = %e, order_id = %id, "Order status change failed");
                Toast::error(e.user_message())
            }
        },
    };

    toast.queue(&session).await;
    htmx::redirect(is_htmx, DASHBOARD)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(status: &str, tracking: Option<&str>) -> StatusForm {
        StatusForm {
            status: status.to_string(),
            tracking_number: tracking.map(ToString::to_string),
        }
    }

    #[test]
    fn test_shipping_requires_tracking_number() {
        assert_eq!(
            form("shipped", None).to_update().unwrap_err(),
            StatusFormError::MissingTracking
        );
        assert_eq!(
            form("shipped", Some("   ")).to_update().unwrap_err(),
            StatusFormError::MissingTracking
        );

        let update = form("shipped", Some(" JNE123 ")).to_update().unwrap();
        assert_eq!(update.status, OrderStatus::Shipped);
        assert_eq!(update.tracking_number.as_deref(), Some("JNE123"));
    }

    #[test]
    fn test_cancel_drops_tracking_number() {
        let update = form("cancelled", Some("JNE123")).to_update().unwrap();
        assert_eq!(update.status, OrderStatus::Cancelled);
        assert!(update.tracking_number.is_none());
    }

    #[test]
    fn test_unknown_status_is_refused() {
        assert_eq!(
            form("refunded", None).to_update().unwrap_err(),
            StatusFormError::UnknownStatus
        );
    }
}
