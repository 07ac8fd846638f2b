//! Shipping selector handlers.
//!
//! Each select in the checkout panel posts the whole cart form and gets the
//! panel back. Option lists for the next level are fetched here, so the
//! visitor never sees a city list that does not belong to the chosen
//! province (barring a late response, see [`crate::shipping`]).

use axum::{Form, extract::State, response::Response};
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::{Courier, LocationId};

use crate::backend::ShippingQuoteRequest;
use crate::cart::{CartSelection, CartStore};
use crate::checkout::{CheckoutForm, field};
use crate::error::AppError;
use crate::htmx;
use crate::models::Toast;
use crate::routes::cart::{CartPageView, CheckoutPanelTemplate, checked_ids};
use crate::routes::open_cart;
use crate::shipping::ShippingSelection;
use crate::state::AppState;

/// Ask the backend for a quote for the checked items.
///
/// Without a district nothing is asked; without checked items the cost
/// drops to zero.
pub async fn requote(state: &AppState, shipping: &mut ShippingSelection, selection: &CartSelection) {
    let Some(destination_id) = shipping.quote_destination() else {
        return;
    };
    if selection.is_empty() {
        shipping.reset_cost();
        return;
    }

    let request = ShippingQuoteRequest {
        destination_id,
        courier: shipping.courier,
        items: &selection.items,
    };
    let result = state.backend().shipping_cost(&request).await;
    shipping.apply_quote(result);
}

/// Parse an optional location id from a select value. Blank means none.
fn location(pairs: &[(String, String)], key: &str) -> Option<LocationId> {
    field(pairs, key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Re-render the checkout panel, attaching `toasts`.
fn render_panel(
    cart: &CartStore<Session>,
    pairs: &[(String, String)],
    shipping: &ShippingSelection,
    toasts: &[Toast],
) -> Response {
    let selected = checked_ids(&CheckoutForm::from_pairs(pairs), cart);
    let address = field(pairs, "address").unwrap_or_default();
    let view = CartPageView::build(cart, &selected, shipping, address, None);
    htmx::with_toasts(CheckoutPanelTemplate { cart: view }, toasts)
}

/// Re-quote when a district is known, then render.
async fn quote_and_render(
    state: &AppState,
    session: &Session,
    pairs: &[(String, String)],
    mut shipping: ShippingSelection,
) -> Result<Response, AppError> {
    let cart = open_cart(session, state).await?;
    let selected = checked_ids(&CheckoutForm::from_pairs(pairs), &cart);
    requote(state, &mut shipping, &cart.selection(&selected)).await;
    shipping.save(session).await?;

    let toasts: Vec<Toast> = shipping.notice.iter().map(Toast::error).collect();
    Ok(render_panel(&cart, pairs, &shipping, &toasts))
}

/// Choose a province and load its cities.
#[instrument(skip(state, session, pairs))]
pub async fn province(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let mut shipping = ShippingSelection::load(&session).await?;
    let chosen = location(&pairs, "province");
    shipping.select_province(chosen);

    let mut toasts = Vec::new();
    if let Some(province) = chosen {
        match state.backend().cities(province).await {
            Ok(cities) => shipping.set_cities(cities),
            Err(e) => {
                tracing::warn!(error = %e, %province, "Failed to fetch cities");
                toasts.push(Toast::error(e.user_message()));
            }
        }
    }

    shipping.save(&session).await?;
    let cart = open_cart(&session, &state).await?;
    Ok(render_panel(&cart, &pairs, &shipping, &toasts))
}

/// Choose a city and load its districts.
#[instrument(skip(state, session, pairs))]
pub async fn city(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let mut shipping = ShippingSelection::load(&session).await?;
    let chosen = location(&pairs, "city");
    shipping.select_city(chosen);

    let mut toasts = Vec::new();
    if let Some(city) = chosen {
        match state.backend().districts(city).await {
            Ok(districts) => shipping.set_districts(districts),
            Err(e) => {
                tracing::warn!(error = %e, %city, "Failed to fetch districts");
                toasts.push(Toast::error(e.user_message()));
            }
        }
    }

    shipping.save(&session).await?;
    let cart = open_cart(&session, &state).await?;
    Ok(render_panel(&cart, &pairs, &shipping, &toasts))
}

/// Choose a district and quote.
#[instrument(skip(state, session, pairs))]
pub async fn district(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let mut shipping = ShippingSelection::load(&session).await?;
    shipping.select_district(location(&pairs, "district"));
    quote_and_render(&state, &session, &pairs, shipping).await
}

/// Choose a courier and quote.
#[instrument(skip(state, session, pairs))]
pub async fn courier(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let courier: Courier = field(&pairs, "courier")
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| AppError::BadRequest("unknown courier".to_string()))?;

    let mut shipping = ShippingSelection::load(&session).await?;
    shipping.select_courier(courier);
    quote_and_render(&state, &session, &pairs, shipping).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(key: &str, value: &str) -> Vec<(String, String)> {
        vec![(key.to_string(), value.to_string())]
    }

    #[test]
    fn test_blank_select_means_none() {
        assert_eq!(location(&pairs("province", ""), "province"), None);
        assert_eq!(location(&pairs("province", "abc"), "province"), None);
        assert_eq!(
            location(&pairs("province", " 12 "), "province"),
            Some(LocationId::new(12))
        );
        assert_eq!(location(&pairs("city", "12"), "province"), None);
    }
}
