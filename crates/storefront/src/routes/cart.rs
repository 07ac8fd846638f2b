//! Cart route handlers.
//!
//! The cart page is one form. Every control inside it posts the whole form
//! through HTMX, so the checked items, the typed address and the shipping
//! selects survive each partial re-render.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{
        IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::{Courier, ProductId};

use crate::backend::Location;
use crate::cart::{CartStorage, CartStore};
use crate::checkout::{CheckoutForm, field};
use crate::error::AppError;
use crate::filters;
use crate::htmx::{self, HxRequest};
use crate::middleware::RequireAuth;
use crate::models::{Toast, visitor_key};
use crate::routes::{PageContext, open_cart, shipping::requote};
use crate::shipping::ShippingSelection;
use crate::state::AppState;

/// Name of the SSE event carrying the new count.
const CART_EVENT: &str = "cart";

// =============================================================================
// View Models
// =============================================================================

/// One `<option>`.
#[derive(Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartRowView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub quantity: u32,
    pub line_total: String,
    pub checked: bool,
}

/// Shipping selects, totals and the submit button.
#[derive(Clone)]
pub struct CheckoutPanelView {
    pub provinces: Vec<OptionView>,
    pub cities: Vec<OptionView>,
    pub districts: Vec<OptionView>,
    pub couriers: Vec<OptionView>,
    pub has_province: bool,
    pub has_city: bool,
    pub has_district: bool,
    pub courier_code: String,
    pub selected_count: usize,
    pub weight_grams: u64,
    pub subtotal: String,
    pub cost: String,
    pub total: String,
    pub address: String,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Cart page display data for templates.
#[derive(Clone)]
pub struct CartPageView {
    pub rows: Vec<CartRowView>,
    pub all_checked: bool,
    pub panel: CheckoutPanelView,
}

fn options<'a>(
    list: impl IntoIterator<Item = (String, &'a str)>,
    chosen: Option<String>,
) -> Vec<OptionView> {
    list.into_iter()
        .map(|(value, label)| OptionView {
            selected: chosen.as_deref() == Some(value.as_str()),
            value,
            label: label.to_string(),
        })
        .collect()
}

fn location_option(location: &Location) -> (String, &str) {
    (location.id.to_string(), location.name.as_str())
}

impl CartPageView {
    /// Build the view for the `selected` subset of `cart`.
    pub fn build<S: CartStorage>(
        cart: &CartStore<S>,
        selected: &[ProductId],
        shipping: &ShippingSelection,
        address: &str,
        error: Option<String>,
    ) -> Self {
        let selection = cart.selection(selected);
        let rows: Vec<CartRowView> = cart
            .items()
            .iter()
            .map(|item| CartRowView {
                id: item.product.id.to_string(),
                name: item.product.name.clone(),
                image: item.product.primary_image().map(ToString::to_string),
                price: item.product.price.display(),
                quantity: item.quantity,
                line_total: item.line_total().display(),
                checked: selected.contains(&item.product.id),
            })
            .collect();
        let all_checked = !rows.is_empty() && rows.iter().all(|r| r.checked);

        let panel = CheckoutPanelView {
            provinces: options(
                shipping.provinces.iter().map(location_option),
                shipping.province.map(|id| id.to_string()),
            ),
            cities: options(
                shipping.cities.iter().map(location_option),
                shipping.city.map(|id| id.to_string()),
            ),
            districts: options(
                shipping.districts.iter().map(location_option),
                shipping.district.map(|id| id.to_string()),
            ),
            couriers: options(
                Courier::ALL.iter().map(|c| (c.code().to_string(), c.label())),
                Some(shipping.courier.code().to_string()),
            ),
            has_province: shipping.province.is_some(),
            has_city: shipping.city.is_some(),
            has_district: shipping.district.is_some(),
            courier_code: shipping.courier.code().to_string(),
            selected_count: selection.items.len(),
            weight_grams: selection.weight_grams,
            subtotal: selection.subtotal.display(),
            cost: shipping.cost.display(),
            total: (selection.subtotal + shipping.cost).display(),
            address: address.to_string(),
            notice: shipping.notice.clone(),
            error,
        };

        Self {
            rows,
            all_checked,
            panel,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartPageView,
}

/// Cart lines and checkout panel fragment (for HTMX).
#[derive(Template)]
#[template(path = "partials/cart_body.html")]
pub struct CartBodyTemplate {
    pub cart: CartPageView,
}

/// Checkout panel fragment (for HTMX).
#[derive(Template)]
#[template(path = "partials/checkout_panel.html")]
pub struct CheckoutPanelTemplate {
    pub cart: CartPageView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Helpers
// =============================================================================

/// Checked ids from the form that are still in the cart.
pub(super) fn checked_ids<S: CartStorage>(
    form: &CheckoutForm,
    cart: &CartStore<S>,
) -> Vec<ProductId> {
    form.selected
        .iter()
        .filter(|id| cart.contains(id))
        .cloned()
        .collect()
}

/// Re-quote for the checked items, then render the cart body.
async fn refresh_body(
    state: &AppState,
    session: &Session,
    cart: &CartStore<Session>,
    pairs: &[(String, String)],
    selected: &[ProductId],
) -> Result<Response, AppError> {
    let mut shipping = ShippingSelection::load(session).await?;
    requote(state, &mut shipping, &cart.selection(selected)).await;
    shipping.save(session).await?;

    let address = field(pairs, "address").unwrap_or_default();
    let view = CartPageView::build(cart, selected, &shipping, address, None);
    Ok(htmx::with_toasts(CartBodyTemplate { cart: view }, &[]))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    let cart = open_cart(&session, &state).await?;
    let mut shipping = ShippingSelection::load(&session).await?;

    if shipping.provinces.is_empty() {
        match state.backend().provinces().await {
            Ok(provinces) => shipping.set_provinces(provinces),
            Err(e) => tracing::warn!(error = %e, "Failed to fetch provinces"),
        }
    }

    // Nothing is checked on a fresh page, so no quote applies yet.
    shipping.reset_cost();
    shipping.save(&session).await?;

    Ok(CartShowTemplate {
        page,
        cart: CartPageView::build(&cart, &[], &shipping, "", None),
    })
}

/// Add one unit of a product (signed-in visitors only).
#[instrument(skip(state, session, auth))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let product = state.backend().get_product(&ProductId::new(id)).await?;
    let mut cart = open_cart(&session, &state).await?;
    cart.add(product.clone()).await?;

    tracing::info!(user_id = %auth.user_id, product_id = %product.id, "Added to cart");
    let toast = Toast::success(format!("{} was added to your cart.", product.name));

    if is_htmx {
        Ok(htmx::cart_updated(htmx::toasts_only(&[toast])))
    } else {
        toast.queue(&session).await;
        Ok(Redirect::to(&format!("/products/{}", product.id)).into_response())
    }
}

/// Change the quantity of a line by the form's `delta`.
#[instrument(skip(state, session, pairs))]
pub async fn change_quantity(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let delta: i32 = field(&pairs, "delta")
        .and_then(|d| d.trim().parse().ok())
        .ok_or_else(|| AppError::BadRequest("delta must be an integer".to_string()))?;

    let mut cart = open_cart(&session, &state).await?;
    cart.change_quantity(&ProductId::new(id), delta).await?;

    if !is_htmx {
        return Ok(Redirect::to("/cart").into_response());
    }
    let selected = checked_ids(&CheckoutForm::from_pairs(&pairs), &cart);
    let body = refresh_body(&state, &session, &cart, &pairs, &selected).await?;
    Ok(htmx::cart_updated(body))
}

/// Remove a line entirely.
#[instrument(skip(state, session, pairs))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let mut cart = open_cart(&session, &state).await?;
    cart.remove(&ProductId::new(id)).await?;

    if !is_htmx {
        return Ok(Redirect::to("/cart").into_response());
    }
    let selected = checked_ids(&CheckoutForm::from_pairs(&pairs), &cart);
    let body = refresh_body(&state, &session, &cart, &pairs, &selected).await?;
    Ok(htmx::cart_updated(body))
}

/// Recompute totals after the checked items changed.
///
/// The select-all box posts `toggle_all`; its own `all` value then decides
/// whether every line or none is checked.
#[instrument(skip(state, session, pairs))]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let cart = open_cart(&session, &state).await?;

    let selected = if field(&pairs, "toggle_all").is_some() {
        if field(&pairs, "all").is_some() {
            cart.all().ids()
        } else {
            Vec::new()
        }
    } else {
        checked_ids(&CheckoutForm::from_pairs(&pairs), &cart)
    };

    refresh_body(&state, &session, &cart, &pairs, &selected).await
}

/// Cart count badge.
pub async fn count(session: Session) -> impl IntoResponse {
    let count = match CartStorage::load(&session).await {
        Ok(items) => items.iter().map(|i| i.quantity).sum(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart count");
            0
        }
    };
    CartCountTemplate { count }
}

/// Stream this visitor's cart changes.
///
/// Each event carries the new count; pages use it to re-fetch the badge.
pub async fn events(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let visitor = visitor_key(&session).await?;
    let mut receiver = state.cart_events().subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(change) if change.visitor == visitor => {
                    yield Ok(Event::default().event(CART_EVENT).data(change.count.to_string()));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thriftshop_core::{LocationId, Price};

    use super::*;
    use crate::cart::testing::MemoryStorage;
    use crate::cart::tests::product;

    async fn cart() -> CartStore<MemoryStorage> {
        let mut cart = CartStore::load(MemoryStorage::default(), None).await.unwrap();
        cart.add(product("A", 10_000, None)).await.unwrap();
        cart.add(product("A", 10_000, None)).await.unwrap();
        cart.add(product("B", 5_000, Some(250))).await.unwrap();
        cart
    }

    #[tokio::test]
    async fn test_view_totals_cover_only_checked_rows() {
        let cart = cart().await;
        let view = CartPageView::build(
            &cart,
            &[ProductId::new("A")],
            &ShippingSelection::default(),
            "Jl. Mawar 1",
            None,
        );

        assert_eq!(view.rows.len(), 2);
        assert!(view.rows.first().unwrap().checked);
        assert!(!view.rows.get(1).unwrap().checked);
        assert!(!view.all_checked);
        assert_eq!(view.panel.subtotal, Price::new(20_000).display());
        assert_eq!(view.panel.selected_count, 1);
        assert_eq!(view.panel.weight_grams, 2_000);
        assert_eq!(view.panel.address, "Jl. Mawar 1");
    }

    #[tokio::test]
    async fn test_view_marks_chosen_options() {
        let cart = cart().await;
        let mut shipping = ShippingSelection::default();
        shipping.set_provinces(vec![
            Location {
                id: LocationId::new(1),
                name: "Jawa Barat".to_string(),
            },
            Location {
                id: LocationId::new(2),
                name: "Bali".to_string(),
            },
        ]);
        shipping.select_province(Some(LocationId::new(2)));
        shipping.select_courier(Courier::Lion);

        let view = CartPageView::build(&cart, &cart.all().ids(), &shipping, "", None);
        let chosen: Vec<&str> = view
            .panel
            .provinces
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(chosen, vec!["Bali"]);
        assert!(view.panel.has_province);
        assert!(!view.panel.has_city);
        assert_eq!(view.panel.courier_code, "lion");
        assert!(view.all_checked);
    }

    #[tokio::test]
    async fn test_checked_ids_drop_removed_items() {
        let cart = cart().await;
        let pairs = vec![
            ("selected".to_string(), "A".to_string()),
            ("selected".to_string(), "gone".to_string()),
        ];
        let ids = checked_ids(&CheckoutForm::from_pairs(&pairs), &cart);
        assert_eq!(ids, vec![ProductId::new("A")]);
    }
}
