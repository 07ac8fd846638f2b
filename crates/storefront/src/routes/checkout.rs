//! Checkout route handlers.
//!
//! `POST /checkout` validates the cart form, places the order and hands the
//! payment token to `/checkout/pay`, which opens the payment widget. The
//! widget reports back through `/checkout/payment/{outcome}`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::CartStore;
use crate::checkout::{
    CartEffect, CheckoutError, CheckoutForm, PaymentKind, PaymentOutcome, PendingPayment,
    build_order, field, validate,
};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::htmx::{self, HxRequest};
use crate::middleware::{CspNonce, RequireAuth, current_auth};
use crate::models::{Toast, session_keys};
use crate::routes::cart::{CartPageView, CheckoutPanelTemplate, checked_ids};
use crate::routes::{PageContext, open_cart, shipping::requote};
use crate::shipping::ShippingSelection;
use crate::state::AppState;

/// Notice when the session holds no payment to open.
pub const MISSING_TOKEN: &str = "Payment token not found.";

/// Payment widget page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/pay.html")]
pub struct PayTemplate {
    pub page: PageContext,
    pub token: String,
    pub client_key: String,
    pub snap_url: String,
    pub retry: bool,
}

/// Show the problem next to the submit button, or on the cart page for
/// plain form posts.
async fn reject(
    session: &Session,
    is_htmx: bool,
    cart: &CartStore<Session>,
    form: &CheckoutForm,
    shipping: &ShippingSelection,
    message: String,
    toast: bool,
) -> Response {
    if !is_htmx {
        Toast::error(message).queue(session).await;
        return htmx::redirect(false, "/cart");
    }

    let selected = checked_ids(form, cart);
    if toast {
        let view = CartPageView::build(cart, &selected, shipping, &form.address, None);
        htmx::with_toasts(CheckoutPanelTemplate { cart: view }, &[Toast::error(message)])
    } else {
        let view = CartPageView::build(cart, &selected, shipping, &form.address, Some(message));
        htmx::with_toasts(CheckoutPanelTemplate { cart: view }, &[])
    }
}

/// Submit the checked items as an order.
///
/// Preconditions are checked before anything is sent; sign-in is checked
/// after them.
#[instrument(skip(state, session, pairs))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let form = CheckoutForm::from_pairs(&pairs);
    let mut cart = open_cart(&session, &state).await?;
    let mut shipping = ShippingSelection::load(&session).await?;

    if let Some(courier) = form.courier
        && courier != shipping.courier
    {
        shipping.select_courier(courier);
        requote(&state, &mut shipping, &cart.selection(&form.selected)).await;
        shipping.save(&session).await?;
    }

    let valid = match validate(&form, &cart, &shipping) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::debug!(reason = %e, "Checkout blocked");
            return Ok(reject(&session, is_htmx, &cart, &form, &shipping, e.to_string(), false).await);
        }
    };

    let Some(auth) = current_auth(&session, &state).await else {
        Toast::warning("Please sign in first.").queue(&session).await;
        return Ok(htmx::redirect(is_htmx, "/login"));
    };

    let Some(order) = build_order(&valid, &shipping) else {
        let message = CheckoutError::MissingDistrict.to_string();
        return Ok(reject(&session, is_htmx, &cart, &form, &shipping, message, false).await);
    };

    let response = match state.backend().create_order(&auth.access_token, &order).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id, "Order creation failed");
            return Ok(reject(&session, is_htmx, &cart, &form, &shipping, e.user_message(), true).await);
        }
    };

    let item_ids = valid.selection.ids();
    tracing::info!(
        user_id = %auth.user_id,
        items = item_ids.len(),
        total = %order.total_price,
        "Order placed"
    );
    add_breadcrumb("checkout", "Order placed", None);

    if let Some(token) = response.token {
        session
            .insert(session_keys::PENDING_PAYMENT, PendingPayment::checkout(token, item_ids))
            .await?;
        return Ok(htmx::redirect(is_htmx, "/checkout/pay"));
    }

    cart.remove_many(&item_ids).await?;
    Toast::success("Order placed!").queue(&session).await;
    Ok(htmx::redirect(is_htmx, "/profile"))
}

/// Payment widget page for the pending payment in the session.
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAuth(_auth): RequireAuth,
) -> Result<Response, AppError> {
    let pending: Option<PendingPayment> = session.get(session_keys::PENDING_PAYMENT).await?;
    let Some(pending) = pending else {
        Toast::error(MISSING_TOKEN).queue(&session).await;
        return Ok(htmx::redirect(false, "/profile"));
    };

    let page = PageContext::load(&session, &state, nonce).await;
    let payment = &state.config().payment;

    Ok(PayTemplate {
        page,
        token: pending.token,
        client_key: payment.client_key.clone(),
        snap_url: payment.snap_url.clone(),
        retry: pending.kind == PaymentKind::Retry,
    }
    .into_response())
}

/// Widget callback.
///
/// Consumes the pending payment, applies its cart effect and queues the
/// matching notice.
#[instrument(skip(state, session, pairs))]
pub async fn payment_outcome(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    Path(outcome): Path<PaymentOutcome>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let pending: Option<PendingPayment> = session.remove(session_keys::PENDING_PAYMENT).await?;
    let Some(pending) = pending else {
        Toast::error(MISSING_TOKEN).queue(&session).await;
        return Ok(htmx::redirect(is_htmx, "/profile"));
    };

    match outcome.cart_effect(&pending) {
        CartEffect::Keep => {}
        CartEffect::Remove(ids) => open_cart(&session, &state).await?.remove_many(&ids).await?,
        CartEffect::Clear => open_cart(&session, &state).await?.clear().await?,
    }

    tracing::info!(?outcome, kind = ?pending.kind, order_id = ?pending.order_id, "Payment outcome");
    outcome
        .notice(pending.kind, field(&pairs, "status_message"))
        .queue(&session)
        .await;

    Ok(htmx::redirect(is_htmx, outcome.redirect(pending.kind)))
}
