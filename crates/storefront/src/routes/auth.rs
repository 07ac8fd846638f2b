//! Sign-in route handlers.
//!
//! Sign-in goes through the hosted authentication provider with PKCE:
//! - Login: Stores a CSRF state and code verifier, redirects to the provider
//! - Callback: Checks the state, exchanges the code, looks up the profile role
//! - Logout: Revokes the token (best effort), drops the session and the cart

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, clear_auth_session, set_auth_session};
use crate::models::{Toast, session_keys};
use crate::routes::{PageContext, open_cart};
use crate::services::auth::{AuthError, PkcePair, generate_random_string};
use crate::state::AppState;

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection, echoed through `redirect_to`.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
}

/// Where a signed-in visitor lands.
const fn home_for(is_admin: bool) -> &'static str {
    if is_admin { "/admin" } else { "/" }
}

/// Display the login page, or skip it when already signed in.
#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(auth): OptionalAuth,
) -> Response {
    if let Some(auth) = auth {
        return Redirect::to(home_for(auth.is_admin())).into_response();
    }

    LoginTemplate {
        page: PageContext::load(&session, &state, nonce).await,
    }
    .into_response()
}

/// Start sign-in with the provider.
///
/// # Route
///
/// `GET /auth/login`
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let oauth_state = generate_random_string(32);
    let pkce = PkcePair::generate();

    session.insert(session_keys::OAUTH_STATE, &oauth_state).await?;
    session.insert(session_keys::OAUTH_VERIFIER, &pkce.verifier).await?;

    let redirect_to = format!(
        "{}/auth/callback?state={oauth_state}",
        state.config().base_url
    );
    let url = state
        .auth()
        .authorization_url(&redirect_to, &pkce.challenge)
        .map_err(|e| AppError::Internal(format!("invalid auth URL: {e}")))?;

    Ok(Redirect::to(&url).into_response())
}

/// Send the visitor back to the login page with a notice.
async fn login_failed(session: &Session, message: &str) -> Response {
    Toast::error(message).queue(session).await;
    Redirect::to("/login").into_response()
}

/// Handle the provider callback.
///
/// # Route
///
/// `GET /auth/callback`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "Provider denied sign-in");
        return login_failed(&session, "Sign-in was cancelled.").await;
    }

    let Some(code) = query.code else {
        tracing::warn!("Callback missing code");
        return login_failed(&session, "Sign-in failed, please try again.").await;
    };

    let stored_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await.ok().flatten();
    let verifier: Option<String> = session
        .remove(session_keys::OAUTH_VERIFIER)
        .await
        .ok()
        .flatten();

    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!(error = %AuthError::StateMismatch, "Rejected callback");
        return login_failed(&session, "Sign-in session expired, please try again.").await;
    }
    let Some(verifier) = verifier else {
        tracing::warn!(error = %AuthError::InvalidSessionState, "Rejected callback");
        return login_failed(&session, "Sign-in session expired, please try again.").await;
    };

    let mut auth = match state.auth().exchange_code(&code, &verifier).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!(error = %e, "Failed to exchange authorization code");
            return login_failed(&session, "Sign-in failed, please try again.").await;
        }
    };

    match state.backend().me(&auth.access_token).await {
        Ok(profile) => {
            auth.role = profile.role;
            auth.full_name = profile.full_name;
        }
        Err(e) => tracing::warn!(error = %e, "Profile lookup failed, continuing as buyer"),
    }

    if let Err(e) = session.cycle_id().await {
        tracing::warn!(error = %e, "Failed to rotate session id");
    }
    if let Err(e) = set_auth_session(&session, &auth).await {
        tracing::error!(error = %e, "Failed to store sign-in");
        return login_failed(&session, "Sign-in failed, please try again.").await;
    }

    set_sentry_user(&auth.user_id, auth.email.as_deref());
    tracing::info!(user_id = %auth.user_id, role = %auth.role, "Signed in");

    Toast::success(format!("Welcome, {}!", auth.display_name()))
        .queue(&session)
        .await;
    Redirect::to(home_for(auth.is_admin())).into_response()
}

/// Sign out.
///
/// Revokes the token at the provider (best effort), empties the cart and
/// destroys the session.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Response {
    if let Some(auth) = auth
        && let Err(e) = state.auth().sign_out(&auth.access_token).await
    {
        tracing::warn!(error = %e, "Failed to revoke token");
    }

    match open_cart(&session, &state).await {
        Ok(mut cart) => {
            if let Err(e) = cart.clear().await {
                tracing::warn!(error = %e, "Failed to clear cart");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to open cart"),
    }

    if let Err(e) = clear_auth_session(&session).await {
        tracing::error!(error = %e, "Failed to clear sign-in");
    }
    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to flush session");
    }
    clear_sentry_user();

    Toast::info("You have been signed out.").queue(&session).await;
    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_page_depends_on_role() {
        assert_eq!(home_for(true), "/admin");
        assert_eq!(home_for(false), "/");
    }
}
