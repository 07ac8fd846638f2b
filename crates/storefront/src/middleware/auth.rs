//! Authentication extractors.
//!
//! The signed-in state is an [`AuthSession`] stored in the visitor's session.
//! Extractors refresh an expired access token when a refresh token is
//! available; otherwise the visitor counts as signed out.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::htmx::{self, HxRequest};
use crate::models::{Toast, session_keys};
use crate::services::auth::AuthSession;
use crate::state::AppState;

/// Extractor that requires a signed-in visitor.
///
/// If the visitor is not signed in, a notice is queued and the request is
/// redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(auth): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", auth.display_name())
/// }
/// ```
pub struct RequireAuth(pub AuthSession);

/// Extractor that requires a signed-in visitor whose profile role is admin.
///
/// The role is looked up from the backend on every request, so revoking
/// admin access takes effect immediately.
pub struct RequireAdmin(pub AuthSession);

/// Error returned when the visitor may not access a route.
pub enum AuthRejection {
    /// Send the visitor elsewhere (login page, or home for non-admins).
    Redirect { to: &'static str, htmx: bool },
    /// No session layer on this route.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect { to, htmx } => htmx::redirect(htmx, to),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Read the signed-in state, refreshing an expired token.
///
/// Drops the stored state when it cannot be refreshed.
pub async fn current_auth(session: &Session, state: &AppState) -> Option<AuthSession> {
    let auth: AuthSession = session
        .get(session_keys::AUTH)
        .await
        .ok()
        .flatten()?;

    if !auth.is_expired() {
        return Some(auth);
    }

    let refreshed = match auth.refresh_token.as_deref() {
        Some(refresh_token) => state.auth().refresh(refresh_token).await,
        None => Err(crate::services::auth::AuthError::Expired),
    };

    match refreshed {
        Ok(mut fresh) => {
            fresh.role = auth.role;
            fresh.full_name = auth.full_name;
            if let Err(e) = set_auth_session(session, &fresh).await {
                tracing::warn!(error = %e, "Failed to store refreshed session");
            }
            tracing::debug!(user_id = %fresh.user_id, "Refreshed access token");
            Some(fresh)
        }
        Err(e) => {
            tracing::info!(error = %e, "Session expired");
            if let Err(e) = clear_auth_session(session).await {
                tracing::warn!(error = %e, "Failed to clear expired session");
            }
            None
        }
    }
}

async fn require_auth(parts: &mut Parts, state: &AppState) -> Result<(Session, AuthSession), AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthRejection::Unauthorized)?;
    let HxRequest(htmx) = HxRequest::from_parts(parts);

    match current_auth(&session, state).await {
        Some(auth) => Ok((session, auth)),
        None => {
            Toast::warning("Please sign in first.").queue(&session).await;
            Err(AuthRejection::Redirect { to: "/login", htmx })
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (_, auth) = require_auth(parts, state).await?;
        Ok(Self(auth))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (session, mut auth) = require_auth(parts, state).await?;
        let HxRequest(htmx) = HxRequest::from_parts(parts);

        match state.backend().me(&auth.access_token).await {
            Ok(profile) if profile.role.is_admin() => {
                if !auth.is_admin() || auth.full_name != profile.full_name {
                    auth.role = profile.role;
                    auth.full_name = profile.full_name;
                    if let Err(e) = set_auth_session(&session, &auth).await {
                        tracing::warn!(error = %e, "Failed to store refreshed role");
                    }
                }
                Ok(Self(auth))
            }
            Ok(_) => {
                tracing::warn!(user_id = %auth.user_id, "Non-admin tried to open the admin panel");
                Toast::error("Access denied.").queue(&session).await;
                Err(AuthRejection::Redirect { to: "/", htmx })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Role lookup failed");
                Toast::error("Access denied.").queue(&session).await;
                Err(AuthRejection::Redirect { to: "/", htmx })
            }
        }
    }
}

/// Extractor that optionally gets the signed-in state.
///
/// Unlike `RequireAuth`, this does not reject the request if the visitor is
/// not signed in.
pub struct OptionalAuth(pub Option<AuthSession>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = match parts.extensions.get::<Session>() {
            Some(session) => current_auth(session, state).await,
            None => None,
        };
        Ok(Self(auth))
    }
}

/// Helper to store the signed-in state in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_auth_session(
    session: &Session,
    auth: &AuthSession,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH, auth).await
}

/// Helper to clear the signed-in state from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_auth_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<AuthSession>(session_keys::AUTH).await?;
    Ok(())
}
