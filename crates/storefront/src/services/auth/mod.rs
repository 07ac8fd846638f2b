//! Client for the hosted authentication provider.
//!
//! Sign-in is an OAuth redirect with PKCE. The provider hands back a code,
//! which is exchanged for an access token and a refresh token. The storefront
//! never validates tokens itself; it forwards them to the backend as bearer
//! credentials.

mod error;
pub mod pkce;

pub use error::AuthError;
pub use pkce::{PkcePair, generate_random_string};

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use thriftshop_core::{Role, UserId};

use crate::config::AuthConfig;

/// Signed-in state kept in the visitor's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer accepted.
    pub expires_at: Option<i64>,
    pub user_id: UserId,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl AuthSession {
    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now().timestamp() >= expires_at - 60)
    }

    /// Whether the visitor may open the admin panel.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Name shown in the navbar.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Account")
    }
}

/// Token response from the provider's `/token` endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|seconds| Utc::now().timestamp() + seconds)
        });
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user_id: self.user.id,
            email: self.user.email,
            role: Role::Buyer,
            full_name: None,
        }
    }
}

/// Client for the authentication provider.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    provider: String,
}

impl AuthClient {
    /// Create a new authentication client.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            inner: Arc::new(AuthClientInner {
                client: reqwest::Client::new(),
                base_url: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
                provider: config.provider.clone(),
            }),
        }
    }

    /// URL to redirect the visitor to for sign-in.
    ///
    /// `redirect_to` must carry the CSRF state; the provider passes it back
    /// unchanged together with the authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL cannot be parsed.
    pub fn authorization_url(
        &self,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&format!("{}/auth/v1/authorize", self.inner.base_url))?;
        url.query_pairs_mut()
            .append_pair("provider", &self.inner.provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url.into())
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let url = format!(
            "{}/auth/v1/token?grant_type={grant_type}",
            self.inner.base_url
        );
        let response = self
            .inner
            .client
            .post(&url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &text));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_session())
    }

    /// Exchange an authorization code for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the code or verifier.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, AuthError> {
        self.token_request(
            "pkce",
            serde_json::json!({ "auth_code": code, "code_verifier": code_verifier }),
        )
        .await
    }

    /// Obtain a fresh access token.
    ///
    /// The returned session carries no role; callers copy it over from the
    /// previous session.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token was revoked or the request fails.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token_request(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Revoke the session at the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. Callers treat this as best
    /// effort and drop the local session regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.inner.base_url);
        let response = self
            .inner
            .client
            .post(&url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &text));
        }
        Ok(())
    }
}

fn provider_error(status: reqwest::StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.error_description.or(b.msg).or(b.message))
        .unwrap_or_else(|| body.chars().take(200).collect());
    AuthError::Provider { status, message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> AuthClient {
        AuthClient::new(&AuthConfig {
            url: "https://project.auth.example/".to_string(),
            anon_key: SecretString::from("k3Q9-anon-key-value-xyz".to_string()),
            provider: "google".to_string(),
        })
    }

    fn session(expires_at: Option<i64>) -> AuthSession {
        AuthSession {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at,
            user_id: UserId::new("u1"),
            email: Some("buyer@mail.test".to_string()),
            role: Role::Buyer,
            full_name: None,
        }
    }

    #[test]
    fn test_authorization_url() {
        let url = client()
            .authorization_url("http://localhost:3000/auth/callback?state=abc", "CH4LL")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".to_string(), "google".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "http://localhost:3000/auth/callback?state=abc".to_string()
        )));
        assert!(pairs.contains(&("code_challenge".to_string(), "CH4LL".to_string())));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "s256".to_string())));
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now().timestamp();
        assert!(!session(None).is_expired());
        assert!(!session(Some(now + 3600)).is_expired());
        assert!(session(Some(now + 30)).is_expired());
        assert!(session(Some(now - 10)).is_expired());
    }

    #[test]
    fn test_token_response_computes_expiry() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"token_type":"bearer","user":{"id":"u1","email":"x@y.z"}}"#,
        )
        .unwrap();
        let session = token.into_session();
        let expires_at = session.expires_at.unwrap();
        assert!((expires_at - Utc::now().timestamp() - 3600).abs() <= 5);
        assert_eq!(session.role, Role::Buyer);
        assert_eq!(session.display_name(), "x@y.z");
    }

    #[test]
    fn test_provider_error_message() {
        let err = provider_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid code verifier"}"#,
        );
        assert!(err.to_string().contains("Invalid code verifier"));
    }
}
