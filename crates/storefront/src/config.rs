//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (used for OAuth redirects)
//! - `AUTH_URL` - Base URL of the hosted authentication provider
//! - `AUTH_ANON_KEY` - Public API key for the authentication provider
//! - `PAYMENT_CLIENT_KEY` - Client key passed to the payment widget script
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_API_URL` - Backend REST API base (default: `https://backend-ecommerc.vercel.app/api`)
//! - `AUTH_PROVIDER` - OAuth provider used for sign-in (default: google)
//! - `PAYMENT_SNAP_URL` - Payment widget script (default: sandbox snap.js)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_BACKEND_API_URL: &str = "https://backend-ecommerc.vercel.app/api";
const DEFAULT_SNAP_URL: &str = "https://app.sandbox.midtrans.com/snap/snap.js";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Backend REST API configuration
    pub backend: BackendConfig,
    /// Authentication provider configuration
    pub auth: AuthConfig,
    /// Payment widget configuration
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
}

/// Backend REST API configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL every API path is appended to, without trailing slash.
    pub api_url: String,
}

/// Authentication provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AuthConfig {
    /// Provider base URL (e.g., `https://project.supabase.co`)
    pub url: String,
    /// API key sent with every provider request
    pub anon_key: SecretString,
    /// OAuth provider used for sign-in (e.g., "google")
    pub provider: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("provider", &self.provider)
            .finish()
    }
}

/// Payment widget configuration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Client key the widget script is loaded with (safe to expose in browser)
    pub client_key: String,
    /// URL of the widget script
    pub snap_url: String,
}

impl PaymentConfig {
    /// Origin of the widget script, for the content security policy.
    #[must_use]
    pub fn script_origin(&self) -> Option<String> {
        let url = url::Url::parse(&self.snap_url).ok()?;
        Some(url.origin().ascii_serialization())
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_validated_url("STOREFRONT_BASE_URL")?;

        let backend = BackendConfig::from_env()?;
        let auth = AuthConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            auth,
            payment,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = match get_optional_env("BACKEND_API_URL") {
            Some(_) => get_validated_url("BACKEND_API_URL")?,
            None => DEFAULT_BACKEND_API_URL.to_string(),
        };
        Ok(Self { api_url })
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_validated_url("AUTH_URL")?,
            anon_key: get_validated_secret("AUTH_ANON_KEY")?,
            provider: get_env_or_default("AUTH_PROVIDER", "google"),
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let snap_url = match get_optional_env("PAYMENT_SNAP_URL") {
            Some(_) => get_validated_url("PAYMENT_SNAP_URL")?,
            None => DEFAULT_SNAP_URL.to_string(),
        };
        Ok(Self {
            client_key: get_required_env("PAYMENT_CLIENT_KEY")?,
            snap_url,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a required absolute http(s) URL, with any trailing slash removed.
fn get_validated_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    normalize_url(&value).map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

/// Check that `value` is an absolute http(s) URL and strip trailing slashes.
fn normalize_url(value: &str) -> Result<String, String> {
    let parsed = url::Url::parse(value.trim()).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend: BackendConfig {
                api_url: DEFAULT_BACKEND_API_URL.to_string(),
            },
            auth: AuthConfig {
                url: "https://auth.local".to_string(),
                anon_key: SecretString::from("anon"),
                provider: "google".to_string(),
            },
            payment: PaymentConfig {
                client_key: "SB-Mid-client-abc".to_string(),
                snap_url: DEFAULT_SNAP_URL.to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-anon-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.k3Q9", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://backend.local/api/").unwrap(),
            "https://backend.local/api"
        );
        assert!(normalize_url("ftp://backend.local").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_script_origin() {
        let config = test_config();
        assert_eq!(
            config.payment.script_origin().as_deref(),
            Some("https://app.sandbox.midtrans.com")
        );
        assert!(!config.is_secure());
    }

    #[test]
    fn test_auth_config_debug_redacts_secrets() {
        let config = AuthConfig {
            url: "https://auth.local".to_string(),
            anon_key: SecretString::from("super_secret_anon_key"),
            provider: "google".to_string(),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("https://auth.local"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_anon_key"));
    }
}
