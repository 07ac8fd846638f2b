//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while signing a visitor in or out.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider refused the request.
    #[error("provider rejected request ({status}): {message}")]
    Provider {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The callback's `state` does not match the one stored at login.
    #[error("invalid OAuth state")]
    StateMismatch,

    /// Session state missing or invalid (no verifier stored, no code).
    #[error("invalid session state")]
    InvalidSessionState,

    /// The stored token expired and cannot be refreshed.
    #[error("session expired")]
    Expired,
}
