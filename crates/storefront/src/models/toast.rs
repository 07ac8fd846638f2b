//! One-shot notices.
//!
//! A toast is queued in the session and shown by the next full page render,
//! or returned directly as an out-of-band fragment to HTMX requests.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::session_keys;

/// Severity, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl ToastLevel {
    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "toast-success",
            Self::Info => "toast-info",
            Self::Warning => "toast-warning",
            Self::Error => "toast-error",
        }
    }
}

/// A notice for the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }

    /// Queue this toast for the next page render.
    ///
    /// Failing to store a notice is logged and otherwise ignored.
    pub async fn queue(self, session: &Session) {
        let mut queued = session
            .get::<Vec<Self>>(session_keys::TOASTS)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        queued.push(self);
        if let Err(e) = session.insert(session_keys::TOASTS, queued).await {
            tracing::warn!(error = %e, "Failed to queue toast");
        }
    }

    /// Take every queued toast, leaving the queue empty.
    pub async fn drain(session: &Session) -> Vec<Self> {
        match session.remove::<Vec<Self>>(session_keys::TOASTS).await {
            Ok(toasts) => toasts.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read toasts");
                Vec::new()
            }
        }
    }
}
