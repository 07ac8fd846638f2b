//! Values the storefront keeps in the visitor's session.

pub mod session;
pub mod toast;

pub use session::keys as session_keys;
pub use session::visitor_key;
pub use toast::{Toast, ToastLevel};
