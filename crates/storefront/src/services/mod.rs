//! Services the storefront talks to besides the backend API.
//!
//! - `auth` - Hosted authentication provider (OAuth + PKCE sign-in)

pub mod auth;
