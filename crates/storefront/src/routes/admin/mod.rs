//! Admin panel route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! which re-checks the profile role with the backend on each request.

pub mod dashboard;
pub mod orders;
pub mod products;
