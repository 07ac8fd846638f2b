//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod courier;
pub mod id;
pub mod price;
pub mod status;

pub use courier::{Courier, CourierError};
pub use id::*;
pub use price::Price;
pub use status::*;
