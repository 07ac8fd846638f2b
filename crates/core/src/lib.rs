//! 56 Thrift Shop Core - Shared types library.
//!
//! This crate provides the types shared by the storefront and its tests:
//! - `storefront` - Public storefront and admin panel (server-rendered)
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! The backend service owns the data; these types mirror what it returns.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, order statuses, roles and couriers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
