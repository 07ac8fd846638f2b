//! Newtype IDs for type-safe entity references.
//!
//! The backend hands out opaque string identifiers for products and orders,
//! and small integers for the shipping location hierarchy. Use the
//! `define_id!` macro to create wrappers that prevent mixing them up.

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use thriftshop_core::define_id;
/// define_id!(ProductId);
/// define_id!(OrderId);
///
/// let product_id = ProductId::new("a1");
/// let order_id = OrderId::new("a1");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = order_id;
/// assert_eq!(product_id.as_str(), order_id.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(UserId);

/// Identifier of a province, city or district in the shipping hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(i64);

impl LocationId {
    /// Create a new location ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LocationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<LocationId> for i64 {
    fn from(id: LocationId) -> Self {
        id.0
    }
}

impl std::str::FromStr for LocationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_is_transparent_on_the_wire() {
        let id = ProductId::new("9f0c");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"9f0c\"");

        let parsed: OrderId = serde_json::from_str("\"ord-1\"").unwrap();
        assert_eq!(parsed.as_str(), "ord-1");
        assert_eq!(parsed.to_string(), "ord-1");
    }

    #[test]
    fn test_location_id_parses_form_values() {
        assert_eq!("12".parse::<LocationId>().unwrap(), LocationId::new(12));
        assert_eq!(" 7 ".parse::<LocationId>().unwrap(), LocationId::new(7));
        assert!("".parse::<LocationId>().is_err());
        assert!("abc".parse::<LocationId>().is_err());
    }

    #[test]
    fn test_location_id_json_number() {
        let id: LocationId = serde_json::from_str("31").unwrap();
        assert_eq!(id.as_i64(), 31);
        assert_eq!(serde_json::to_string(&id).unwrap(), "31");
    }
}
