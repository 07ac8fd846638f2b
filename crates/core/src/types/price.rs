//! Rupiah price representation.
//!
//! The backend reports prices, totals and shipping costs as plain JSON
//! numbers in whole Rupiah. Rupiah has no minor unit in practice, so the
//! amount is kept as an `i64`. Fractional numbers coming off the wire are
//! rounded to the nearest Rupiah.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A price in whole Rupiah.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Zero Rupiah.
    pub const ZERO: Self = Self(0);

    /// Create a price from a whole Rupiah amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// The amount in whole Rupiah.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Line total for `quantity` units, saturating on overflow.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Format for display, e.g. `Rp 20.000`.
    #[must_use]
    pub fn display(&self) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            format!("-Rp {grouped}")
        } else {
            format!("Rp {grouped}")
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Price {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PriceVisitor;

        impl Visitor<'_> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a Rupiah amount as a number or numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
                Ok(Price(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
                i64::try_from(v)
                    .map(Price)
                    .map_err(|_| E::custom(format!("price out of range: {v}")))
            }

            #[allow(clippy::cast_possible_truncation)] // Rupiah amounts are far below i64::MAX
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
                if v.is_finite() {
                    Ok(Price(v.round() as i64))
                } else {
                    Err(E::custom("price must be finite"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
                let trimmed = v.trim();
                if let Ok(amount) = trimmed.parse::<i64>() {
                    return Ok(Price(amount));
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| E::custom(format!("invalid price: {v}")))
                    .and_then(|f| self.visit_f64(f))
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}
