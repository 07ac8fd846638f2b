//! Shipping carriers offered at checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a courier code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown courier: {0}")]
pub struct CourierError(pub String);

/// A carrier the backend can quote freight for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Courier {
    #[default]
    Jne,
    Sicepat,
    Jnt,
    Ninja,
    Lion,
}

impl Courier {
    /// All couriers, in the order the selector lists them.
    pub const ALL: [Self; 5] = [Self::Jne, Self::Sicepat, Self::Jnt, Self::Ninja, Self::Lion];

    /// Code sent to the backend.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Jne => "jne",
            Self::Sicepat => "sicepat",
            Self::Jnt => "jnt",
            Self::Ninja => "ninja",
            Self::Lion => "lion",
        }
    }

    /// Human-readable name for the selector.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Jne => "JNE (Reguler)",
            Self::Sicepat => "SiCepat",
            Self::Jnt => "J&T Express",
            Self::Ninja => "Ninja Xpress",
            Self::Lion => "Lion Parcel",
        }
    }
}

impl std::fmt::Display for Courier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Courier {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|courier| courier.code() == code)
            .ok_or_else(|| CourierError(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!("jne".parse::<Courier>().unwrap(), Courier::Jne);
        assert_eq!(" SiCepat ".parse::<Courier>().unwrap(), Courier::Sicepat);
        assert_eq!(
            "pos".parse::<Courier>().unwrap_err(),
            CourierError("pos".to_string())
        );
    }

    #[test]
    fn test_default_is_jne() {
        assert_eq!(Courier::default(), Courier::Jne);
        assert_eq!(serde_json::to_string(&Courier::Jnt).unwrap(), "\"jnt\"");
    }
}
