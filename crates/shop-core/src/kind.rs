//! # Entity Kind: Single Source of Truth
//!
//! The four lifecycle entity kinds and their code prefixes. Every `match`
//! on `EntityKind` is exhaustive, so adding a kind forces every prefix
//! lookup, transition table and storage table to handle it.
//!
//! | Kind | Prefix | Example code |
//! |------|--------|--------------|
//! | Repair | `RPR` | `RPR2025010007` |
//! | Bill | `BILL` | `BILL2025010001` |
//! | Service | `SRV` | `SRV2025010042` |
//! | License | `LIC` | `LIC2025010003` |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;

/// A lifecycle entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Repair job on a purchased product.
    Repair,
    /// Bill for a service or purchase.
    Bill,
    /// Service visit or support engagement.
    Service,
    /// Software or product license.
    License,
}

impl EntityKind {
    /// All kinds in canonical order.
    pub fn all() -> &'static [EntityKind] {
        &[Self::Repair, Self::Bill, Self::Service, Self::License]
    }

    /// Code prefix for this kind. Part of the storage contract.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Repair => "RPR",
            Self::Bill => "BILL",
            Self::Service => "SRV",
            Self::License => "LIC",
        }
    }

    /// Returns the snake_case identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repair => "repair",
            Self::Bill => "bill",
            Self::Service => "service",
            Self::License => "license",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repair" => Ok(Self::Repair),
            "bill" => Ok(Self::Bill),
            "service" => Ok(Self::Service),
            "license" => Ok(Self::License),
            other => Err(ValidationError::new(
                "entity_kind",
                format!("unknown entity kind: {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_match_storage_contract() {
        assert_eq!(EntityKind::Repair.prefix(), "RPR");
        assert_eq!(EntityKind::Bill.prefix(), "BILL");
        assert_eq!(EntityKind::Service.prefix(), "SRV");
        assert_eq!(EntityKind::License.prefix(), "LIC");
    }

    #[test]
    fn prefixes_are_not_prefixes_of_each_other() {
        for a in EntityKind::all() {
            for b in EntityKind::all() {
                if a != b {
                    assert!(!a.prefix().starts_with(b.prefix()), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn as_str_roundtrip() {
        for kind in EntityKind::all() {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), *kind);
        }
        assert!("Repair".parse::<EntityKind>().is_err());
    }

    #[test]
    fn serde_matches_as_str() {
        for kind in EntityKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
