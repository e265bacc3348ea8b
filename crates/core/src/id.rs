//! Strongly-typed document identifiers.
//!
//! Document keys are opaque strings (`"mixed-contents"`, `"1"`, a UUID...),
//! so the newtypes wrap `String` rather than `Uuid`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a container document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

/// Identifier of an inventory item document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw key. Use `str::parse` when the input is untrusted.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh time-ordered key (UUIDv7), the way a store
            /// assigns ids to documents inserted without one.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(ContainerId, "ContainerId");
impl_string_newtype!(InventoryItemId, "InventoryItemId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_ids() {
        assert!("".parse::<ContainerId>().is_err());
        assert!("   ".parse::<InventoryItemId>().is_err());
        assert_eq!("  lot-7 ".parse::<ContainerId>().unwrap().as_str(), "lot-7");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ContainerId::new("mixed-contents");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"mixed-contents\"");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(InventoryItemId::generate(), InventoryItemId::generate());
    }
}
