//! Identifiers used across the domain.
//!
//! Identifiers are opaque strings. The id generator decides their shape and
//! persisted events carry them verbatim, so nothing here assumes UUIDs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an aggregate instance (unique within its aggregate type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

/// Owning tenant (organization) of an aggregate and all of its events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceOwner(String);

/// Identity of whoever issued a command; recorded as the editor of each event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw identifier, rejecting blank values.
            pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: must not be empty", $name)));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        // Unchecked: used when rehydrating values that were validated on write.
        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(AggregateId, "AggregateId");
impl_string_newtype!(ResourceOwner, "ResourceOwner");
impl_string_newtype!(ActorId, "ActorId");

impl From<&ResourceOwner> for AggregateId {
    /// Organization-scoped singletons (e.g. a login policy) use the
    /// organization id as their aggregate id.
    fn from(value: &ResourceOwner) -> Self {
        Self(value.0.clone())
    }
}

/// Source of unique identifiers for new aggregates.
///
/// Implementations must never hand out the same id twice over the lifetime of
/// the system.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> AggregateId;
}

/// Time-ordered UUIDv7 identifiers rendered without hyphens.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> AggregateId {
        AggregateId(Uuid::now_v7().simple().to_string())
    }
}
