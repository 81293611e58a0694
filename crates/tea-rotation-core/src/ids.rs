//! Identifier types for the tea rotation.
//!
//! Users and sessions are keyed on UUIDs. Display names are never used as
//! identity, so every lookup and tie-break in the engine goes through these
//! types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines a `Copy` UUID newtype. Serializes as the bare hyphenated string and
/// orders by the UUID bytes, which is the tie-break the stores sort on.
macro_rules! uuid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap a UUID read back from storage.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// A fresh random (v4) id.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// The UUID to bind in queries.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        /// Accepts surrounding whitespace, as path segments and form fields
        /// sometimes carry it.
        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdError::InvalidUuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id_type!(UserId, "A participant identifier.");
uuid_id_type!(SessionId, "A tea session identifier.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}
