//! # Record Identity Newtypes
//!
//! Newtype wrappers for the surrogate key of each lifecycle record. These
//! prevent identifier confusion: a `BillId` cannot be passed where a
//! `LicenseId` is expected. Human-readable codes live in [`crate::code`];
//! these UUIDs are the storage keys and never change after creation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

record_id!(
    /// Unique identifier for a repair job.
    RepairId
);
record_id!(
    /// Unique identifier for a bill.
    BillId
);
record_id!(
    /// Unique identifier for a service engagement.
    ServiceId
);
record_id!(
    /// Unique identifier for a license.
    LicenseId
);
