//! # Stored Records
//!
//! The storage contract every lifecycle record satisfies: a UUID key, a
//! unique human-readable code, an optional unique secondary key and a
//! status string. Stores index these columns; the rest of the record is
//! opaque JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use shop_core::{EntityKind, RecordCode, Timestamp};
use shop_state::{Bill, License, Lifecycle, Repair, Service};

/// A record persisted by a [`crate::RecordStore`].
pub trait StoredRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity kind, which selects the table.
    const KIND: EntityKind;

    /// Name of the secondary unique column, if the kind has one.
    const SECONDARY_KEY: Option<&'static str> = None;

    /// Storage key.
    fn id(&self) -> Uuid;

    /// Unique human-readable code.
    fn code(&self) -> &RecordCode;

    /// Value of the secondary unique column.
    fn secondary_key(&self) -> Option<&str> {
        None
    }

    /// Status storage string.
    fn status(&self) -> &'static str;

    /// Creation time.
    fn created_at(&self) -> Timestamp;

    /// Last modification time.
    fn updated_at(&self) -> Timestamp;
}

impl StoredRecord for Repair {
    const KIND: EntityKind = EntityKind::Repair;

    fn id(&self) -> Uuid {
        self.id.0
    }

    fn code(&self) -> &RecordCode {
        &self.code
    }

    fn status(&self) -> &'static str {
        self.status.as_str()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

impl StoredRecord for Bill {
    const KIND: EntityKind = EntityKind::Bill;

    fn id(&self) -> Uuid {
        self.id.0
    }

    fn code(&self) -> &RecordCode {
        &self.code
    }

    fn status(&self) -> &'static str {
        self.status.as_str()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

impl StoredRecord for Service {
    const KIND: EntityKind = EntityKind::Service;

    fn id(&self) -> Uuid {
        self.id.0
    }

    fn code(&self) -> &RecordCode {
        &self.code
    }

    fn status(&self) -> &'static str {
        self.status.as_str()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

impl StoredRecord for License {
    const KIND: EntityKind = EntityKind::License;
    const SECONDARY_KEY: Option<&'static str> = Some("license_key");

    fn id(&self) -> Uuid {
        self.id.0
    }

    fn code(&self) -> &RecordCode {
        &self.license_number
    }

    fn secondary_key(&self) -> Option<&str> {
        Some(self.license_key.as_str())
    }

    fn status(&self) -> &'static str {
        self.status.as_str()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}
