//! # Store Errors
//!
//! Failures of persistence operations. Lifecycle refusals raised by the
//! record closures pass through unchanged inside [`StoreError::Lifecycle`].

use thiserror::Error;
use uuid::Uuid;

use shop_core::{EntityKind, ErrorClass, ValidationError};
use shop_state::LifecycleError;

/// Errors raised by record stores and the operations over them.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique column already holds `value`. Retried internally by code
    /// generation.
    #[error("{kind} {field} {value:?} already exists")]
    Conflict {
        /// Entity kind.
        kind: EntityKind,
        /// Unique column that collided (`code`, `license_key`, `id`).
        field: &'static str,
        /// The colliding value.
        value: String,
    },

    /// Every code generation attempt collided.
    #[error("could not allocate a unique {kind} code after {attempts} attempts")]
    CodeGenerationExhausted {
        /// Entity kind.
        kind: EntityKind,
        /// Attempts made.
        attempts: u32,
    },

    /// No record with the given key.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// The key looked up (id, code or license key).
        key: String,
    },

    /// The record refused the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Database driver failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored record JSON could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        Self::Lifecycle(LifecycleError::Validation(err))
    }
}

impl StoreError {
    /// Not-found error for a record id.
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound {
            kind,
            key: id.to_string(),
        }
    }

    /// How a caller should react.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Conflict { .. } | Self::CodeGenerationExhausted { .. } => ErrorClass::Transient,
            Self::NotFound { .. } => ErrorClass::Input,
            Self::Lifecycle(e) => e.class(),
            Self::Database(_) | Self::Serialization(_) => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        let conflict = StoreError::Conflict {
            kind: EntityKind::License,
            field: "license_key",
            value: "A1B2-C3D4-E5F6-G7H8".into(),
        };
        assert_eq!(conflict.class(), ErrorClass::Transient);
        let exhausted = StoreError::CodeGenerationExhausted {
            kind: EntityKind::Bill,
            attempts: 5,
        };
        assert_eq!(exhausted.to_string(), "could not allocate a unique bill code after 5 attempts");
        let lock: StoreError = LifecycleError::LicenseRevoked {
            license_number: "LIC2025010001".into(),
        }
        .into();
        assert_eq!(lock.class(), ErrorClass::Terminal);
        let invalid: StoreError = ValidationError::new("days", "must be at least 1").into();
        assert_eq!(invalid.class(), ErrorClass::Input);
    }
}
