//! # Lifecycle Errors
//!
//! Refusals raised while validating or applying a change to a lifecycle
//! record. Every variant carries the entity kind and the offending
//! state/field so a caller can report it without re-reading the record.

use thiserror::Error;

use shop_core::{EntityKind, ErrorClass, Timestamp, ValidationError};

/// Errors raised by transitions, patches and the license engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The requested status change is not in the kind's transition table.
    #[error("invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        /// Entity kind.
        kind: EntityKind,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// The transition exists but only the system may perform it.
    #[error("{kind} transition {from} -> {to} is performed by the system only")]
    SystemOnlyTransition {
        /// Entity kind.
        kind: EntityKind,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// The record is in a state that locks `field` against changes.
    #[error("{kind} in state {state} does not accept changes to {field}")]
    TerminalFieldLock {
        /// Entity kind.
        kind: EntityKind,
        /// Current status.
        state: String,
        /// Field the caller tried to change.
        field: String,
    },

    /// An operation requires a different current status.
    #[error("cannot {operation} a {kind} in state {state}")]
    WrongState {
        /// Entity kind.
        kind: EntityKind,
        /// Operation that was refused.
        operation: &'static str,
        /// Current status.
        state: String,
    },

    /// Activation refused because the license period has ended.
    #[error("license {license_number} expired at {ex_date}")]
    LicenseExpired {
        /// License number.
        license_number: String,
        /// Stored expiry.
        ex_date: Timestamp,
    },

    /// Activation refused because the license was revoked.
    #[error("license {license_number} has been revoked")]
    LicenseRevoked {
        /// License number.
        license_number: String,
    },

    /// A custom renewal date that is not in the future.
    #[error("renewal date {date} must be after {now}")]
    InvalidRenewalDate {
        /// Requested expiry.
        date: Timestamp,
        /// Time of the request.
        now: Timestamp,
    },

    /// Stateless precondition failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl LifecycleError {
    /// How a caller should react.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidTransition { .. }
            | Self::SystemOnlyTransition { .. }
            | Self::WrongState { .. }
            | Self::InvalidRenewalDate { .. }
            | Self::Validation(_) => ErrorClass::Input,
            Self::TerminalFieldLock { .. } | Self::LicenseExpired { .. } | Self::LicenseRevoked { .. } => {
                ErrorClass::Terminal
            }
        }
    }
}
