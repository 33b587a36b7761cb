//! # Error Types
//!
//! Stateless precondition failures shared by every crate in the workspace.
//! All errors use `thiserror` for derive-based `Display` and `Error`.
//!
//! ## Design
//!
//! - Validation errors name the offending field so a caller can point at it.
//! - Every error in the workspace maps onto an [`ErrorClass`], which is the
//!   only thing a caller needs to decide between correcting input, retrying,
//!   or giving up on a record that reached a terminal business state.

use thiserror::Error;

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller input is wrong; fix it and resubmit. Never retried automatically.
    Input,
    /// Lost a race with a concurrent writer; the same request may succeed later.
    Transient,
    /// The record is in a business state that refuses the request.
    Terminal,
    /// Storage or serialization failure outside the caller's control.
    Internal,
}

impl ErrorClass {
    /// Returns the snake_case identifier for this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Transient => "transient",
            Self::Terminal => "terminal",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input violated a stateless precondition (negative amount, rate outside
/// 0–100, rating outside 1–5, malformed code, past expiry date).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the violated rule.
    pub message: String,
}

impl ValidationError {
    /// Build a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Validation errors are always the caller's to fix.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Input
    }
}
