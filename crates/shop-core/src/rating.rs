//! Customer ratings bounded to one through five stars.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A 1–5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// Validate a rating for `field`.
    pub fn new(field: &str, stars: i64) -> Result<Self, ValidationError> {
        match u8::try_from(stars) {
            Ok(s) if (Self::MIN..=Self::MAX).contains(&s) => Ok(Self(s)),
            _ => Err(ValidationError::new(
                field,
                format!("{stars} must be between {} and {}", Self::MIN, Self::MAX),
            )),
        }
    }

    /// Number of stars.
    pub fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(stars: u8) -> Result<Self, Self::Error> {
        Self::new("rating", i64::from(stars))
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self {
        r.0
    }
}
