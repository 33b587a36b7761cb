//! # License Keys
//!
//! Activation keys of the form `A1B2-C3D4-E5F6-G7H8`: four groups of four
//! uppercase alphanumeric characters. Keys are random, not sequential;
//! uniqueness is enforced by the store, and a colliding key is regenerated.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// A validated license key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Draw a fresh key from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let groups: Vec<String> = (0..GROUPS)
            .map(|_| {
                (0..GROUP_LEN)
                    .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
                    .collect()
            })
            .collect();
        Self(groups.join("-"))
    }

    /// Validate a key supplied by a caller.
    ///
    /// Lowercase input is rejected rather than normalized: keys are compared
    /// byte-for-byte against stored keys.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let groups: Vec<&str> = s.split('-').collect();
        let well_formed = groups.len() == GROUPS
            && groups.iter().all(|g| {
                g.len() == GROUP_LEN && g.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            });
        if !well_formed {
            return Err(ValidationError::new(
                "license_key",
                format!("{s:?} is not four hyphen-separated groups of four A-Z/0-9 characters"),
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LicenseKey {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_keys_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let key = LicenseKey::generate(&mut rng);
            assert_eq!(key.as_str().len(), 19);
            assert!(LicenseKey::parse(key.as_str()).is_ok(), "{key}");
        }
    }

    #[test]
    fn generation_is_not_constant() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = LicenseKey::generate(&mut rng);
        let b = LicenseKey::generate(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(LicenseKey::parse("A1B2-C3D4-E5F6-G7H8").is_ok());
        assert!(LicenseKey::parse("a1b2-c3d4-e5f6-g7h8").is_err());
        assert!(LicenseKey::parse("A1B2-C3D4-E5F6").is_err());
        assert!(LicenseKey::parse("A1B2C3D4E5F6G7H8").is_err());
        assert!(LicenseKey::parse("A1B2-C3D4-E5F6-G7H").is_err());
        assert!(LicenseKey::parse("A1B2-C3D4-E5F6-G7H!").is_err());
    }
}
