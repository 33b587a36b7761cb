//! # Record Codes
//!
//! Human-readable record codes of the form `<PREFIX><YYYYMM><NNNN>`, e.g.
//! `RPR2025010007`. The format is part of the storage contract and must stay
//! byte-compatible with codes already stored.
//!
//! ## Sequencing
//!
//! [`CodeSequencer`] is a pure function over the current state of the code
//! index: given the lexicographically greatest stored code in the
//! `<PREFIX><YYYYMM>` bucket it proposes the next one. It does not reserve
//! anything. The caller inserts the record under a unique constraint and
//! retries on conflict (see `shop-store::create_with_code`).
//!
//! A stored code whose suffix is not four digits is treated as corrupted:
//! instead of failing, sequencing scans forward from `0001` for the first
//! code nobody holds.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::kind::EntityKind;
use crate::temporal::Timestamp;

/// Number of digits in the sequence suffix.
pub const SEQUENCE_WIDTH: usize = 4;

/// Highest sequence number representable in a bucket.
pub const MAX_SEQUENCE: u32 = 9999;

const BUCKET_WIDTH: usize = 6;

/// A parsed record code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordCode {
    kind: EntityKind,
    bucket: String,
    sequence: u32,
}

impl RecordCode {
    /// Build a code from its parts.
    pub fn new(kind: EntityKind, bucket: &str, sequence: u32) -> Result<Self, ValidationError> {
        validate_bucket(bucket)?;
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ValidationError::new(
                "code",
                format!("sequence {sequence} outside 1..={MAX_SEQUENCE}"),
            ));
        }
        Ok(Self {
            kind,
            bucket: bucket.to_string(),
            sequence,
        })
    }

    /// Parse a code, inferring its kind from the prefix.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let kind = EntityKind::all()
            .iter()
            .copied()
            .find(|k| s.starts_with(k.prefix()))
            .ok_or_else(|| ValidationError::new("code", format!("unknown code prefix in {s:?}")))?;
        Self::parse_for(kind, s)
    }

    /// Parse a code that must belong to `kind`.
    pub fn parse_for(kind: EntityKind, s: &str) -> Result<Self, ValidationError> {
        let rest = s.strip_prefix(kind.prefix()).ok_or_else(|| {
            ValidationError::new(
                "code",
                format!("{s:?} does not start with {} prefix {:?}", kind, kind.prefix()),
            )
        })?;
        if rest.len() != BUCKET_WIDTH + SEQUENCE_WIDTH || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new(
                "code",
                format!("{s:?} must be {}YYYYMM followed by {SEQUENCE_WIDTH} digits", kind.prefix()),
            ));
        }
        let (bucket, seq) = rest.split_at(BUCKET_WIDTH);
        let sequence = seq
            .parse::<u32>()
            .map_err(|e| ValidationError::new("code", format!("bad sequence in {s:?}: {e}")))?;
        Self::new(kind, bucket, sequence)
    }

    /// The entity kind this code belongs to.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The `YYYYMM` bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The sequence number within the bucket.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The next code in the same bucket.
    pub fn successor(&self) -> Result<Self, ValidationError> {
        if self.sequence >= MAX_SEQUENCE {
            return Err(ValidationError::new(
                "code",
                format!(
                    "sequence exhausted for bucket {}{}",
                    self.kind.prefix(),
                    self.bucket
                ),
            ));
        }
        Self::new(self.kind, &self.bucket, self.sequence + 1)
    }
}

impl std::fmt::Display for RecordCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{:0width$}",
            self.kind.prefix(),
            self.bucket,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for RecordCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordCode {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RecordCode> for String {
    fn from(code: RecordCode) -> Self {
        code.to_string()
    }
}

fn validate_bucket(bucket: &str) -> Result<(), ValidationError> {
    let month = bucket
        .get(4..)
        .filter(|_| bucket.len() == BUCKET_WIDTH && bucket.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|m| m.parse::<u32>().ok());
    match month {
        Some(1..=12) => Ok(()),
        _ => Err(ValidationError::new("code", format!("invalid YYYYMM bucket {bucket:?}"))),
    }
}

// ─── Sequencer ───────────────────────────────────────────────────────

/// What the code index says about the next free code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeProposal {
    /// The successor of the greatest well-formed code (or `0001`).
    Next(RecordCode),
    /// The greatest code in the bucket has a malformed suffix; the caller
    /// must scan forward with [`CodeSequencer::first_unused`].
    Corrupted {
        /// The malformed code as stored.
        found: String,
    },
}

/// Generates codes scoped to an entity kind and a month bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSequencer;

impl CodeSequencer {
    /// `<PREFIX><YYYYMM>` for `kind` at `now`.
    pub fn bucket_prefix(kind: EntityKind, now: Timestamp) -> String {
        format!("{}{}", kind.prefix(), now.bucket())
    }

    /// The first code of the bucket containing `now`.
    pub fn first(kind: EntityKind, now: Timestamp) -> Result<RecordCode, ValidationError> {
        RecordCode::new(kind, &now.bucket(), 1)
    }

    /// Propose the next code given the greatest stored code in the bucket.
    ///
    /// `greatest` must carry the bucket prefix; anything else is rejected
    /// because it means the caller queried the wrong bucket.
    pub fn propose(
        kind: EntityKind,
        now: Timestamp,
        greatest: Option<&str>,
    ) -> Result<CodeProposal, ValidationError> {
        let Some(greatest) = greatest else {
            return Self::first(kind, now).map(CodeProposal::Next);
        };
        let prefix = Self::bucket_prefix(kind, now);
        if !greatest.starts_with(&prefix) {
            return Err(ValidationError::new(
                "code",
                format!("{greatest:?} is outside bucket {prefix:?}"),
            ));
        }
        match RecordCode::parse_for(kind, greatest) {
            Ok(code) => code.successor().map(CodeProposal::Next),
            Err(_) => Ok(CodeProposal::Corrupted {
                found: greatest.to_string(),
            }),
        }
    }

    /// Scan the bucket from `0001` and return the first code `is_taken`
    /// reports as free.
    pub fn first_unused(
        kind: EntityKind,
        now: Timestamp,
        mut is_taken: impl FnMut(&str) -> bool,
    ) -> Result<RecordCode, ValidationError> {
        let mut code = Self::first(kind, now)?;
        loop {
            if !is_taken(&code.to_string()) {
                return Ok(code);
            }
            code = code.successor()?;
        }
    }

    /// [`propose`](Self::propose), falling back to
    /// [`first_unused`](Self::first_unused) when the index is corrupted.
    pub fn generate(
        kind: EntityKind,
        now: Timestamp,
        greatest: Option<&str>,
        is_taken: impl FnMut(&str) -> bool,
    ) -> Result<RecordCode, ValidationError> {
        match Self::propose(kind, now, greatest)? {
            CodeProposal::Next(code) => Ok(code),
            CodeProposal::Corrupted { found } => {
                tracing::warn!(%kind, found = %found, "corrupted code suffix, scanning bucket for a free code");
                Self::first_unused(kind, now, is_taken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn jan() -> Timestamp {
        Timestamp::parse("2025-01-15T10:00:00Z").unwrap()
    }

    #[test]
    fn format_pads_sequence() {
        let code = RecordCode::new(EntityKind::Repair, "202501", 7).unwrap();
        assert_eq!(code.to_string(), "RPR2025010007");
        let code = RecordCode::new(EntityKind::Bill, "202512", 1234).unwrap();
        assert_eq!(code.to_string(), "BILL2025121234");
    }

    #[test]
    fn parse_infers_kind() {
        let code = RecordCode::parse("LIC2025010003").unwrap();
        assert_eq!(code.kind(), EntityKind::License);
        assert_eq!(code.bucket(), "202501");
        assert_eq!(code.sequence(), 3);
        assert_eq!(code.to_string(), "LIC2025010003");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(RecordCode::parse("RPR202501007").is_err());
        assert!(RecordCode::parse("RPR20250100071").is_err());
        assert!(RecordCode::parse("RPR202501ABCD").is_err());
        assert!(RecordCode::parse("RPR2025130001").is_err());
        assert!(RecordCode::parse("RPR2025010000").is_err());
        assert!(RecordCode::parse("XYZ2025010001").is_err());
        assert!(RecordCode::parse_for(EntityKind::Bill, "RPR2025010001").is_err());
    }

    #[test]
    fn empty_bucket_starts_at_one() {
        let proposal = CodeSequencer::propose(EntityKind::Repair, jan(), None).unwrap();
        assert_eq!(
            proposal,
            CodeProposal::Next(RecordCode::parse("RPR2025010001").unwrap())
        );
    }

    #[test]
    fn increments_greatest() {
        let proposal =
            CodeSequencer::propose(EntityKind::Repair, jan(), Some("RPR2025010007")).unwrap();
        assert_eq!(
            proposal,
            CodeProposal::Next(RecordCode::parse("RPR2025010008").unwrap())
        );
    }

    #[test]
    fn greatest_from_other_bucket_is_rejected() {
        assert!(CodeSequencer::propose(EntityKind::Repair, jan(), Some("RPR2024120009")).is_err());
    }

    #[test]
    fn corrupted_suffix_scans_forward() {
        let taken: BTreeSet<&str> = ["BILL2025010001", "BILL2025010002", "BILL202501XY12"]
            .into_iter()
            .collect();
        let proposal =
            CodeSequencer::propose(EntityKind::Bill, jan(), Some("BILL202501XY12")).unwrap();
        assert!(matches!(proposal, CodeProposal::Corrupted { .. }));

        let code = CodeSequencer::generate(EntityKind::Bill, jan(), Some("BILL202501XY12"), |c| {
            taken.contains(c)
        })
        .unwrap();
        assert_eq!(code.to_string(), "BILL2025010003");
    }

    #[test]
    fn exhausted_bucket_is_an_error() {
        assert!(CodeSequencer::propose(EntityKind::Service, jan(), Some("SRV2025019999")).is_err());
        assert!(CodeSequencer::first_unused(EntityKind::Service, jan(), |_| true).is_err());
    }

    #[test]
    fn serde_as_string() {
        let code = RecordCode::parse("RPR2025010007").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"RPR2025010007\"");
        let parsed: RecordCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, code);
        assert!(serde_json::from_str::<RecordCode>("\"RPR20250100\"").is_err());
    }
}
