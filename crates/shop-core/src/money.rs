//! # Money and Rates
//!
//! Currency amounts are fixed-point integers in cents and percentage rates
//! are integers in basis points (1% = 100 bps). Floats never touch an
//! amount. Both types serialize as decimal strings (`"1050.00"`, `"10.00"`)
//! matching the two-decimal columns the records are stored in.
//!
//! ## Bill arithmetic
//!
//! [`BillTotals::recompute`] derives tax, discount and total from a
//! subtotal and two rates:
//!
//! ```text
//! tax_amount      = round_half_up(subtotal × tax_rate / 100)
//! discount_amount = round_half_up(subtotal × discount_rate / 100)
//! total           = subtotal + tax_amount − discount_amount
//! ```
//!
//! The products are exact (cents × bps in `i128`) and each derived amount
//! is rounded once, when it becomes a stored value. `total` is assembled
//! from the stored amounts, so `total == subtotal + tax_amount −
//! discount_amount` holds to the cent.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const BPS_PER_UNIT: i128 = 10_000;

/// Upper bound for any rate: 100%.
pub const MAX_RATE_BPS: i64 = 10_000;

/// A currency amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Build an amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount in cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Parse `"1000"`, `"1000.5"` or `"1000.50"`. More than two decimal
    /// places is an error, not a silent truncation.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_fixed2(s)
            .map(Self)
            .ok_or_else(|| ValidationError::new("amount", format!("{s:?} is not an amount with at most 2 decimals")))
    }

    /// Whether the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Checked multiplication by a quantity.
    pub fn checked_mul(self, qty: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(qty)).map(Money)
    }

    /// Reject negative amounts for `field`.
    pub fn require_non_negative(self, field: &str) -> Result<Money, ValidationError> {
        if self.is_negative() {
            return Err(ValidationError::new(field, format!("{self} must not be negative")));
        }
        Ok(self)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed2(self.0))
    }
}

impl TryFrom<String> for Money {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Money> for String {
    fn from(m: Money) -> Self {
        m.to_string()
    }
}

/// A percentage rate in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rate(i64);

impl Rate {
    /// 0%.
    pub const ZERO: Rate = Rate(0);

    /// Build a rate from basis points.
    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    /// Build a rate from whole percent.
    pub const fn from_percent(pct: i64) -> Self {
        Self(pct * 100)
    }

    /// The rate in basis points.
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Parse a percentage such as `"10"`, `"7.5"` or `"12.25"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_fixed2(s)
            .map(Self)
            .ok_or_else(|| ValidationError::new("rate", format!("{s:?} is not a percentage with at most 2 decimals")))
    }

    /// Reject rates outside 0–100% for `field`.
    pub fn require_percentage(self, field: &str) -> Result<Rate, ValidationError> {
        if !(0..=MAX_RATE_BPS).contains(&self.0) {
            return Err(ValidationError::new(field, format!("{self}% must be between 0 and 100")));
        }
        Ok(self)
    }

    /// `amount × rate`, rounded half-up to the cent.
    ///
    /// Callers guarantee a non-negative amount and a validated rate, so the
    /// exact product is non-negative and the bias term rounds half-up.
    fn apply(self, amount: Money) -> Option<Money> {
        let exact = i128::from(amount.0) * i128::from(self.0);
        let rounded = (exact + BPS_PER_UNIT / 2).div_euclid(BPS_PER_UNIT);
        i64::try_from(rounded).ok().map(Money)
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed2(self.0))
    }
}

impl TryFrom<String> for Rate {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Rate> for String {
    fn from(r: Rate) -> Self {
        r.to_string()
    }
}

// ─── Bill arithmetic ─────────────────────────────────────────────────

/// Derived amounts of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTotals {
    /// Amount before tax and discount.
    pub subtotal: Money,
    /// `subtotal × tax_rate`, rounded.
    pub tax_amount: Money,
    /// `subtotal × discount_rate`, rounded.
    pub discount_amount: Money,
    /// `subtotal + tax_amount − discount_amount`.
    pub total: Money,
}

impl BillTotals {
    /// Derive the bill amounts.
    ///
    /// Preconditions: `subtotal ≥ 0`, both rates within 0–100%. Violations
    /// are reported against the offending field.
    pub fn recompute(subtotal: Money, tax_rate: Rate, discount_rate: Rate) -> Result<Self, ValidationError> {
        let subtotal = subtotal.require_non_negative("subtotal")?;
        let tax_rate = tax_rate.require_percentage("tax_rate")?;
        let discount_rate = discount_rate.require_percentage("discount_rate")?;

        let overflow = || ValidationError::new("subtotal", format!("{subtotal} is too large"));
        let tax_amount = tax_rate.apply(subtotal).ok_or_else(overflow)?;
        let discount_amount = discount_rate.apply(subtotal).ok_or_else(overflow)?;
        let total = subtotal
            .checked_add(tax_amount)
            .and_then(|m| m.checked_sub(discount_amount))
            .ok_or_else(overflow)?;

        Ok(Self {
            subtotal,
            tax_amount,
            discount_amount,
            total,
        })
    }
}

// ─── Fixed-point helpers ─────────────────────────────────────────────

/// Parse a decimal string with at most two fractional digits into
/// hundredths. Returns `None` on malformed input or overflow.
fn parse_fixed2(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty()
        || frac_part.len() > 2
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
        || (digits.contains('.') && frac_part.is_empty())
    {
        return None;
    }
    let whole = int_part.parse::<i64>().ok()?;
    let frac = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse::<i64>().ok()?,
    };
    let magnitude = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Format hundredths as a decimal string with exactly two fractional digits.
fn format_fixed2(hundredths: i64) -> String {
    let sign = if hundredths < 0 { "-" } else { "" };
    let abs = hundredths.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
