//! # Deadline Policy
//!
//! Overdue, duration and expiry predicates derived from stored timestamps
//! and the caller's `now`. These are recomputed on every read and are never
//! written back to a record: a stored "is overdue" flag would go stale the
//! moment the clock or the status moved.

use crate::temporal::Timestamp;

/// Window used by [`is_expiring_soon`] unless a caller configures another.
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// True iff `deadline` is set, strictly in the past, and `status` is not
/// one of `terminal`.
pub fn is_overdue<S: PartialEq>(
    deadline: Option<Timestamp>,
    status: &S,
    terminal: &[S],
    now: Timestamp,
) -> bool {
    match deadline {
        Some(deadline) => now > deadline && !terminal.contains(status),
        None => false,
    }
}

/// Whole days elapsed from `start` to `end` (or to `now` while `end` is
/// unset), floored. Zero when `start` is unset.
pub fn duration_days(start: Option<Timestamp>, end: Option<Timestamp>, now: Timestamp) -> i64 {
    match start {
        Some(start) => start.days_until(end.unwrap_or(now)),
        None => 0,
    }
}

/// Whole days from `now` until `t`, floored. Negative once `t` has passed.
pub fn days_until(t: Timestamp, now: Timestamp) -> i64 {
    now.days_until(t)
}

/// True iff `expiry` is set and falls within `[0, window_days]` days of `now`.
pub fn is_expiring_within(expiry: Option<Timestamp>, now: Timestamp, window_days: i64) -> bool {
    expiry.is_some_and(|t| (0..=window_days).contains(&days_until(t, now)))
}

/// [`is_expiring_within`] using the standard 30-day window.
pub fn is_expiring_soon(expiry: Option<Timestamp>, now: Timestamp) -> bool {
    is_expiring_within(expiry, now, EXPIRING_SOON_DAYS)
}
