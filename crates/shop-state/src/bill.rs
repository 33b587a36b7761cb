//! # Bill Lifecycle
//!
//! Bills for services and purchases, with derived tax/discount/total.
//!
//! ## States
//!
//! ```text
//! pending ──▶ paid (terminal, locks every field except notes)
//!    │  ▲
//!    │  └──── overdue ──▶ paid | cancelled
//!    │  (system only)
//!    └──▶ cancelled (terminal)
//! ```
//!
//! `pending → overdue` is never requested by a user; [`Bill::mark_overdue`]
//! performs it when the due date has passed.
//!
//! ## Derived amounts
//!
//! `tax_amount`, `discount_amount` and `total` are recomputed by
//! [`BillTotals::recompute`] inside the same mutation that writes
//! `subtotal`, `tax_rate` or `discount_rate`. They cannot be patched
//! directly.

use serde::{Deserialize, Serialize};

use shop_core::deadline;
use shop_core::{BillId, BillTotals, EntityKind, Money, Rate, RecordCode, Timestamp, ValidationError};

use crate::error::LifecycleError;
use crate::lifecycle::{self, Lifecycle, SideEffect, Transition, TransitionRecord};

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle state of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Issued, awaiting payment.
    Pending,
    /// Settled (terminal).
    Paid,
    /// Past its due date without payment.
    Overdue,
    /// Voided (terminal).
    Cancelled,
}

impl Lifecycle for BillStatus {
    const KIND: EntityKind = EntityKind::Bill;

    fn all() -> &'static [Self] {
        &[Self::Pending, Self::Paid, Self::Overdue, Self::Cancelled]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid, Self::Cancelled, Self::Overdue],
            Self::Overdue => &[Self::Paid, Self::Cancelled],
            Self::Paid | Self::Cancelled => &[],
        }
    }

    fn initial() -> Self {
        Self::Pending
    }

    fn is_system_only(from: Self, to: Self) -> bool {
        from == Self::Pending && to == Self::Overdue
    }

    fn side_effects(_from: Self, to: Self) -> &'static [SideEffect] {
        match to {
            Self::Paid => &[SideEffect::StampPaidDate],
            _ => &[],
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SETTLED: &[BillStatus] = &[BillStatus::Paid, BillStatus::Cancelled];

// ─── Record ──────────────────────────────────────────────────────────

/// Input for creating a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    /// Amount before tax and discount. Must be positive.
    pub subtotal: Money,
    /// Tax percentage, 0–100.
    #[serde(default)]
    pub tax_rate: Rate,
    /// Discount percentage, 0–100.
    #[serde(default)]
    pub discount_rate: Rate,
    /// Payment deadline.
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// A bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    /// Storage key.
    pub id: BillId,
    /// Human-readable `BILL…` code.
    pub code: RecordCode,
    /// Current lifecycle state.
    pub status: BillStatus,
    /// Amount before tax and discount.
    pub subtotal: Money,
    /// Tax percentage.
    pub tax_rate: Rate,
    /// Discount percentage.
    pub discount_rate: Rate,
    /// Derived: `subtotal × tax_rate`.
    pub tax_amount: Money,
    /// Derived: `subtotal × discount_rate`.
    pub discount_amount: Money,
    /// Derived: `subtotal + tax_amount − discount_amount`.
    pub total: Money,
    /// Payment deadline.
    pub due_date: Option<Timestamp>,
    /// Stamped when the bill enters `paid`.
    pub paid_date: Option<Timestamp>,
    /// Free-form notes; the only field writable once paid.
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Ordered log of accepted transitions.
    pub transitions: Vec<TransitionRecord<BillStatus>>,
}

/// A partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillPatch {
    pub status: Option<BillStatus>,
    pub subtotal: Option<Money>,
    pub tax_rate: Option<Rate>,
    pub discount_rate: Option<Rate>,
    pub due_date: Option<Timestamp>,
    pub notes: Option<String>,
    /// Reason recorded in the transition log when `status` changes.
    pub reason: Option<String>,
}

impl BillPatch {
    /// The first field this patch would change on `bill`, ignoring `notes`
    /// and a same-status write.
    fn locked_changes(&self, bill: &Bill) -> Option<&'static str> {
        let differs = |field: &'static str, changed: bool| changed.then_some(field);
        differs("status", self.status.is_some_and(|s| s != bill.status))
            .or_else(|| differs("subtotal", self.subtotal.is_some_and(|v| v != bill.subtotal)))
            .or_else(|| differs("tax_rate", self.tax_rate.is_some_and(|v| v != bill.tax_rate)))
            .or_else(|| differs("discount_rate", self.discount_rate.is_some_and(|v| v != bill.discount_rate)))
            .or_else(|| differs("due_date", self.due_date.is_some_and(|v| Some(v) != bill.due_date)))
    }
}

impl Bill {
    /// Build a new pending bill with derived amounts filled in.
    pub fn create(draft: NewBill, id: BillId, code: RecordCode, now: Timestamp) -> Result<Self, LifecycleError> {
        if draft.subtotal.cents() <= 0 {
            return Err(ValidationError::new("subtotal", format!("{} must be greater than zero", draft.subtotal)).into());
        }
        let totals = BillTotals::recompute(draft.subtotal, draft.tax_rate, draft.discount_rate)?;
        Ok(Self {
            id,
            code,
            status: BillStatus::initial(),
            subtotal: totals.subtotal,
            tax_rate: draft.tax_rate,
            discount_rate: draft.discount_rate,
            tax_amount: totals.tax_amount,
            discount_amount: totals.discount_amount,
            total: totals.total,
            due_date: draft.due_date,
            paid_date: None,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// The derived amounts as stored.
    pub fn totals(&self) -> BillTotals {
        BillTotals {
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            total: self.total,
        }
    }

    /// Apply a patch atomically.
    ///
    /// A paid bill accepts only `notes` (and a same-status write); any other
    /// change is a `TerminalFieldLock`. A write to `subtotal` or either rate
    /// recomputes the derived amounts in the same step.
    pub fn apply(&mut self, patch: BillPatch, now: Timestamp) -> Result<(), LifecycleError> {
        if self.status == BillStatus::Paid {
            if let Some(field) = patch.locked_changes(self) {
                return Err(LifecycleError::TerminalFieldLock {
                    kind: EntityKind::Bill,
                    state: self.status.to_string(),
                    field: field.to_string(),
                });
            }
        }

        let mut next = self.clone();
        if patch.subtotal.is_some() || patch.tax_rate.is_some() || patch.discount_rate.is_some() {
            let subtotal = patch.subtotal.unwrap_or(next.subtotal);
            let tax_rate = patch.tax_rate.unwrap_or(next.tax_rate);
            let discount_rate = patch.discount_rate.unwrap_or(next.discount_rate);
            let totals = BillTotals::recompute(subtotal, tax_rate, discount_rate)?;
            next.subtotal = totals.subtotal;
            next.tax_rate = tax_rate;
            next.discount_rate = discount_rate;
            next.tax_amount = totals.tax_amount;
            next.discount_amount = totals.discount_amount;
            next.total = totals.total;
        }
        if let Some(v) = patch.due_date {
            next.due_date = Some(v);
        }
        if let Some(v) = patch.notes {
            next.notes = Some(v);
        }
        if let Some(to) = patch.status {
            let reason = patch.reason.as_deref().unwrap_or("status update");
            if let Some(t) = lifecycle::plan_user(next.status, to)? {
                next.enter(&t, now, reason);
            }
        }
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    /// Move to `to` as the system, outside a user patch.
    pub fn transition(&mut self, to: BillStatus, now: Timestamp, reason: &str) -> Result<bool, LifecycleError> {
        match lifecycle::plan(self.status, to)? {
            Some(t) => {
                self.enter(&t, now, reason);
                self.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flag a pending bill whose due date has passed. Returns whether the
    /// status changed; bills that are not pending or not yet due are left
    /// alone.
    pub fn mark_overdue(&mut self, now: Timestamp) -> Result<bool, LifecycleError> {
        if self.status != BillStatus::Pending || !self.is_overdue(now) {
            return Ok(false);
        }
        self.transition(BillStatus::Overdue, now, "due date passed")
    }

    fn enter(&mut self, t: &Transition<BillStatus>, now: Timestamp, reason: &str) {
        for effect in t.effects {
            match effect {
                SideEffect::StampPaidDate => {
                    self.paid_date.get_or_insert(now);
                }
                other => tracing::error!(effect = ?other, "side effect not applicable to bill"),
            }
        }
        self.transitions.push(TransitionRecord::new(t, now, reason));
        self.status = t.to;
        tracing::debug!(code = %self.code, from = %t.from, to = %t.to, "bill transition");
    }

    /// Past `due_date` and not settled. A bill already flagged `overdue`
    /// still reports overdue.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        deadline::is_overdue(self.due_date, &self.status, SETTLED, now)
    }

    /// Whole days until `due_date`, negative once it has passed.
    pub fn days_until_due(&self, now: Timestamp) -> Option<i64> {
        self.due_date.map(|due| deadline::days_until(due, now))
    }
}
