//! # Repair Lifecycle
//!
//! Repair jobs on purchased products.
//!
//! ## States
//!
//! ```text
//! requested ──▶ diagnosed ──▶ waiting_parts ──▶ completed (terminal)
//!     │             │              ▲  │
//!     │             ▼              │  │
//!     └───────▶ in_progress ───────┘  │
//!                   │  └──▶ completed ◀┘
//!                   ▼
//!                failed ──▶ requested | diagnosed
//!
//! any non-terminal state except failed ──▶ cancelled (terminal)
//! ```
//!
//! Entering `in_progress` stamps `started_date` once; entering `completed`
//! stamps `completed_date` and flags the item ready for pickup.

use serde::{Deserialize, Serialize};

use shop_core::deadline;
use shop_core::{EntityKind, Money, Rating, RecordCode, RepairId, Timestamp, ValidationError};

use crate::error::LifecycleError;
use crate::lifecycle::{self, Lifecycle, SideEffect, Transition, TransitionRecord};

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle state of a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    /// Customer asked for a repair.
    Requested,
    /// Technician has diagnosed the problem.
    Diagnosed,
    /// Work is underway.
    InProgress,
    /// Blocked on parts.
    WaitingParts,
    /// Repair finished (terminal).
    Completed,
    /// Repair abandoned (terminal).
    Cancelled,
    /// Repair attempt failed; may be re-requested or re-diagnosed.
    Failed,
}

impl Lifecycle for RepairStatus {
    const KIND: EntityKind = EntityKind::Repair;

    fn all() -> &'static [Self] {
        &[
            Self::Requested,
            Self::Diagnosed,
            Self::InProgress,
            Self::WaitingParts,
            Self::Completed,
            Self::Cancelled,
            Self::Failed,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Diagnosed => "diagnosed",
            Self::InProgress => "in_progress",
            Self::WaitingParts => "waiting_parts",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Requested => &[Self::Diagnosed, Self::InProgress, Self::Cancelled],
            Self::Diagnosed => &[Self::InProgress, Self::WaitingParts, Self::Cancelled],
            Self::InProgress => &[Self::WaitingParts, Self::Completed, Self::Failed, Self::Cancelled],
            Self::WaitingParts => &[Self::InProgress, Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
            Self::Failed => &[Self::Requested, Self::Diagnosed],
        }
    }

    fn initial() -> Self {
        Self::Requested
    }

    fn side_effects(_from: Self, to: Self) -> &'static [SideEffect] {
        match to {
            Self::InProgress => &[SideEffect::StampStartedDate],
            Self::Completed => &[SideEffect::StampCompletedDate, SideEffect::MarkReadyForPickup],
            _ => &[],
        }
    }
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States in which a repair can no longer be overdue.
const CLOSED: &[RepairStatus] = &[RepairStatus::Completed, RepairStatus::Cancelled];

// ─── Classification ──────────────────────────────────────────────────

/// What kind of repair this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairType {
    /// Covered by the product warranty.
    Warranty,
    /// Billed to the customer.
    Paid,
    /// Same-day emergency repair.
    Emergency,
    /// Scheduled maintenance.
    Maintenance,
    /// Unit replaced rather than repaired.
    Replacement,
    /// Diagnosis only.
    Diagnostic,
    /// Software fix.
    Software,
    /// Hardware fix.
    Hardware,
}

/// Urgency of a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPriority {
    /// Low.
    Low,
    /// Normal.
    #[default]
    Normal,
    /// High.
    High,
    /// Urgent.
    Urgent,
}

/// A part consumed by a repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartUsed {
    /// Part name.
    pub name: String,
    /// Units used, at least one.
    pub quantity: u32,
    /// Unit cost, when known.
    pub cost: Option<Money>,
    /// When the part was recorded.
    pub added_date: Timestamp,
}

// ─── Record ──────────────────────────────────────────────────────────

/// Input for creating a repair. Code, id and status are assigned by the
/// creating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRepair {
    /// Type of repair.
    pub repair_type: RepairType,
    /// Urgency.
    #[serde(default)]
    pub priority: RepairPriority,
    /// What is wrong. Required.
    pub problem_description: String,
    /// Assigned technician.
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Quoted cost.
    #[serde(default)]
    pub estimated_cost: Option<Money>,
    /// Promised completion date.
    #[serde(default)]
    pub estimated_completion: Option<Timestamp>,
    /// Whether the product is under warranty.
    #[serde(default)]
    pub is_under_warranty: bool,
}

/// A repair job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    pub id: RepairId,
    pub code: RecordCode,
    pub status: RepairStatus,
    pub repair_type: RepairType,
    pub priority: RepairPriority,
    pub problem_description: String,
    pub diagnosis: Option<String>,
    pub repair_notes: Option<String>,
    pub technician_name: Option<String>,
    pub estimated_cost: Option<Money>,
    pub actual_cost: Option<Money>,
    pub parts_used: Vec<PartUsed>,
    pub started_date: Option<Timestamp>,
    pub completed_date: Option<Timestamp>,
    pub estimated_completion: Option<Timestamp>,
    pub is_under_warranty: bool,
    pub warranty_void: bool,
    pub quality_check_passed: bool,
    pub customer_satisfaction: Option<Rating>,
    pub customer_contacted: bool,
    pub ready_for_pickup: bool,
    pub delivered_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Ordered log of accepted transitions.
    pub transitions: Vec<TransitionRecord<RepairStatus>>,
}

/// A partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPatch {
    pub status: Option<RepairStatus>,
    pub repair_type: Option<RepairType>,
    pub priority: Option<RepairPriority>,
    pub problem_description: Option<String>,
    pub diagnosis: Option<String>,
    pub repair_notes: Option<String>,
    pub technician_name: Option<String>,
    pub estimated_cost: Option<Money>,
    pub actual_cost: Option<Money>,
    pub estimated_completion: Option<Timestamp>,
    pub is_under_warranty: Option<bool>,
    pub warranty_void: Option<bool>,
    pub quality_check_passed: Option<bool>,
    /// Raw 1–5 rating; validated on apply.
    pub customer_satisfaction: Option<i64>,
    pub customer_contacted: Option<bool>,
    /// Reason recorded in the transition log when `status` changes.
    pub reason: Option<String>,
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn non_negative(field: &str, value: Option<Money>) -> Result<Option<Money>, ValidationError> {
    value.map(|m| m.require_non_negative(field)).transpose()
}

impl Repair {
    /// Build a new repair in its initial state.
    pub fn create(draft: NewRepair, id: RepairId, code: RecordCode, now: Timestamp) -> Result<Self, LifecycleError> {
        require_text("problem_description", &draft.problem_description)?;
        let estimated_cost = non_negative("estimated_cost", draft.estimated_cost)?;
        Ok(Self {
            id,
            code,
            status: RepairStatus::initial(),
            repair_type: draft.repair_type,
            priority: draft.priority,
            problem_description: draft.problem_description,
            diagnosis: None,
            repair_notes: None,
            technician_name: draft.technician_name,
            estimated_cost,
            actual_cost: None,
            parts_used: Vec::new(),
            started_date: None,
            completed_date: None,
            estimated_completion: draft.estimated_completion,
            is_under_warranty: draft.is_under_warranty,
            warranty_void: false,
            quality_check_passed: false,
            customer_satisfaction: None,
            customer_contacted: false,
            ready_for_pickup: false,
            delivered_date: None,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// Apply a patch atomically: every field is validated before anything
    /// changes, and a refused patch leaves the record untouched.
    pub fn apply(&mut self, patch: RepairPatch, now: Timestamp) -> Result<(), LifecycleError> {
        let mut next = self.clone();
        if let Some(text) = patch.problem_description {
            require_text("problem_description", &text)?;
            next.problem_description = text;
        }
        if let Some(cost) = non_negative("estimated_cost", patch.estimated_cost)? {
            next.estimated_cost = Some(cost);
        }
        if let Some(cost) = non_negative("actual_cost", patch.actual_cost)? {
            next.actual_cost = Some(cost);
        }
        if let Some(stars) = patch.customer_satisfaction {
            next.customer_satisfaction = Some(Rating::new("customer_satisfaction", stars)?);
        }
        if let Some(v) = patch.repair_type {
            next.repair_type = v;
        }
        if let Some(v) = patch.priority {
            next.priority = v;
        }
        if let Some(v) = patch.diagnosis {
            next.diagnosis = Some(v);
        }
        if let Some(v) = patch.repair_notes {
            next.repair_notes = Some(v);
        }
        if let Some(v) = patch.technician_name {
            next.technician_name = Some(v);
        }
        if let Some(v) = patch.estimated_completion {
            next.estimated_completion = Some(v);
        }
        if let Some(v) = patch.is_under_warranty {
            next.is_under_warranty = v;
        }
        if let Some(v) = patch.warranty_void {
            next.warranty_void = v;
        }
        if let Some(v) = patch.quality_check_passed {
            next.quality_check_passed = v;
        }
        if let Some(v) = patch.customer_contacted {
            next.customer_contacted = v;
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
    pub fn transition(&mut self, to: RepairStatus, now: Timestamp, reason: &str) -> Result<bool, LifecycleError> {
        match lifecycle::plan(self.status, to)? {
            Some(t) => {
                self.enter(&t, now, reason);
                self.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn enter(&mut self, t: &Transition<RepairStatus>, now: Timestamp, reason: &str) {
        for effect in t.effects {
            match effect {
                SideEffect::StampStartedDate => {
                    self.started_date.get_or_insert(now);
                }
                SideEffect::StampCompletedDate => {
                    self.completed_date.get_or_insert(now);
                }
                SideEffect::MarkReadyForPickup => self.ready_for_pickup = true,
                other => tracing::error!(effect = ?other, "side effect not applicable to repair"),
            }
        }
        self.transitions.push(TransitionRecord::new(t, now, reason));
        self.status = t.to;
        tracing::debug!(code = %self.code, from = %t.from, to = %t.to, "repair transition");
    }

    /// Record a part consumed by the repair.
    pub fn add_part(
        &mut self,
        name: &str,
        quantity: u32,
        cost: Option<Money>,
        now: Timestamp,
    ) -> Result<(), LifecycleError> {
        require_text("part_name", name)?;
        if quantity == 0 {
            return Err(ValidationError::new("quantity", "must be at least 1").into());
        }
        let cost = non_negative("part_cost", cost)?;
        self.parts_used.push(PartUsed {
            name: name.to_string(),
            quantity,
            cost,
            added_date: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Σ cost × quantity over parts with a known cost.
    pub fn parts_cost(&self) -> Result<Money, ValidationError> {
        self.parts_used
            .iter()
            .filter_map(|p| p.cost.map(|c| (c, p.quantity)))
            .try_fold(Money::ZERO, |acc, (cost, qty)| {
                cost.checked_mul(qty).and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(|| ValidationError::new("parts_used", "parts cost overflows"))
    }

    /// Hand the repaired item back to the customer.
    pub fn mark_delivered(&mut self, now: Timestamp) -> Result<(), LifecycleError> {
        if self.status != RepairStatus::Completed {
            return Err(LifecycleError::WrongState {
                kind: EntityKind::Repair,
                operation: "deliver",
                state: self.status.to_string(),
            });
        }
        self.delivered_date = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Past `estimated_completion` and still open.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        deadline::is_overdue(self.estimated_completion, &self.status, CLOSED, now)
    }

    /// Whole days from `started_date` to `completed_date` (or `now`).
    pub fn days_in_repair(&self, now: Timestamp) -> i64 {
        deadline::duration_days(self.started_date, self.completed_date, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn make_repair() -> Repair {
        let draft = NewRepair {
            repair_type: RepairType::Hardware,
            priority: RepairPriority::High,
            problem_description: "Screen flickers".into(),
            technician_name: None,
            estimated_cost: Some(Money::from_cents(12_000)),
            estimated_completion: Some(ts("2025-01-20T00:00:00Z")),
            is_under_warranty: false,
        };
        Repair::create(
            draft,
            RepairId::new(),
            RecordCode::parse("RPR2025010001").unwrap(),
            ts("2025-01-10T09:00:00Z"),
        )
        .unwrap()
    }

    fn status(to: RepairStatus) -> RepairPatch {
        RepairPatch {
            status: Some(to),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_requires_description() {
        let draft = NewRepair {
            repair_type: RepairType::Software,
            priority: RepairPriority::Normal,
            problem_description: "  ".into(),
            technician_name: None,
            estimated_cost: None,
            estimated_completion: None,
            is_under_warranty: false,
        };
        let err = Repair::create(draft, RepairId::new(), RecordCode::parse("RPR2025010001").unwrap(), Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(v) if v.field == "problem_description"));
    }

    #[test]
    fn test_started_date_stamped_once() {
        let mut r = make_repair();
        let t1 = ts("2025-01-11T09:00:00Z");
        let t2 = ts("2025-01-13T09:00:00Z");
        r.apply(status(RepairStatus::InProgress), t1).unwrap();
        r.apply(status(RepairStatus::WaitingParts), t1).unwrap();
        r.apply(status(RepairStatus::InProgress), t2).unwrap();
        assert_eq!(r.started_date, Some(t1));
        assert_eq!(r.transitions.len(), 3);
    }

    #[test]
    fn test_completion_effects() {
        let mut r = make_repair();
        let now = ts("2025-01-15T09:00:00Z");
        r.apply(status(RepairStatus::InProgress), now).unwrap();
        r.apply(status(RepairStatus::Completed), now).unwrap();
        assert_eq!(r.completed_date, Some(now));
        assert!(r.ready_for_pickup);
    }

    #[test]
    fn test_completed_cannot_restart() {
        let mut r = make_repair();
        let now = ts("2025-01-15T09:00:00Z");
        r.apply(status(RepairStatus::InProgress), now).unwrap();
        r.apply(status(RepairStatus::Completed), now).unwrap();
        let before = r.clone();
        let err = r.apply(status(RepairStatus::InProgress), now).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                kind: EntityKind::Repair,
                from: "completed".into(),
                to: "in_progress".into(),
            }
        );
        assert_eq!(r, before);
    }

    #[test]
    fn test_refused_patch_changes_nothing() {
        let mut r = make_repair();
        let before = r.clone();
        let patch = RepairPatch {
            diagnosis: Some("Loose cable".into()),
            customer_satisfaction: Some(6),
            ..Default::default()
        };
        let err = r.apply(patch, Timestamp::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(v) if v.field == "customer_satisfaction"));
        assert_eq!(r, before);
    }

    #[test]
    fn test_same_status_is_silent() {
        let mut r = make_repair();
        r.apply(status(RepairStatus::Requested), Timestamp::now()).unwrap();
        assert!(r.transitions.is_empty());
    }

    #[test]
    fn test_failed_can_be_rediagnosed() {
        let mut r = make_repair();
        let now = Timestamp::now();
        r.transition(RepairStatus::InProgress, now, "start").unwrap();
        r.transition(RepairStatus::Failed, now, "board dead").unwrap();
        assert!(r.transition(RepairStatus::Diagnosed, now, "retry").unwrap());
        assert_eq!(r.status, RepairStatus::Diagnosed);
    }

    #[test]
    fn test_parts_cost() {
        let mut r = make_repair();
        let now = Timestamp::now();
        r.add_part("Cable", 2, Some(Money::from_cents(1_250)), now).unwrap();
        r.add_part("Screw", 4, None, now).unwrap();
        r.add_part("Panel", 1, Some(Money::from_cents(8_000)), now).unwrap();
        assert_eq!(r.parts_cost().unwrap(), Money::from_cents(10_500));
        assert!(r.add_part("Glue", 0, None, now).is_err());
    }

    #[test]
    fn test_delivery_requires_completion() {
        let mut r = make_repair();
        let now = ts("2025-01-15T09:00:00Z");
        assert!(matches!(r.mark_delivered(now), Err(LifecycleError::WrongState { .. })));
        r.transition(RepairStatus::InProgress, now, "start").unwrap();
        r.transition(RepairStatus::Completed, now, "done").unwrap();
        r.mark_delivered(now).unwrap();
        assert_eq!(r.delivered_date, Some(now));
    }

    #[test]
    fn test_overdue_flips_when_closed() {
        let mut r = make_repair();
        let late = ts("2025-01-25T00:00:00Z");
        assert!(r.is_overdue(late));
        r.transition(RepairStatus::Cancelled, late, "customer withdrew").unwrap();
        assert!(!r.is_overdue(late));
    }

    #[test]
    fn test_days_in_repair() {
        let mut r = make_repair();
        assert_eq!(r.days_in_repair(ts("2025-02-01T00:00:00Z")), 0);
        r.transition(RepairStatus::InProgress, ts("2025-01-11T12:00:00Z"), "start").unwrap();
        assert_eq!(r.days_in_repair(ts("2025-01-14T11:59:59Z")), 2);
        r.transition(RepairStatus::Completed, ts("2025-01-16T12:00:00Z"), "done").unwrap();
        assert_eq!(r.days_in_repair(ts("2025-03-01T00:00:00Z")), 5);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&RepairStatus::WaitingParts).unwrap(), "\"waiting_parts\"");
        let r = make_repair();
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Repair = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
    }

    mod walk {
        use super::*;
        use crate::lifecycle::Lifecycle;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_walk_stays_on_table_edges(steps in prop::collection::vec(0usize..7, 0..40)) {
                let mut r = make_repair();
                let mut now = ts("2025-01-10T09:00:00Z");
                let mut entered_in_progress = false;
                for i in steps {
                    let to = RepairStatus::all()[i];
                    let from = r.status;
                    now = now.plus_days(1).unwrap();
                    match r.transition(to, now, "walk") {
                        Ok(moved) => {
                            prop_assert_eq!(moved, from != to);
                            prop_assert!(from == to || from.valid_transitions().contains(&to));
                            entered_in_progress |= moved && to == RepairStatus::InProgress;
                        }
                        Err(_) => {
                            prop_assert_eq!(r.status, from);
                            prop_assert!(!from.valid_transitions().contains(&to));
                        }
                    }
                }
                for pair in r.transitions.windows(2) {
                    prop_assert_eq!(pair[0].to_state, pair[1].from_state);
                }
                if let Some(last) = r.transitions.last() {
                    prop_assert_eq!(last.to_state, r.status);
                }
                prop_assert_eq!(r.started_date.is_some(), entered_in_progress);
            }
        }
    }
}
