//! # Lifecycle State Machine
//!
//! Table-driven transition validation shared by the four lifecycle record
//! kinds. Each status enum implements [`Lifecycle`] by listing, per state,
//! the states it may move to. That list is the single source of truth:
//! [`can_transition`], [`validate_transition`], the CLI's table dump and
//! the exhaustive transition-matrix tests all read it.
//!
//! ## Same-status writes
//!
//! Writing the current status again is accepted as a no-op. It fires no
//! side effects and appends nothing to the transition log.
//!
//! ## Side effects
//!
//! Field mutations tied to a transition (stamping `started_date`, counting
//! activations, ...) are declared by [`Lifecycle::side_effects`] as a pure
//! function of `(from, to)`. Records apply them inside the same mutation
//! that moves the status, so an accepted transition and its effects are
//! never observed separately.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use shop_core::{EntityKind, Timestamp, ValidationError};

use crate::bill::BillStatus;
use crate::error::LifecycleError;
use crate::license::LicenseStatus;
use crate::repair::RepairStatus;
use crate::service::ServiceStatus;

// ─── Side effects ────────────────────────────────────────────────────

/// A field mutation that fires when a specific transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Set `started_date` if unset.
    StampStartedDate,
    /// Set `completed_date` if unset.
    StampCompletedDate,
    /// Set `ready_for_pickup = true`.
    MarkReadyForPickup,
    /// Set `paid_date` if unset.
    StampPaidDate,
    /// Set `activated_date` if unset.
    StampActivatedDate,
    /// Increment `activation_count`.
    CountActivation,
}

// ─── Lifecycle trait ─────────────────────────────────────────────────

/// A closed status enumeration with its transition table.
pub trait Lifecycle:
    Copy
    + Eq
    + std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The entity kind this status belongs to.
    const KIND: EntityKind;

    /// Every status, in table order.
    fn all() -> &'static [Self];

    /// The storage string of this status.
    fn as_str(&self) -> &'static str;

    /// States reachable from this one in a single transition.
    fn valid_transitions(&self) -> &'static [Self];

    /// The status created records start in.
    fn initial() -> Self;

    /// Parse a storage string.
    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.as_str() == name)
    }

    /// Whether no transition leaves this state.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether `from -> to` may only be performed by the system.
    fn is_system_only(_from: Self, _to: Self) -> bool {
        false
    }

    /// Field mutations fired by an accepted `from -> to` transition.
    fn side_effects(_from: Self, _to: Self) -> &'static [SideEffect] {
        &[]
    }
}

/// An accepted status change and the effects it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S: Lifecycle> {
    /// Status before.
    pub from: S,
    /// Status after.
    pub to: S,
    /// Effects to apply together with the status change.
    pub effects: &'static [SideEffect],
}

/// Whether `from -> to` is accepted: either a table entry or a
/// same-status no-op.
pub fn can_transition<S: Lifecycle>(from: S, to: S) -> bool {
    from == to || from.valid_transitions().contains(&to)
}

/// [`can_transition`], reporting `InvalidTransition` on refusal.
pub fn validate_transition<S: Lifecycle>(from: S, to: S) -> Result<(), LifecycleError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            kind: S::KIND,
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Validate a status change and resolve its side effects.
///
/// `Ok(None)` is the same-status no-op.
pub fn plan<S: Lifecycle>(from: S, to: S) -> Result<Option<Transition<S>>, LifecycleError> {
    validate_transition(from, to)?;
    if from == to {
        return Ok(None);
    }
    Ok(Some(Transition {
        from,
        to,
        effects: S::side_effects(from, to),
    }))
}

/// [`plan`] for a change requested by a user, which may not take a
/// system-only path.
pub fn plan_user<S: Lifecycle>(from: S, to: S) -> Result<Option<Transition<S>>, LifecycleError> {
    if from != to && S::is_system_only(from, to) {
        return Err(LifecycleError::SystemOnlyTransition {
            kind: S::KIND,
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }
    plan(from, to)
}

// ─── Transition log ──────────────────────────────────────────────────

/// Record of an accepted state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    /// State before the transition.
    pub from_state: S,
    /// State after the transition.
    pub to_state: S,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Why the transition was made.
    pub reason: String,
}

impl<S: Lifecycle> TransitionRecord<S> {
    /// Log entry for an accepted transition.
    pub fn new(transition: &Transition<S>, timestamp: Timestamp, reason: &str) -> Self {
        Self {
            from_state: transition.from,
            to_state: transition.to,
            timestamp,
            reason: reason.to_string(),
        }
    }
}

// ─── Kind-tagged status ──────────────────────────────────────────────

/// A status of any entity kind.
///
/// Lets callers holding only `(kind, "status string")` pairs, such as the
/// CLI or a storage row, query the tables without naming the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum AnyStatus {
    /// Repair status.
    Repair(RepairStatus),
    /// Bill status.
    Bill(BillStatus),
    /// Service status.
    Service(ServiceStatus),
    /// License status.
    License(LicenseStatus),
}

fn parse_as<S: Lifecycle>(name: &str) -> Result<S, ValidationError> {
    S::from_name(name).ok_or_else(|| {
        ValidationError::new("status", format!("{name:?} is not a {} status", S::KIND))
    })
}

fn names<S: Lifecycle>(states: &[S]) -> Vec<&'static str> {
    states.iter().map(|s| s.as_str()).collect()
}

impl AnyStatus {
    /// Parse a storage string for `kind`.
    pub fn parse(kind: EntityKind, name: &str) -> Result<Self, ValidationError> {
        Ok(match kind {
            EntityKind::Repair => Self::Repair(parse_as(name)?),
            EntityKind::Bill => Self::Bill(parse_as(name)?),
            EntityKind::Service => Self::Service(parse_as(name)?),
            EntityKind::License => Self::License(parse_as(name)?),
        })
    }

    /// Every status of `kind`.
    pub fn all(kind: EntityKind) -> Vec<Self> {
        match kind {
            EntityKind::Repair => RepairStatus::all().iter().map(|s| Self::Repair(*s)).collect(),
            EntityKind::Bill => BillStatus::all().iter().map(|s| Self::Bill(*s)).collect(),
            EntityKind::Service => ServiceStatus::all().iter().map(|s| Self::Service(*s)).collect(),
            EntityKind::License => LicenseStatus::all().iter().map(|s| Self::License(*s)).collect(),
        }
    }

    /// The entity kind.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Repair(_) => EntityKind::Repair,
            Self::Bill(_) => EntityKind::Bill,
            Self::Service(_) => EntityKind::Service,
            Self::License(_) => EntityKind::License,
        }
    }

    /// The storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repair(s) => s.as_str(),
            Self::Bill(s) => s.as_str(),
            Self::Service(s) => s.as_str(),
            Self::License(s) => s.as_str(),
        }
    }

    /// Whether no transition leaves this state.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Repair(s) => s.is_terminal(),
            Self::Bill(s) => s.is_terminal(),
            Self::Service(s) => s.is_terminal(),
            Self::License(s) => s.is_terminal(),
        }
    }

    /// Storage strings of the states reachable in one transition.
    pub fn valid_transitions(&self) -> Vec<&'static str> {
        match self {
            Self::Repair(s) => names(s.valid_transitions()),
            Self::Bill(s) => names(s.valid_transitions()),
            Self::Service(s) => names(s.valid_transitions()),
            Self::License(s) => names(s.valid_transitions()),
        }
    }

    /// Whether `self -> to` is accepted. Statuses of different kinds never
    /// transition into each other.
    pub fn can_transition(&self, to: &AnyStatus) -> bool {
        match (self, to) {
            (Self::Repair(a), Self::Repair(b)) => can_transition(*a, *b),
            (Self::Bill(a), Self::Bill(b)) => can_transition(*a, *b),
            (Self::Service(a), Self::Service(b)) => can_transition(*a, *b),
            (Self::License(a), Self::License(b)) => can_transition(*a, *b),
            _ => false,
        }
    }
}

impl std::fmt::Display for AnyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}

/// String-level `canTransition(kind, current, target)`.
///
/// Unknown status names are a `ValidationError`, not a `false`.
pub fn can_transition_named(kind: EntityKind, from: &str, to: &str) -> Result<bool, ValidationError> {
    let from = AnyStatus::parse(kind, from)?;
    let to = AnyStatus::parse(kind, to)?;
    Ok(from.can_transition(&to))
}

/// String-level `validateTransition(kind, current, target)`.
pub fn validate_transition_named(kind: EntityKind, from: &str, to: &str) -> Result<(), LifecycleError> {
    if can_transition_named(kind, from, to)? {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            kind,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
