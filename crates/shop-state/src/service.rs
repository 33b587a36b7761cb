//! # Service Lifecycle
//!
//! Service visits and support engagements on purchased products.
//!
//! ```text
//! requested ──▶ in_progress ──▶ completed (terminal)
//!     │            ▲   │
//!     ▼            │   ▼
//!   on_hold ◀──────┴── on_hold
//!
//! requested | in_progress | on_hold ──▶ cancelled (terminal)
//! ```

use serde::{Deserialize, Serialize};

use shop_core::deadline;
use shop_core::{EntityKind, Money, Rating, RecordCode, ServiceId, Timestamp, ValidationError};

use crate::error::LifecycleError;
use crate::lifecycle::{self, Lifecycle, SideEffect, Transition, TransitionRecord};

/// The lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Customer asked for service.
    Requested,
    /// Technician is working on it.
    InProgress,
    /// Finished (terminal).
    Completed,
    /// Abandoned (terminal).
    Cancelled,
    /// Paused.
    OnHold,
}

impl Lifecycle for ServiceStatus {
    const KIND: EntityKind = EntityKind::Service;

    fn all() -> &'static [Self] {
        &[
            Self::Requested,
            Self::InProgress,
            Self::Completed,
            Self::Cancelled,
            Self::OnHold,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::OnHold => "on_hold",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Requested => &[Self::InProgress, Self::Cancelled, Self::OnHold],
            Self::InProgress => &[Self::Completed, Self::Cancelled, Self::OnHold],
            Self::OnHold => &[Self::InProgress, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    fn initial() -> Self {
        Self::Requested
    }

    fn side_effects(_from: Self, to: Self) -> &'static [SideEffect] {
        match to {
            Self::Completed => &[SideEffect::StampCompletedDate],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLOSED: &[ServiceStatus] = &[ServiceStatus::Completed, ServiceStatus::Cancelled];

/// What kind of service this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Warranty,
    Repair,
    Maintenance,
    Replacement,
    Installation,
    Support,
    Consultation,
    Training,
}

/// Urgency of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Input for creating a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub service_type: ServiceType,
    #[serde(default)]
    pub priority: ServicePriority,
    /// What the customer needs. Required.
    pub description: String,
    /// When the service was requested; defaults to creation time.
    #[serde(default)]
    pub service_date: Option<Timestamp>,
    #[serde(default)]
    pub service_cost: Money,
    /// Appointment; may not precede `service_date`.
    #[serde(default)]
    pub scheduled_date: Option<Timestamp>,
    #[serde(default)]
    pub warranty_expires: Option<Timestamp>,
    #[serde(default)]
    pub is_under_warranty: bool,
}

/// A service engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    /// Human-readable `SRV…` code.
    pub code: RecordCode,
    pub status: ServiceStatus,
    pub service_type: ServiceType,
    pub priority: ServicePriority,
    pub description: String,
    pub service_date: Timestamp,
    pub service_cost: Money,
    pub technician_notes: Option<String>,
    pub customer_feedback: Option<String>,
    pub rating: Option<Rating>,
    pub scheduled_date: Option<Timestamp>,
    /// Stamped when the service enters `completed`.
    pub completed_date: Option<Timestamp>,
    pub warranty_expires: Option<Timestamp>,
    pub is_under_warranty: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub transitions: Vec<TransitionRecord<ServiceStatus>>,
}

/// A partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePatch {
    pub status: Option<ServiceStatus>,
    pub service_type: Option<ServiceType>,
    pub priority: Option<ServicePriority>,
    pub description: Option<String>,
    pub service_cost: Option<Money>,
    pub technician_notes: Option<String>,
    pub customer_feedback: Option<String>,
    /// Raw 1–5 rating; validated on apply.
    pub rating: Option<i64>,
    pub scheduled_date: Option<Timestamp>,
    pub warranty_expires: Option<Timestamp>,
    pub is_under_warranty: Option<bool>,
    pub reason: Option<String>,
}

fn check_schedule(service_date: Timestamp, scheduled: Option<Timestamp>) -> Result<(), ValidationError> {
    match scheduled {
        Some(s) if s < service_date => Err(ValidationError::new(
            "scheduled_date",
            format!("{s} is before the service date {service_date}"),
        )),
        _ => Ok(()),
    }
}

impl Service {
    /// Build a new service in its initial state.
    pub fn create(draft: NewService, id: ServiceId, code: RecordCode, now: Timestamp) -> Result<Self, LifecycleError> {
        if draft.description.trim().is_empty() {
            return Err(ValidationError::new("description", "must not be empty").into());
        }
        let service_cost = draft.service_cost.require_non_negative("service_cost")?;
        let service_date = draft.service_date.unwrap_or(now);
        check_schedule(service_date, draft.scheduled_date)?;
        Ok(Self {
            id,
            code,
            status: ServiceStatus::initial(),
            service_type: draft.service_type,
            priority: draft.priority,
            description: draft.description,
            service_date,
            service_cost,
            technician_notes: None,
            customer_feedback: None,
            rating: None,
            scheduled_date: draft.scheduled_date,
            completed_date: None,
            warranty_expires: draft.warranty_expires,
            is_under_warranty: draft.is_under_warranty,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// Apply a patch atomically.
    pub fn apply(&mut self, patch: ServicePatch, now: Timestamp) -> Result<(), LifecycleError> {
        let mut next = self.clone();
        if let Some(text) = patch.description {
            if text.trim().is_empty() {
                return Err(ValidationError::new("description", "must not be empty").into());
            }
            next.description = text;
        }
        if let Some(cost) = patch.service_cost {
            next.service_cost = cost.require_non_negative("service_cost")?;
        }
        if let Some(stars) = patch.rating {
            next.rating = Some(Rating::new("rating", stars)?);
        }
        if let Some(v) = patch.scheduled_date {
            check_schedule(next.service_date, Some(v))?;
            next.scheduled_date = Some(v);
        }
        if let Some(v) = patch.service_type {
            next.service_type = v;
        }
        if let Some(v) = patch.priority {
            next.priority = v;
        }
        if let Some(v) = patch.technician_notes {
            next.technician_notes = Some(v);
        }
        if let Some(v) = patch.customer_feedback {
            next.customer_feedback = Some(v);
        }
        if let Some(v) = patch.warranty_expires {
            next.warranty_expires = Some(v);
        }
        if let Some(v) = patch.is_under_warranty {
            next.is_under_warranty = v;
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
    pub fn transition(&mut self, to: ServiceStatus, now: Timestamp, reason: &str) -> Result<bool, LifecycleError> {
        match lifecycle::plan(self.status, to)? {
            Some(t) => {
                self.enter(&t, now, reason);
                self.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn enter(&mut self, t: &Transition<ServiceStatus>, now: Timestamp, reason: &str) {
        for effect in t.effects {
            match effect {
                SideEffect::StampCompletedDate => {
                    self.completed_date.get_or_insert(now);
                }
                other => tracing::error!(effect = ?other, "side effect not applicable to service"),
            }
        }
        self.transitions.push(TransitionRecord::new(t, now, reason));
        self.status = t.to;
        tracing::debug!(code = %self.code, from = %t.from, to = %t.to, "service transition");
    }

    /// Past `scheduled_date` and still open.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        deadline::is_overdue(self.scheduled_date, &self.status, CLOSED, now)
    }

    /// Whether the service is still covered by warranty at `now`.
    pub fn warranty_active(&self, now: Timestamp) -> bool {
        self.is_under_warranty && self.warranty_expires.map_or(true, |t| now <= t)
    }
}
