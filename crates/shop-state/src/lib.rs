//! # shop-state: Lifecycle Records
//!
//! Implements the four lifecycle record kinds of the shop and the rules
//! that govern how their status may move.
//!
//! ## State Machines
//!
//! - **Repair** (`repair.rs`): `requested → diagnosed → in_progress →
//!   completed` with `waiting_parts`, `failed` and `cancelled` branches.
//!
//! - **Bill** (`bill.rs`): `pending → paid` with a system-only `overdue`
//!   branch. A paid bill locks every field except `notes`.
//!
//! - **Service** (`service.rs`): `requested → in_progress → completed` with
//!   `on_hold` and `cancelled` branches.
//!
//! - **License** (`license.rs`): `pending → active ⇄ suspended`, `expired`
//!   (renewable) and terminal `revoked`. Activation, renewal and usage
//!   tracking are in `activation.rs`.
//!
//! ## Design
//!
//! Each status enum implements [`Lifecycle`]: a closed table of allowed
//! next states plus a side-effect table keyed on `(from, to)`. Records
//! never assign `status` directly; every change goes through
//! [`lifecycle::plan`], so the tables are the single source of truth and
//! can be enumerated exhaustively by tests. Patches are applied to a copy
//! of the record and committed only when every field validated.

pub mod activation;
pub mod bill;
pub mod error;
pub mod license;
pub mod lifecycle;
pub mod repair;
pub mod service;

// ─── Lifecycle re-exports ───────────────────────────────────────────

pub use error::LifecycleError;
pub use lifecycle::{
    can_transition, can_transition_named, validate_transition, validate_transition_named, AnyStatus, Lifecycle,
    SideEffect, Transition, TransitionRecord,
};

// ─── Record re-exports ──────────────────────────────────────────────

pub use bill::{Bill, BillPatch, BillStatus, NewBill};
pub use license::{License, LicensePatch, LicenseStatus, LicenseType, NewLicense};
pub use repair::{NewRepair, PartUsed, Repair, RepairPatch, RepairPriority, RepairStatus, RepairType};
pub use service::{NewService, Service, ServicePatch, ServicePriority, ServiceStatus, ServiceType};

// ─── Engine re-exports ──────────────────────────────────────────────

pub use activation::{KeyActivation, LicenseActivationEngine, RenewalPolicy};
