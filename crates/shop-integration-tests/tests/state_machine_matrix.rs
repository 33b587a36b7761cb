//! # Lifecycle Transition Matrix
//!
//! Exhaustive NxN checks for every entity kind. Each pair is checked
//! twice: once against the table through the string-level API, and once
//! against a live record, where an accepted transition must fire its side
//! effects exactly once and a rejected one must leave the record
//! untouched.

use shop_core::{
    BillId, EntityKind, LicenseId, LicenseKey, Money, Rate, RecordCode, RepairId, ServiceId, Timestamp,
};
use shop_state::{
    can_transition_named, validate_transition_named, AnyStatus, Bill, BillStatus, License, LicenseStatus,
    LifecycleError, NewBill, NewLicense, NewRepair, NewService, Repair, RepairStatus, RepairType, Service,
    ServiceStatus, ServiceType,
};

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn created() -> Timestamp {
    ts("2025-01-15T10:00:00Z")
}

fn later() -> Timestamp {
    ts("2025-02-01T10:00:00Z")
}

fn code(kind: EntityKind) -> RecordCode {
    RecordCode::new(kind, "202501", 1).unwrap()
}

/// Checks the string-level API against an expected edge list.
fn assert_table(kind: EntityKind, expected_valid: &[(&str, &str)]) {
    let states = AnyStatus::all(kind);
    for from in &states {
        for to in &states {
            let (from, to) = (from.as_str(), to.as_str());
            let actual = can_transition_named(kind, from, to).unwrap();
            let expected = from == to || expected_valid.contains(&(from, to));
            assert_eq!(actual, expected, "{kind} {from} -> {to}");
            let validated = validate_transition_named(kind, from, to);
            if expected {
                assert!(validated.is_ok(), "{kind} {from} -> {to}");
            } else {
                assert!(
                    matches!(validated, Err(LifecycleError::InvalidTransition { .. })),
                    "{kind} {from} -> {to}"
                );
            }
        }
    }
}

// =========================================================================
// Repair: 7 states
// =========================================================================

const REPAIR_EDGES: &[(&str, &str)] = &[
    ("requested", "diagnosed"),
    ("requested", "in_progress"),
    ("requested", "cancelled"),
    ("diagnosed", "in_progress"),
    ("diagnosed", "waiting_parts"),
    ("diagnosed", "cancelled"),
    ("in_progress", "waiting_parts"),
    ("in_progress", "completed"),
    ("in_progress", "failed"),
    ("in_progress", "cancelled"),
    ("waiting_parts", "in_progress"),
    ("waiting_parts", "completed"),
    ("waiting_parts", "cancelled"),
    ("failed", "requested"),
    ("failed", "diagnosed"),
];

fn repair_in(status: RepairStatus) -> Repair {
    let draft = NewRepair {
        repair_type: RepairType::Diagnostic,
        priority: Default::default(),
        problem_description: "intermittent fault".into(),
        technician_name: None,
        estimated_cost: None,
        estimated_completion: None,
        is_under_warranty: false,
    };
    let mut repair = Repair::create(draft, RepairId::new(), code(EntityKind::Repair), created()).unwrap();
    repair.status = status;
    repair
}

#[test]
fn repair_table_exhaustive() {
    assert_table(EntityKind::Repair, REPAIR_EDGES);
}

#[test]
fn repair_records_exhaustive() {
    let states = [
        RepairStatus::Requested,
        RepairStatus::Diagnosed,
        RepairStatus::InProgress,
        RepairStatus::WaitingParts,
        RepairStatus::Completed,
        RepairStatus::Cancelled,
        RepairStatus::Failed,
    ];
    for from in states {
        for to in states {
            let before = repair_in(from);
            let mut repair = before.clone();
            let result = repair.transition(to, later(), "matrix");
            let edge = REPAIR_EDGES.contains(&(from.to_string().as_str(), to.to_string().as_str()));
            if from == to {
                assert!(!result.unwrap(), "{from} -> {to}");
                assert_eq!(repair, before);
            } else if edge {
                assert!(result.unwrap(), "{from} -> {to}");
                assert_eq!(repair.status, to);
                assert_eq!(repair.transitions.len(), 1);
                assert_eq!(repair.started_date.is_some(), to == RepairStatus::InProgress);
                assert_eq!(repair.completed_date.is_some(), to == RepairStatus::Completed);
                assert_eq!(repair.ready_for_pickup, to == RepairStatus::Completed);
            } else {
                assert!(
                    matches!(result, Err(LifecycleError::InvalidTransition { .. })),
                    "{from} -> {to}"
                );
                assert_eq!(repair, before);
            }
        }
    }
}

#[test]
fn repair_started_date_survives_reentry() {
    let mut repair = repair_in(RepairStatus::Requested);
    repair.transition(RepairStatus::InProgress, created(), "start").unwrap();
    repair.transition(RepairStatus::WaitingParts, later(), "parts").unwrap();
    repair.transition(RepairStatus::InProgress, later().plus_days(3).unwrap(), "resume").unwrap();
    assert_eq!(repair.started_date, Some(created()));
    assert_eq!(repair.transitions.len(), 3);
}

// =========================================================================
// Bill: 4 states
// =========================================================================

const BILL_EDGES: &[(&str, &str)] = &[
    ("pending", "paid"),
    ("pending", "cancelled"),
    ("pending", "overdue"),
    ("overdue", "paid"),
    ("overdue", "cancelled"),
];

fn bill_in(status: BillStatus) -> Bill {
    let draft = NewBill {
        subtotal: Money::from_cents(100_000),
        tax_rate: Rate::from_percent(10),
        discount_rate: Rate::from_percent(5),
        due_date: Some(created().plus_days(7).unwrap()),
        notes: None,
    };
    let mut bill = Bill::create(draft, BillId::new(), code(EntityKind::Bill), created()).unwrap();
    bill.status = status;
    bill
}

#[test]
fn bill_table_exhaustive() {
    assert_table(EntityKind::Bill, BILL_EDGES);
}

#[test]
fn bill_records_exhaustive() {
    let states = [BillStatus::Pending, BillStatus::Paid, BillStatus::Overdue, BillStatus::Cancelled];
    for from in states {
        for to in states {
            let before = bill_in(from);
            let mut bill = before.clone();
            let result = bill.transition(to, later(), "matrix");
            let edge = BILL_EDGES.contains(&(from.to_string().as_str(), to.to_string().as_str()));
            if from == to {
                assert!(!result.unwrap());
                assert_eq!(bill, before);
            } else if edge {
                assert!(result.unwrap(), "{from} -> {to}");
                assert_eq!(bill.transitions.len(), 1);
                assert_eq!(bill.paid_date, (to == BillStatus::Paid).then_some(later()));
            } else {
                assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })), "{from} -> {to}");
                assert_eq!(bill, before);
            }
        }
    }
}

// =========================================================================
// Service: 5 states
// =========================================================================

const SERVICE_EDGES: &[(&str, &str)] = &[
    ("requested", "in_progress"),
    ("requested", "cancelled"),
    ("requested", "on_hold"),
    ("in_progress", "completed"),
    ("in_progress", "cancelled"),
    ("in_progress", "on_hold"),
    ("on_hold", "in_progress"),
    ("on_hold", "cancelled"),
];

fn service_in(status: ServiceStatus) -> Service {
    let draft = NewService {
        service_type: ServiceType::Support,
        priority: Default::default(),
        description: "printer offline".into(),
        service_date: None,
        service_cost: Money::from_cents(2_500),
        scheduled_date: None,
        warranty_expires: None,
        is_under_warranty: false,
    };
    let mut service = Service::create(draft, ServiceId::new(), code(EntityKind::Service), created()).unwrap();
    service.status = status;
    service
}

#[test]
fn service_table_exhaustive() {
    assert_table(EntityKind::Service, SERVICE_EDGES);
}

#[test]
fn service_records_exhaustive() {
    let states = [
        ServiceStatus::Requested,
        ServiceStatus::InProgress,
        ServiceStatus::Completed,
        ServiceStatus::Cancelled,
        ServiceStatus::OnHold,
    ];
    for from in states {
        for to in states {
            let before = service_in(from);
            let mut service = before.clone();
            let result = service.transition(to, later(), "matrix");
            let edge = SERVICE_EDGES.contains(&(from.to_string().as_str(), to.to_string().as_str()));
            if from == to {
                assert!(!result.unwrap());
                assert_eq!(service, before);
            } else if edge {
                assert!(result.unwrap(), "{from} -> {to}");
                assert_eq!(service.completed_date, (to == ServiceStatus::Completed).then_some(later()));
            } else {
                assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })), "{from} -> {to}");
                assert_eq!(service, before);
            }
        }
    }
}

// =========================================================================
// License: 5 states
// =========================================================================

const LICENSE_EDGES: &[(&str, &str)] = &[
    ("pending", "active"),
    ("active", "suspended"),
    ("active", "expired"),
    ("active", "revoked"),
    ("suspended", "active"),
    ("suspended", "revoked"),
    ("expired", "active"),
];

fn license_in(status: LicenseStatus) -> License {
    let draft: NewLicense = serde_json::from_value(serde_json::json!({
        "software_name": "ShopSuite",
        "licensed_to": "Acme Ltd",
        "ex_date": "2025-12-31T00:00:00Z",
    }))
    .unwrap();
    let key = LicenseKey::parse("ABCD-EFGH-IJKL-MNOP").unwrap();
    let mut license =
        License::create(draft, LicenseId::new(), code(EntityKind::License), key, created()).unwrap();
    license.status = status;
    license
}

#[test]
fn license_table_exhaustive() {
    assert_table(EntityKind::License, LICENSE_EDGES);
}

#[test]
fn license_records_exhaustive() {
    let states = [
        LicenseStatus::Pending,
        LicenseStatus::Active,
        LicenseStatus::Suspended,
        LicenseStatus::Expired,
        LicenseStatus::Revoked,
    ];
    for from in states {
        for to in states {
            let before = license_in(from);
            let mut license = before.clone();
            let result = license.transition(to, later(), "matrix");
            let edge = LICENSE_EDGES.contains(&(from.to_string().as_str(), to.to_string().as_str()));
            if from == to {
                assert!(!result.unwrap());
                assert_eq!(license, before);
            } else if edge {
                assert!(result.unwrap(), "{from} -> {to}");
                let entered_active = to == LicenseStatus::Active;
                assert_eq!(license.activation_count, u32::from(entered_active), "{from} -> {to}");
                assert_eq!(license.activated_date, entered_active.then_some(later()));
            } else {
                assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })), "{from} -> {to}");
                assert_eq!(license, before);
            }
        }
    }
}

#[test]
fn terminal_states_have_no_exits() {
    for kind in EntityKind::all() {
        for status in AnyStatus::all(*kind) {
            assert_eq!(status.is_terminal(), status.valid_transitions().is_empty(), "{status}");
        }
    }
    assert!(AnyStatus::parse(EntityKind::License, "revoked").unwrap().is_terminal());
    assert!(!AnyStatus::parse(EntityKind::License, "expired").unwrap().is_terminal());
}
