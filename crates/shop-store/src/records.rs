//! # Records
//!
//! The operations layer over a [`RecordStore`]: creation with code
//! allocation, patch application, license engine calls and the periodic
//! sweeps. Every mutation runs through `RecordStore::update`, so the
//! read-validate-write of a single record is atomic in every backend.

use serde_json::{Map, Value};
use uuid::Uuid;

use shop_core::{BillId, LicenseId, LicenseKey, Money, RepairId, ServiceId, Timestamp};
use shop_state::{
    Bill, BillPatch, KeyActivation, License, LicenseActivationEngine, LicensePatch, LicenseStatus, NewBill,
    NewLicense, NewRepair, NewService, RenewalPolicy, Repair, RepairPatch, Service, ServicePatch,
};

use crate::config::StoreConfig;
use crate::create::create_with_code;
use crate::error::StoreError;
use crate::record::StoredRecord;
use crate::store::RecordStore;

/// Record operations over a store holding all four record types.
#[derive(Debug)]
pub struct Records<S> {
    store: S,
    code_attempts: u32,
    expiring_soon_days: i64,
    engine: LicenseActivationEngine,
}

impl<S> Records<S>
where
    S: RecordStore<Repair> + RecordStore<Bill> + RecordStore<Service> + RecordStore<License>,
{
    /// Wrap `store`, taking retry and window settings from `config`.
    pub fn new(store: S, config: &StoreConfig) -> Self {
        Self {
            store,
            code_attempts: config.code_retry_attempts,
            expiring_soon_days: config.expiring_soon_days,
            engine: LicenseActivationEngine,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn fetch<R: StoredRecord>(&self, id: Uuid) -> Result<R, StoreError>
    where
        S: RecordStore<R>,
    {
        RecordStore::<R>::get(&self.store, id)
            .await?
            .ok_or_else(|| StoreError::not_found(R::KIND, id))
    }

    // ─── Repairs ─────────────────────────────────────────────────────

    /// Create a repair with the next `RPR` code.
    pub async fn create_repair(&self, draft: NewRepair, now: Timestamp) -> Result<Repair, StoreError> {
        create_with_code(&self.store, now, self.code_attempts, |code| {
            Repair::create(draft.clone(), RepairId::new(), code, now)
        })
        .await
    }

    /// Fetch a repair.
    pub async fn repair(&self, id: RepairId) -> Result<Repair, StoreError> {
        self.fetch(id.0).await
    }

    /// Apply a patch, including an optional status transition.
    pub async fn update_repair(&self, id: RepairId, patch: RepairPatch, now: Timestamp) -> Result<Repair, StoreError> {
        let (repair, before) = RecordStore::<Repair>::update(&self.store, id.0, |r| {
            let before = r.status;
            r.apply(patch, now)?;
            Ok(before)
        })
        .await?;
        if repair.status != before {
            tracing::info!(kind = "repair", code = %repair.code, from = %before, to = %repair.status, "status changed");
        }
        Ok(repair)
    }

    /// Record a part consumed by a repair.
    pub async fn add_repair_part(
        &self,
        id: RepairId,
        name: &str,
        quantity: u32,
        cost: Option<Money>,
        now: Timestamp,
    ) -> Result<Repair, StoreError> {
        let (repair, ()) =
            RecordStore::<Repair>::update(&self.store, id.0, |r| r.add_part(name, quantity, cost, now)).await?;
        Ok(repair)
    }

    /// Hand a completed repair back to the customer.
    pub async fn deliver_repair(&self, id: RepairId, now: Timestamp) -> Result<Repair, StoreError> {
        let (repair, ()) = RecordStore::<Repair>::update(&self.store, id.0, |r| r.mark_delivered(now)).await?;
        tracing::info!(kind = "repair", code = %repair.code, "repair delivered");
        Ok(repair)
    }

    // ─── Bills ───────────────────────────────────────────────────────

    /// Create a bill with the next `BILL` code.
    pub async fn create_bill(&self, draft: NewBill, now: Timestamp) -> Result<Bill, StoreError> {
        create_with_code(&self.store, now, self.code_attempts, |code| {
            Bill::create(draft.clone(), BillId::new(), code, now)
        })
        .await
    }

    /// Fetch a bill.
    pub async fn bill(&self, id: BillId) -> Result<Bill, StoreError> {
        self.fetch(id.0).await
    }

    /// Apply a patch. Amounts are recomputed; a paid bill only accepts
    /// note changes.
    pub async fn update_bill(&self, id: BillId, patch: BillPatch, now: Timestamp) -> Result<Bill, StoreError> {
        let (bill, before) = RecordStore::<Bill>::update(&self.store, id.0, |b| {
            let before = b.status;
            b.apply(patch, now)?;
            Ok(before)
        })
        .await?;
        if bill.status != before {
            tracing::info!(kind = "bill", code = %bill.code, from = %before, to = %bill.status, "status changed");
        }
        Ok(bill)
    }

    /// Flag every pending bill whose due date has passed. Returns the
    /// bills that changed.
    pub async fn mark_overdue_bills(&self, now: Timestamp) -> Result<Vec<Bill>, StoreError> {
        let candidates: Vec<Bill> = RecordStore::<Bill>::list(&self.store).await?;
        let mut flagged = Vec::new();
        for bill in candidates.into_iter().filter(|b| b.is_overdue(now)) {
            let (bill, changed) = RecordStore::<Bill>::update(&self.store, bill.id.0, |b| b.mark_overdue(now)).await?;
            if changed {
                tracing::info!(kind = "bill", code = %bill.code, "bill overdue");
                flagged.push(bill);
            }
        }
        Ok(flagged)
    }

    // ─── Services ────────────────────────────────────────────────────

    /// Create a service with the next `SRV` code.
    pub async fn create_service(&self, draft: NewService, now: Timestamp) -> Result<Service, StoreError> {
        create_with_code(&self.store, now, self.code_attempts, |code| {
            Service::create(draft.clone(), ServiceId::new(), code, now)
        })
        .await
    }

    /// Fetch a service.
    pub async fn service(&self, id: ServiceId) -> Result<Service, StoreError> {
        self.fetch(id.0).await
    }

    /// Apply a patch, including an optional status transition.
    pub async fn update_service(
        &self,
        id: ServiceId,
        patch: ServicePatch,
        now: Timestamp,
    ) -> Result<Service, StoreError> {
        let (service, before) = RecordStore::<Service>::update(&self.store, id.0, |s| {
            let before = s.status;
            s.apply(patch, now)?;
            Ok(before)
        })
        .await?;
        if service.status != before {
            tracing::info!(kind = "service", code = %service.code, from = %before, to = %service.status, "status changed");
        }
        Ok(service)
    }

    // ─── Licenses ────────────────────────────────────────────────────

    /// Create a pending license with the next `LIC` number and a random key.
    pub async fn create_license(&self, draft: NewLicense, now: Timestamp) -> Result<License, StoreError> {
        self.create_license_with(draft, now, || LicenseKey::generate(&mut rand::thread_rng()))
            .await
    }

    /// [`create_license`](Self::create_license) with keys drawn from
    /// `next_key`. A key collision is retried like a code collision, with
    /// a fresh key.
    pub async fn create_license_with(
        &self,
        draft: NewLicense,
        now: Timestamp,
        mut next_key: impl FnMut() -> LicenseKey,
    ) -> Result<License, StoreError> {
        create_with_code(&self.store, now, self.code_attempts, |number| {
            License::create(draft.clone(), LicenseId::new(), number, next_key(), now)
        })
        .await
    }

    /// Fetch a license.
    pub async fn license(&self, id: LicenseId) -> Result<License, StoreError> {
        self.fetch(id.0).await
    }

    /// Fetch a license by its key.
    pub async fn license_by_key(&self, key: &LicenseKey) -> Result<License, StoreError> {
        RecordStore::<License>::find_by_secondary_key(&self.store, key.as_str())
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: License::KIND,
                key: key.to_string(),
            })
    }

    /// Apply a patch. Entering `active` this way is refused for revoked or
    /// lapsed licenses.
    pub async fn update_license(
        &self,
        id: LicenseId,
        patch: LicensePatch,
        now: Timestamp,
    ) -> Result<License, StoreError> {
        let (license, before) = RecordStore::<License>::update(&self.store, id.0, |l| {
            let before = l.status;
            l.apply(patch, now)?;
            Ok(before)
        })
        .await?;
        if license.status != before {
            tracing::info!(kind = "license", code = %license.license_number, from = %before, to = %license.status, "status changed");
        }
        Ok(license)
    }

    /// Activate a license.
    pub async fn activate_license(&self, id: LicenseId, now: Timestamp) -> Result<License, StoreError> {
        let engine = self.engine;
        let (license, ()) = RecordStore::<License>::update(&self.store, id.0, |l| engine.activate(l, now)).await?;
        Ok(license)
    }

    /// Suspend an active license.
    pub async fn suspend_license(&self, id: LicenseId, reason: &str, now: Timestamp) -> Result<License, StoreError> {
        let engine = self.engine;
        let (license, ()) =
            RecordStore::<License>::update(&self.store, id.0, |l| engine.suspend(l, now, reason)).await?;
        Ok(license)
    }

    /// Revoke a license permanently.
    pub async fn revoke_license(&self, id: LicenseId, reason: &str, now: Timestamp) -> Result<License, StoreError> {
        let engine = self.engine;
        let (license, ()) =
            RecordStore::<License>::update(&self.store, id.0, |l| engine.revoke(l, now, reason)).await?;
        Ok(license)
    }

    /// Renew a license under `policy`.
    pub async fn renew_license(
        &self,
        id: LicenseId,
        policy: RenewalPolicy,
        now: Timestamp,
    ) -> Result<License, StoreError> {
        let engine = self.engine;
        let (license, ()) =
            RecordStore::<License>::update(&self.store, id.0, |l| engine.renew(l, policy, now)).await?;
        Ok(license)
    }

    /// Merge usage data into a license.
    pub async fn record_license_usage(
        &self,
        id: LicenseId,
        delta: Map<String, Value>,
        now: Timestamp,
    ) -> Result<License, StoreError> {
        let engine = self.engine;
        let (license, ()) = RecordStore::<License>::update(&self.store, id.0, |l| {
            engine.record_usage(l, delta, now);
            Ok(())
        })
        .await?;
        Ok(license)
    }

    /// Activation by a customer presenting `key`.
    pub async fn activate_license_by_key(
        &self,
        key: &LicenseKey,
        terms_accepted: bool,
        activation_info: Map<String, Value>,
        now: Timestamp,
    ) -> Result<(License, KeyActivation), StoreError> {
        let found = self.license_by_key(key).await?;
        let engine = self.engine;
        RecordStore::<License>::update(&self.store, found.id.0, |l| {
            engine.activate_by_key(l, key, terms_accepted, activation_info, now)
        })
        .await
    }

    /// Enable a feature. Returns the license and whether it was newly added.
    pub async fn add_license_feature(
        &self,
        id: LicenseId,
        feature: &str,
        now: Timestamp,
    ) -> Result<(License, bool), StoreError> {
        RecordStore::<License>::update(&self.store, id.0, |l| Ok(l.add_feature(feature, now)?)).await
    }

    /// Disable a feature. Returns the license and whether it was present.
    pub async fn remove_license_feature(
        &self,
        id: LicenseId,
        feature: &str,
        now: Timestamp,
    ) -> Result<(License, bool), StoreError> {
        RecordStore::<License>::update(&self.store, id.0, |l| Ok(l.remove_feature(feature, now))).await
    }

    /// Move every active license past its expiry date to `expired`.
    /// Returns the licenses that changed.
    pub async fn expire_lapsed_licenses(&self, now: Timestamp) -> Result<Vec<License>, StoreError> {
        let engine = self.engine;
        let candidates: Vec<License> = RecordStore::<License>::list(&self.store).await?;
        let mut expired = Vec::new();
        for license in candidates
            .into_iter()
            .filter(|l| l.status == LicenseStatus::Active && l.is_expired(now))
        {
            let (license, changed) =
                RecordStore::<License>::update(&self.store, license.id.0, |l| engine.expire_if_lapsed(l, now)).await?;
            if changed {
                expired.push(license);
            }
        }
        Ok(expired)
    }

    /// Active licenses expiring within the configured window.
    pub async fn licenses_expiring_soon(&self, now: Timestamp) -> Result<Vec<License>, StoreError> {
        let all: Vec<License> = RecordStore::<License>::list(&self.store).await?;
        Ok(all
            .into_iter()
            .filter(|l| l.status == LicenseStatus::Active && l.is_expiring_within(now, self.expiring_soon_days))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use shop_core::{EntityKind, Rate};
    use shop_state::{BillStatus, LifecycleError, RepairStatus, RepairType};
    use serde_json::json;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn records() -> Records<MemoryStore> {
        Records::new(MemoryStore::new(), &StoreConfig::default())
    }

    fn key(s: &str) -> LicenseKey {
        LicenseKey::parse(s).unwrap()
    }

    fn license_draft() -> NewLicense {
        serde_json::from_value(json!({
            "software_name": "ShopSuite",
            "licensed_to": "Acme Ltd",
            "ex_date": "2025-12-31T00:00:00Z",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn repair_flow_stamps_and_logs() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let draft = NewRepair {
            repair_type: RepairType::Hardware,
            priority: Default::default(),
            problem_description: "cracked screen".into(),
            technician_name: None,
            estimated_cost: None,
            estimated_completion: None,
            is_under_warranty: false,
        };
        let repair = records.create_repair(draft, now).await.unwrap();
        assert_eq!(repair.code.to_string(), "RPR2025010001");

        let started = ts("2025-01-16T09:00:00Z");
        let patch = RepairPatch {
            status: Some(RepairStatus::InProgress),
            ..Default::default()
        };
        let repair = records.update_repair(repair.id, patch, started).await.unwrap();
        assert_eq!(repair.started_date, Some(started));

        let err = records.deliver_repair(repair.id, started).await.unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(LifecycleError::WrongState { .. })));

        let done = ts("2025-01-17T09:00:00Z");
        let patch = RepairPatch {
            status: Some(RepairStatus::Completed),
            ..Default::default()
        };
        records.update_repair(repair.id, patch, done).await.unwrap();
        let repair = records.deliver_repair(repair.id, done).await.unwrap();
        assert!(repair.ready_for_pickup);
        assert_eq!(repair.delivered_date, Some(done));
        assert_eq!(repair.transitions.len(), 2);
    }

    #[tokio::test]
    async fn overdue_sweep_flags_only_due_pending_bills() {
        let records = records();
        let now = ts("2025-01-10T00:00:00Z");
        let due = |d: &str| NewBill {
            subtotal: Money::from_cents(10_000),
            tax_rate: Rate::from_percent(10),
            discount_rate: Rate::ZERO,
            due_date: Some(ts(d)),
            notes: None,
        };
        let late = records.create_bill(due("2025-01-20T00:00:00Z"), now).await.unwrap();
        let later = records.create_bill(due("2025-03-01T00:00:00Z"), now).await.unwrap();

        let flagged = records.mark_overdue_bills(ts("2025-02-01T00:00:00Z")).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, late.id);
        assert_eq!(records.bill(later.id).await.unwrap().status, BillStatus::Pending);

        let again = records.mark_overdue_bills(ts("2025-02-02T00:00:00Z")).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn user_patch_cannot_mark_bill_overdue() {
        let records = records();
        let now = ts("2025-01-10T00:00:00Z");
        let draft = NewBill {
            subtotal: Money::from_cents(500),
            tax_rate: Rate::ZERO,
            discount_rate: Rate::ZERO,
            due_date: None,
            notes: None,
        };
        let bill = records.create_bill(draft, now).await.unwrap();
        let patch = BillPatch {
            status: Some(BillStatus::Overdue),
            ..Default::default()
        };
        let err = records.update_bill(bill.id, patch, now).await.unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(LifecycleError::SystemOnlyTransition { .. })));
    }

    #[tokio::test]
    async fn license_key_collision_retries_with_fresh_key() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let mut keys = vec![key("AAAA-AAAA-AAAA-AAAA")].into_iter();
        let first = records
            .create_license_with(license_draft(), now, || keys.next().unwrap())
            .await
            .unwrap();

        let mut keys = vec![key("AAAA-AAAA-AAAA-AAAA"), key("BBBB-BBBB-BBBB-BBBB")].into_iter();
        let second = records
            .create_license_with(license_draft(), now, || keys.next().unwrap())
            .await
            .unwrap();
        assert_eq!(second.license_key.as_str(), "BBBB-BBBB-BBBB-BBBB");
        assert_eq!(first.license_number.to_string(), "LIC2025010001");
        assert_eq!(second.license_number.to_string(), "LIC2025010002");
    }

    #[tokio::test]
    async fn persistent_collisions_exhaust() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let taken = key("CCCC-CCCC-CCCC-CCCC");
        records
            .create_license_with(license_draft(), now, || taken.clone())
            .await
            .unwrap();
        let err = records
            .create_license_with(license_draft(), now, || taken.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::CodeGenerationExhausted {
                kind: EntityKind::License,
                attempts: 5
            }
        ));
    }

    #[tokio::test]
    async fn activation_by_key_and_expiry_sweep() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let lic = records.create_license(license_draft(), now).await.unwrap();

        let info = json!({"machine": "till-1"}).as_object().cloned().unwrap();
        let (lic, outcome) = records
            .activate_license_by_key(&lic.license_key, true, info, now)
            .await
            .unwrap();
        assert_eq!(outcome, KeyActivation { usage_recorded: true, activated: true });
        assert_eq!(lic.status, LicenseStatus::Active);
        assert_eq!(lic.activation_count, 1);
        assert_eq!(lic.usage_data["machine"], "till-1");

        let soon = records.licenses_expiring_soon(ts("2025-12-10T00:00:00Z")).await.unwrap();
        assert_eq!(soon.len(), 1);

        let expired = records.expire_lapsed_licenses(ts("2026-01-02T00:00:00Z")).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, LicenseStatus::Expired);

        let err = records
            .activate_license_by_key(&lic.license_key, true, Map::new(), ts("2026-01-02T00:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(LifecycleError::LicenseExpired { .. })));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let records = records();
        let err = records
            .activate_license_by_key(&key("ZZZZ-ZZZZ-ZZZZ-ZZZZ"), true, Map::new(), Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::License, .. }));
    }

    #[tokio::test]
    async fn renewal_reactivates_and_counts() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let lic = records.create_license(license_draft(), now).await.unwrap();
        records.activate_license(lic.id, now).await.unwrap();
        let later = ts("2025-03-01T00:00:00Z");
        records.suspend_license(lic.id, "payment late", later).await.unwrap();
        let lic = records
            .renew_license(lic.id, RenewalPolicy::Extend { days: 30 }, later)
            .await
            .unwrap();
        assert_eq!(lic.status, LicenseStatus::Active);
        assert_eq!(lic.activation_count, 2);
        assert_eq!(lic.ex_date, ts("2026-01-30T00:00:00Z"));

        let (lic, added) = records.add_license_feature(lic.id, "reports", later).await.unwrap();
        assert!(added);
        let (_, added) = records.add_license_feature(lic.id, "reports", later).await.unwrap();
        assert!(!added);

        let lic = records.revoke_license(lic.id, "fraud", later).await.unwrap();
        assert_eq!(lic.status, LicenseStatus::Revoked);
    }

    #[tokio::test]
    async fn pending_license_can_be_revoked() {
        let records = records();
        let now = ts("2025-01-15T10:00:00Z");
        let lic = records.create_license(license_draft(), now).await.unwrap();
        let lic = records.revoke_license(lic.id, "order cancelled", now).await.unwrap();
        assert_eq!(lic.status, LicenseStatus::Revoked);
        let err = records.activate_license(lic.id, now).await.unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(LifecycleError::LicenseRevoked { .. })), "{err}");
    }
}
