//! # License Lifecycle
//!
//! Software and product licenses sold through the shop.
//!
//! ## States
//!
//! ```text
//! pending ──▶ active ──▶ suspended ──▶ active (reinstatement)
//!               │  ▲         │
//!               │  │         └──▶ revoked (terminal)
//!               │  └── expired (via renewal)
//!               ├──▶ expired
//!               └──▶ revoked (terminal)
//! ```
//!
//! The activation engine may also revoke a `pending` or `expired`
//! license; that edge is not in the table, so a user patch cannot take it.
//!
//! Entering `active` stamps `activated_date` once and counts the
//! activation. A license may only enter `active` while `now ≤ ex_date`, so
//! `is_active` never reports a lapsed license.
//!
//! Activation, suspension, revocation, renewal and usage tracking live in
//! [`crate::activation::LicenseActivationEngine`]; this module holds the
//! record, its table and its derived getters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shop_core::deadline;
use shop_core::{EntityKind, LicenseId, LicenseKey, Money, RecordCode, Timestamp, ValidationError};

use crate::error::LifecycleError;
use crate::lifecycle::{self, Lifecycle, SideEffect, Transition, TransitionRecord};

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle state of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Issued, never activated.
    Pending,
    /// In use.
    Active,
    /// Temporarily disabled.
    Suspended,
    /// License period ended; renewal reactivates it.
    Expired,
    /// Permanently withdrawn (terminal).
    Revoked,
}

impl Lifecycle for LicenseStatus {
    const KIND: EntityKind = EntityKind::License;

    fn all() -> &'static [Self] {
        &[
            Self::Pending,
            Self::Active,
            Self::Suspended,
            Self::Expired,
            Self::Revoked,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Active],
            Self::Active => &[Self::Suspended, Self::Expired, Self::Revoked],
            Self::Suspended => &[Self::Active, Self::Revoked],
            Self::Expired => &[Self::Active],
            Self::Revoked => &[],
        }
    }

    fn initial() -> Self {
        Self::Pending
    }

    fn side_effects(_from: Self, to: Self) -> &'static [SideEffect] {
        match to {
            Self::Active => &[SideEffect::StampActivatedDate, SideEffect::CountActivation],
            _ => &[],
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// License category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Trial,
    #[default]
    Standard,
    Premium,
    Enterprise,
    Educational,
    Commercial,
    Personal,
    Developer,
}

// ─── Record ──────────────────────────────────────────────────────────

/// Input for creating a license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLicense {
    #[serde(default)]
    pub license_type: LicenseType,
    pub software_name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub licensed_to: String,
    /// Issue date; defaults to creation time.
    #[serde(default)]
    pub in_date: Option<Timestamp>,
    /// Expiry. Must be after `in_date` and in the future.
    pub ex_date: Timestamp,
    #[serde(default)]
    pub support_expires: Option<Timestamp>,
    #[serde(default)]
    pub maintenance_expires: Option<Timestamp>,
    #[serde(default = "one")]
    pub max_users: u32,
    #[serde(default = "one")]
    pub max_installations: u32,
    #[serde(default)]
    pub features_enabled: Vec<String>,
    #[serde(default)]
    pub auto_renewal: bool,
    #[serde(default)]
    pub renewal_price: Option<Money>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn one() -> u32 {
    1
}

/// A license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Storage key.
    pub id: LicenseId,
    /// Human-readable `LIC…` number.
    pub license_number: RecordCode,
    /// Activation key, unique across licenses.
    pub license_key: LicenseKey,
    pub license_type: LicenseType,
    /// Current lifecycle state.
    pub status: LicenseStatus,
    pub software_name: String,
    pub version: Option<String>,
    pub licensed_to: String,
    /// Issue date.
    pub in_date: Timestamp,
    /// Expiry date.
    pub ex_date: Timestamp,
    pub support_expires: Option<Timestamp>,
    pub maintenance_expires: Option<Timestamp>,
    pub max_users: u32,
    pub max_installations: u32,
    pub features_enabled: Vec<String>,
    /// Free-form usage counters, merged key-wise.
    pub usage_data: Map<String, Value>,
    /// Stamped on first activation.
    pub activated_date: Option<Timestamp>,
    /// Number of accepted transitions into `active`.
    pub activation_count: u32,
    pub last_used_date: Option<Timestamp>,
    pub terms_accepted: bool,
    pub terms_accepted_date: Option<Timestamp>,
    pub auto_renewal: bool,
    pub renewal_price: Option<Money>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Ordered log of accepted transitions.
    pub transitions: Vec<TransitionRecord<LicenseStatus>>,
}

/// A partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensePatch {
    pub status: Option<LicenseStatus>,
    pub license_type: Option<LicenseType>,
    pub software_name: Option<String>,
    pub version: Option<String>,
    pub licensed_to: Option<String>,
    pub ex_date: Option<Timestamp>,
    pub support_expires: Option<Timestamp>,
    pub maintenance_expires: Option<Timestamp>,
    pub max_users: Option<u32>,
    pub max_installations: Option<u32>,
    pub auto_renewal: Option<bool>,
    pub renewal_price: Option<Money>,
    pub notes: Option<String>,
    pub reason: Option<String>,
}

fn at_least_one(field: &str, value: u32) -> Result<u32, ValidationError> {
    if value == 0 {
        return Err(ValidationError::new(field, "must be at least 1"));
    }
    Ok(value)
}

fn after_issue(field: &str, in_date: Timestamp, value: Option<Timestamp>) -> Result<(), ValidationError> {
    match value {
        Some(t) if t <= in_date => Err(ValidationError::new(field, format!("{t} must be after the issue date {in_date}"))),
        _ => Ok(()),
    }
}

impl License {
    /// Build a new pending license.
    pub fn create(
        draft: NewLicense,
        id: LicenseId,
        license_number: RecordCode,
        license_key: LicenseKey,
        now: Timestamp,
    ) -> Result<Self, LifecycleError> {
        if draft.software_name.trim().is_empty() {
            return Err(ValidationError::new("software_name", "must not be empty").into());
        }
        if draft.licensed_to.trim().is_empty() {
            return Err(ValidationError::new("licensed_to", "must not be empty").into());
        }
        let in_date = draft.in_date.unwrap_or(now);
        after_issue("ex_date", in_date, Some(draft.ex_date))?;
        if draft.ex_date <= now {
            return Err(ValidationError::new("ex_date", format!("{} must be in the future", draft.ex_date)).into());
        }
        after_issue("support_expires", in_date, draft.support_expires)?;
        after_issue("maintenance_expires", in_date, draft.maintenance_expires)?;
        let renewal_price = draft
            .renewal_price
            .map(|p| p.require_non_negative("renewal_price"))
            .transpose()?;

        let mut features_enabled = Vec::with_capacity(draft.features_enabled.len());
        for feature in draft.features_enabled {
            if !features_enabled.contains(&feature) {
                features_enabled.push(feature);
            }
        }

        Ok(Self {
            id,
            license_number,
            license_key,
            license_type: draft.license_type,
            status: LicenseStatus::initial(),
            software_name: draft.software_name,
            version: draft.version,
            licensed_to: draft.licensed_to,
            in_date,
            ex_date: draft.ex_date,
            support_expires: draft.support_expires,
            maintenance_expires: draft.maintenance_expires,
            max_users: at_least_one("max_users", draft.max_users)?,
            max_installations: at_least_one("max_installations", draft.max_installations)?,
            features_enabled,
            usage_data: Map::new(),
            activated_date: None,
            activation_count: 0,
            last_used_date: None,
            terms_accepted: false,
            terms_accepted_date: None,
            auto_renewal: draft.auto_renewal,
            renewal_price,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// Apply a patch atomically.
    ///
    /// A status write into `active` is held to the same refusals as
    /// activation: a revoked or lapsed license cannot be made active.
    pub fn apply(&mut self, patch: LicensePatch, now: Timestamp) -> Result<(), LifecycleError> {
        let mut next = self.clone();
        if let Some(v) = patch.ex_date {
            after_issue("ex_date", next.in_date, Some(v))?;
            next.ex_date = v;
        }
        if let Some(v) = patch.support_expires {
            after_issue("support_expires", next.in_date, Some(v))?;
            next.support_expires = Some(v);
        }
        if let Some(v) = patch.maintenance_expires {
            after_issue("maintenance_expires", next.in_date, Some(v))?;
            next.maintenance_expires = Some(v);
        }
        if let Some(v) = patch.max_users {
            next.max_users = at_least_one("max_users", v)?;
        }
        if let Some(v) = patch.max_installations {
            next.max_installations = at_least_one("max_installations", v)?;
        }
        if let Some(v) = patch.renewal_price {
            next.renewal_price = Some(v.require_non_negative("renewal_price")?);
        }
        if let Some(v) = patch.software_name {
            if v.trim().is_empty() {
                return Err(ValidationError::new("software_name", "must not be empty").into());
            }
            next.software_name = v;
        }
        if let Some(v) = patch.licensed_to {
            if v.trim().is_empty() {
                return Err(ValidationError::new("licensed_to", "must not be empty").into());
            }
            next.licensed_to = v;
        }
        if let Some(v) = patch.license_type {
            next.license_type = v;
        }
        if let Some(v) = patch.version {
            next.version = Some(v);
        }
        if let Some(v) = patch.auto_renewal {
            next.auto_renewal = v;
        }
        if let Some(v) = patch.notes {
            next.notes = Some(v);
        }
        if let Some(to) = patch.status {
            let reason = patch.reason.as_deref().unwrap_or("status update");
            if let Some(t) = lifecycle::plan_user(next.status, to)? {
                if t.to == LicenseStatus::Active {
                    next.ensure_activatable(now)?;
                }
                next.enter(&t, now, reason);
            }
        }
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    /// Move to `to`, applying the table's side effects. Entering `active`
    /// is refused for revoked or lapsed licenses.
    pub fn transition(&mut self, to: LicenseStatus, now: Timestamp, reason: &str) -> Result<bool, LifecycleError> {
        match lifecycle::plan(self.status, to)? {
            Some(t) => {
                if t.to == LicenseStatus::Active {
                    self.ensure_activatable(now)?;
                }
                self.enter(&t, now, reason);
                self.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move to `revoked` from any non-terminal status, outside the
    /// transition table. Revoking a revoked license is a no-op.
    pub fn revoke(&mut self, now: Timestamp, reason: &str) -> Result<bool, LifecycleError> {
        if self.status.is_terminal() {
            return Ok(false);
        }
        let t = Transition {
            from: self.status,
            to: LicenseStatus::Revoked,
            effects: LicenseStatus::side_effects(self.status, LicenseStatus::Revoked),
        };
        self.enter(&t, now, reason);
        self.updated_at = now;
        Ok(true)
    }

    fn enter(&mut self, t: &Transition<LicenseStatus>, now: Timestamp, reason: &str) {
        for effect in t.effects {
            match effect {
                SideEffect::StampActivatedDate => {
                    self.activated_date.get_or_insert(now);
                }
                SideEffect::CountActivation => {
                    self.activation_count = self.activation_count.saturating_add(1);
                }
                other => tracing::error!(effect = ?other, "side effect not applicable to license"),
            }
        }
        self.transitions.push(TransitionRecord::new(t, now, reason));
        self.status = t.to;
        tracing::debug!(code = %self.license_number, from = %t.from, to = %t.to, "license transition");
    }

    /// Refuse activation of a revoked or lapsed license.
    pub fn ensure_activatable(&self, now: Timestamp) -> Result<(), LifecycleError> {
        if self.status == LicenseStatus::Revoked {
            return Err(LifecycleError::LicenseRevoked {
                license_number: self.license_number.to_string(),
            });
        }
        if self.is_expired(now) {
            return Err(LifecycleError::LicenseExpired {
                license_number: self.license_number.to_string(),
                ex_date: self.ex_date,
            });
        }
        Ok(())
    }

    // ─── Features ────────────────────────────────────────────────────

    /// Enable a feature. Returns whether it was newly added.
    pub fn add_feature(&mut self, feature: &str, now: Timestamp) -> Result<bool, ValidationError> {
        if feature.trim().is_empty() {
            return Err(ValidationError::new("feature", "must not be empty"));
        }
        if self.has_feature(feature) {
            return Ok(false);
        }
        self.features_enabled.push(feature.to_string());
        self.updated_at = now;
        Ok(true)
    }

    /// Disable a feature. Returns whether it was present.
    pub fn remove_feature(&mut self, feature: &str, now: Timestamp) -> bool {
        let before = self.features_enabled.len();
        self.features_enabled.retain(|f| f != feature);
        let removed = self.features_enabled.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Whether `feature` is enabled.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features_enabled.iter().any(|f| f == feature)
    }

    // ─── Derived ─────────────────────────────────────────────────────

    /// `now` is past `ex_date`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.ex_date
    }

    /// Status is `active` and the period has not lapsed.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.status == LicenseStatus::Active && !self.is_expired(now)
    }

    /// Whole days until `ex_date`, negative once it has passed.
    pub fn days_until_expiry(&self, now: Timestamp) -> i64 {
        deadline::days_until(self.ex_date, now)
    }

    /// Expires within the standard 30-day window.
    pub fn is_expiring_soon(&self, now: Timestamp) -> bool {
        deadline::is_expiring_soon(Some(self.ex_date), now)
    }

    /// Expires within `window_days`.
    pub fn is_expiring_within(&self, now: Timestamp, window_days: i64) -> bool {
        deadline::is_expiring_within(Some(self.ex_date), now, window_days)
    }

    /// Whole days from `in_date` to `ex_date`.
    pub fn license_duration_days(&self) -> i64 {
        self.in_date.days_until(self.ex_date)
    }

    /// Whole days since `in_date`.
    pub fn days_since_issue(&self, now: Timestamp) -> i64 {
        deadline::duration_days(Some(self.in_date), None, now)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    pub(crate) fn draft() -> NewLicense {
        NewLicense {
            license_type: LicenseType::Commercial,
            software_name: "PosMaster".into(),
            version: Some("4.2".into()),
            licensed_to: "Corner Store".into(),
            in_date: Some(ts("2025-01-01T00:00:00Z")),
            ex_date: ts("2026-01-01T00:00:00Z"),
            support_expires: None,
            maintenance_expires: None,
            max_users: 3,
            max_installations: 2,
            features_enabled: vec!["reports".into(), "reports".into()],
            auto_renewal: false,
            renewal_price: None,
            notes: None,
        }
    }

    pub(crate) fn make_license() -> License {
        License::create(
            draft(),
            LicenseId::new(),
            RecordCode::parse("LIC2025010001").unwrap(),
            LicenseKey::parse("A1B2-C3D4-E5F6-G7H8").unwrap(),
            ts("2025-01-01T00:00:00Z"),
        )
        .unwrap()
    }

    fn create(d: NewLicense, now: &str) -> Result<License, LifecycleError> {
        License::create(
            d,
            LicenseId::new(),
            RecordCode::parse("LIC2025010001").unwrap(),
            LicenseKey::parse("A1B2-C3D4-E5F6-G7H8").unwrap(),
            ts(now),
        )
    }

    #[test]
    fn test_create_dedups_features() {
        let lic = make_license();
        assert_eq!(lic.features_enabled, vec!["reports".to_string()]);
        assert_eq!(lic.status, LicenseStatus::Pending);
        assert_eq!(lic.license_duration_days(), 365);
    }

    #[test]
    fn test_create_validates_dates() {
        let mut d = draft();
        d.ex_date = ts("2024-12-31T00:00:00Z");
        assert!(matches!(create(d, "2025-01-01T00:00:00Z"), Err(LifecycleError::Validation(v)) if v.field == "ex_date"));

        let mut d = draft();
        d.in_date = None;
        d.ex_date = ts("2025-06-01T00:00:00Z");
        assert!(create(d, "2025-07-01T00:00:00Z").is_err());

        let mut d = draft();
        d.support_expires = Some(ts("2024-06-01T00:00:00Z"));
        assert!(matches!(
            create(d, "2025-01-01T00:00:00Z"),
            Err(LifecycleError::Validation(v)) if v.field == "support_expires"
        ));
    }

    #[test]
    fn test_create_validates_limits() {
        let mut d = draft();
        d.max_users = 0;
        assert!(matches!(create(d, "2025-01-01T00:00:00Z"), Err(LifecycleError::Validation(v)) if v.field == "max_users"));
    }

    #[test]
    fn test_activation_side_effects() {
        let mut lic = make_license();
        let t1 = ts("2025-02-01T00:00:00Z");
        let t2 = ts("2025-03-01T00:00:00Z");
        lic.transition(LicenseStatus::Active, t1, "activate").unwrap();
        lic.transition(LicenseStatus::Suspended, t1, "audit").unwrap();
        lic.transition(LicenseStatus::Active, t2, "reinstated").unwrap();
        assert_eq!(lic.activated_date, Some(t1));
        assert_eq!(lic.activation_count, 2);
    }

    #[test]
    fn test_patch_cannot_activate_lapsed_license() {
        let mut lic = make_license();
        let err = lic
            .apply(
                LicensePatch {
                    status: Some(LicenseStatus::Active),
                    ..Default::default()
                },
                ts("2026-02-01T00:00:00Z"),
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::LicenseExpired { .. }));
        assert_eq!(lic.status, LicenseStatus::Pending);
    }

    #[test]
    fn test_features_are_idempotent() {
        let mut lic = make_license();
        let now = Timestamp::now();
        assert!(lic.add_feature("export", now).unwrap());
        assert!(!lic.add_feature("export", now).unwrap());
        assert!(lic.remove_feature("export", now));
        assert!(!lic.remove_feature("export", now));
        assert!(lic.add_feature(" ", now).is_err());
    }

    #[test]
    fn test_derived_getters() {
        let mut lic = make_license();
        let now = ts("2025-12-10T00:00:00Z");
        assert!(!lic.is_active(now));
        lic.transition(LicenseStatus::Active, now, "activate").unwrap();
        assert!(lic.is_active(now));
        assert_eq!(lic.days_until_expiry(now), 22);
        assert!(lic.is_expiring_soon(now));
        assert!(!lic.is_expiring_within(now, 7));
        assert!(!lic.is_active(ts("2026-01-02T00:00:00Z")));
        assert!(lic.is_expired(ts("2026-01-02T00:00:00Z")));
        assert_eq!(lic.days_since_issue(now), 343);
    }
}
