//! # License Activation Engine
//!
//! Activation, suspension, revocation, renewal and usage tracking for
//! licenses, layered on the license transition table and the deadline
//! policy.
//!
//! Every operation works on a copy of the license and writes it back only
//! when the whole operation succeeded: a refused renewal never leaves a
//! moved `ex_date` behind, and a refused activation never leaves
//! `terms_accepted` set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shop_core::{LicenseKey, Timestamp, ValidationError};

use crate::error::LifecycleError;
use crate::license::{License, LicenseStatus};

/// How a renewal computes the new expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RenewalPolicy {
    /// Add `days` to the current `ex_date`.
    Extend {
        /// Days to add, at least 1.
        days: i64,
    },
    /// Start a fresh period of `days` from now.
    NewPeriod {
        /// Period length, at least 1.
        days: i64,
    },
    /// Set an explicit expiry, which must be in the future.
    CustomDate {
        /// New expiry.
        date: Timestamp,
    },
}

impl RenewalPolicy {
    /// The expiry this policy yields for `license` at `now`.
    pub fn new_expiry(&self, license: &License, now: Timestamp) -> Result<Timestamp, LifecycleError> {
        match *self {
            Self::Extend { days } => shifted(license.ex_date, days),
            Self::NewPeriod { days } => shifted(now, days),
            Self::CustomDate { date } => {
                if date <= now {
                    return Err(LifecycleError::InvalidRenewalDate { date, now });
                }
                Ok(date)
            }
        }
    }
}

fn shifted(from: Timestamp, days: i64) -> Result<Timestamp, LifecycleError> {
    if days < 1 {
        return Err(ValidationError::new("days", format!("renewal period {days} must be at least 1 day")).into());
    }
    from.plus_days(days)
        .ok_or_else(|| ValidationError::new("days", format!("renewal period {days} is out of range")).into())
}

/// Outcome of [`LicenseActivationEngine::activate_by_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyActivation {
    /// Activation info was merged into usage data.
    pub usage_recorded: bool,
    /// The license was activated (terms were accepted).
    pub activated: bool,
}

/// Stateless engine over [`License`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseActivationEngine;

impl LicenseActivationEngine {
    /// Activate a license.
    ///
    /// Refused with `LicenseRevoked` for revoked licenses and with
    /// `LicenseExpired` once `now > ex_date`; the status is left unchanged
    /// in both cases. Accepting terms on first activation stamps
    /// `terms_accepted_date`.
    pub fn activate(&self, license: &mut License, now: Timestamp) -> Result<(), LifecycleError> {
        let mut next = license.clone();
        next.ensure_activatable(now)?;
        next.transition(LicenseStatus::Active, now, "activated")?;
        if !next.terms_accepted {
            next.terms_accepted = true;
            next.terms_accepted_date = Some(now);
        }
        next.updated_at = now;
        *license = next;
        tracing::info!(
            license_number = %license.license_number,
            activation_count = license.activation_count,
            "license activated"
        );
        Ok(())
    }

    /// Suspend an active license.
    pub fn suspend(&self, license: &mut License, now: Timestamp, reason: &str) -> Result<(), LifecycleError> {
        license.transition(LicenseStatus::Suspended, now, reason)?;
        tracing::info!(license_number = %license.license_number, reason, "license suspended");
        Ok(())
    }

    /// Revoke a license permanently, from any non-terminal status.
    ///
    /// This is an engine-only path: a user patch still follows the
    /// transition table, which reaches `revoked` from active and suspended
    /// licenses only.
    pub fn revoke(&self, license: &mut License, now: Timestamp, reason: &str) -> Result<(), LifecycleError> {
        license.revoke(now, reason)?;
        tracing::info!(license_number = %license.license_number, reason, "license revoked");
        Ok(())
    }

    /// Move `ex_date` according to `policy`. An expired or suspended license
    /// becomes active again.
    pub fn renew(&self, license: &mut License, policy: RenewalPolicy, now: Timestamp) -> Result<(), LifecycleError> {
        if license.status == LicenseStatus::Revoked {
            return Err(LifecycleError::LicenseRevoked {
                license_number: license.license_number.to_string(),
            });
        }
        let ex_date = policy.new_expiry(license, now)?;
        if ex_date <= license.in_date {
            return Err(ValidationError::new("ex_date", format!("{ex_date} must be after the issue date {}", license.in_date)).into());
        }

        let mut next = license.clone();
        let prior = next.status;
        next.ex_date = ex_date;
        if matches!(prior, LicenseStatus::Expired | LicenseStatus::Suspended) {
            next.transition(LicenseStatus::Active, now, "renewed")?;
        }
        next.updated_at = now;
        *license = next;
        tracing::info!(
            license_number = %license.license_number,
            ex_date = %license.ex_date,
            from = %prior,
            to = %license.status,
            "license renewed"
        );
        Ok(())
    }

    /// Merge `delta` into usage data (key-wise overwrite) and stamp
    /// `last_used_date`. Never changes status.
    pub fn record_usage(&self, license: &mut License, delta: Map<String, Value>, now: Timestamp) {
        license.usage_data.extend(delta);
        license.last_used_date = Some(now);
        license.updated_at = now;
    }

    /// Activation through a license key presented by a customer.
    ///
    /// `license` is the record the key resolved to. Revoked and lapsed
    /// licenses are refused before anything is written. Non-empty
    /// `activation_info` is merged into usage data; the license is
    /// activated only when `terms_accepted` is true.
    pub fn activate_by_key(
        &self,
        license: &mut License,
        key: &LicenseKey,
        terms_accepted: bool,
        activation_info: Map<String, Value>,
        now: Timestamp,
    ) -> Result<KeyActivation, LifecycleError> {
        if &license.license_key != key {
            return Err(ValidationError::new("license_key", format!("{key} does not belong to {}", license.license_number)).into());
        }
        license.ensure_activatable(now)?;

        let mut next = license.clone();
        let usage_recorded = !activation_info.is_empty();
        if usage_recorded {
            self.record_usage(&mut next, activation_info, now);
        }
        if terms_accepted {
            self.activate(&mut next, now)?;
        }
        *license = next;
        Ok(KeyActivation {
            usage_recorded,
            activated: terms_accepted,
        })
    }

    /// Move an active license whose period has lapsed to `expired`.
    /// Returns whether the status changed.
    pub fn expire_if_lapsed(&self, license: &mut License, now: Timestamp) -> Result<bool, LifecycleError> {
        if license.status != LicenseStatus::Active || !license.is_expired(now) {
            return Ok(false);
        }
        license.transition(LicenseStatus::Expired, now, "license period ended")?;
        tracing::info!(license_number = %license.license_number, ex_date = %license.ex_date, "license expired");
        Ok(true)
    }
}
