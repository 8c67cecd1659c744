// crates/certsync-core/src/runtime/reconcile.rs
// ============================================================================
// Module: Upsert Engine
// Description: Disposition-driven reconciliation of incoming certificate events.
// Purpose: Decide between create, conflict, and field-level update.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Reconciliation treats the stored disposition as the record state and the
//! incoming disposition as the transition. A new record takes every field from
//! the event. A repeated disposition is a conflict and changes nothing. Any
//! other transition updates the disposition, status code, and disposition
//! message, plus the fields the incoming disposition is authoritative for:
//!
//! | Incoming disposition | Extra fields updated |
//! |---|---|
//! | 30 (renewal) | `notAfter` |
//! | 31 (key recovery) | `keyRecoveryHashes` |
//! | 21 (revoked) | `revokedWhen`, `revokedEffectiveWhen`, `revokedReason` |
//! | anything else | none |
//!
//! Invariants:
//! - Updates never touch fields outside the table above.
//! - Planning is pure; storage backends persist exactly what [`FieldUpdate`]
//!   describes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::disposition::DispositionCode;
use crate::core::record::CertificateFields;

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Reconciliation decision for one incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertPlan {
    /// No record exists; insert the incoming fields in full.
    Create,
    /// The stored record already holds the incoming disposition.
    Conflict {
        /// Stored disposition.
        stored: DispositionCode,
    },
    /// Apply a partial update.
    Update(FieldUpdate),
}

/// Disposition-specific part of a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionChange {
    /// Only the always-updated fields change.
    None,
    /// Renewal: replace the validity end.
    NotAfter(OffsetDateTime),
    /// Key recovery: replace the key recovery hashes.
    KeyRecovery(Option<String>),
    /// Revocation: replace all revocation details.
    Revocation {
        /// Revocation time.
        when: Option<OffsetDateTime>,
        /// Revocation effective time.
        effective_when: Option<OffsetDateTime>,
        /// Revocation reason code.
        reason: Option<i64>,
    },
}

/// Partial update applied to an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// New disposition.
    pub disposition: DispositionCode,
    /// New status code.
    pub status_code: Option<i64>,
    /// New disposition message.
    pub disposition_message: Option<String>,
    /// Disposition-specific change.
    pub change: DispositionChange,
}

impl FieldUpdate {
    /// Builds the update an incoming event implies.
    #[must_use]
    pub fn from_incoming(incoming: &CertificateFields) -> Self {
        let change = match incoming.disposition {
            DispositionCode::RENEWAL => DispositionChange::NotAfter(incoming.not_after),
            DispositionCode::KEY_RECOVERY => {
                DispositionChange::KeyRecovery(incoming.key_recovery_hashes.clone())
            }
            DispositionCode::REVOKED => DispositionChange::Revocation {
                when: incoming.revoked_when,
                effective_when: incoming.revoked_effective_when,
                reason: incoming.revoked_reason,
            },
            _ => DispositionChange::None,
        };
        Self {
            disposition: incoming.disposition,
            status_code: incoming.status_code,
            disposition_message: incoming.disposition_message.clone(),
            change,
        }
    }

    /// Applies the update to a stored record.
    pub fn apply(&self, record: &mut CertificateFields) {
        record.disposition = self.disposition;
        record.status_code = self.status_code;
        record.disposition_message.clone_from(&self.disposition_message);
        match &self.change {
            DispositionChange::None => {}
            DispositionChange::NotAfter(not_after) => record.not_after = *not_after,
            DispositionChange::KeyRecovery(hashes) => {
                record.key_recovery_hashes.clone_from(hashes);
            }
            DispositionChange::Revocation {
                when,
                effective_when,
                reason,
            } => {
                record.revoked_when = *when;
                record.revoked_effective_when = *effective_when;
                record.revoked_reason = *reason;
            }
        }
    }
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Decides how an incoming event reconciles against the stored record.
#[must_use]
pub fn plan_upsert(
    existing: Option<&CertificateFields>,
    incoming: &CertificateFields,
) -> UpsertPlan {
    match existing {
        None => UpsertPlan::Create,
        Some(stored) if stored.disposition == incoming.disposition => UpsertPlan::Conflict {
            stored: stored.disposition,
        },
        Some(_) => UpsertPlan::Update(FieldUpdate::from_incoming(incoming)),
    }
}
