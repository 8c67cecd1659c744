// crates/certsync-core/tests/upsert_engine.rs
// ============================================================================
// Module: Upsert Engine Tests
// Description: Verifies disposition-driven create, conflict, and partial update.
// Purpose: Ensure later events only touch the fields their disposition owns.
// Dependencies: certsync-core, proptest, time
// ============================================================================

//! ## Overview
//! Covers the reconciliation state machine: full create, idempotent conflict,
//! revocation, renewal, key recovery, and non-enumerated transitions. A
//! property test checks that no transition touches identity or validity-start
//! fields.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use certsync_core::CertificateFields;
use certsync_core::DispositionChange;
use certsync_core::DispositionCode;
use certsync_core::UpsertPlan;
use certsync_core::VALID_DISPOSITIONS;
use certsync_core::runtime::plan_upsert;
use proptest::prelude::*;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Plans `incoming` against an in-memory record and applies the plan.
fn reconcile(slot: &mut Option<CertificateFields>, incoming: &CertificateFields) -> UpsertPlan {
    let plan = plan_upsert(slot.as_ref(), incoming);
    match &plan {
        UpsertPlan::Create => *slot = Some(incoming.clone()),
        UpsertPlan::Update(update) => {
            if let Some(record) = slot.as_mut() {
                update.apply(record);
            }
        }
        UpsertPlan::Conflict {
            ..
        } => {}
    }
    plan
}

fn issued() -> CertificateFields {
    CertificateFields {
        ca_id: "CA01".to_string(),
        issuer_name: "Contoso Issuing CA".to_string(),
        serial_number: "1a2b3c".to_string(),
        request_id: 42,
        disposition: DispositionCode::ISSUED,
        submitted_when: datetime!(2026-01-05 10:00 UTC),
        resolved_when: Some(datetime!(2026-01-05 10:01 UTC)),
        not_before: datetime!(2026-01-05 10:00 UTC),
        not_after: datetime!(2027-01-05 10:00 UTC),
        revoked_when: None,
        revoked_effective_when: None,
        revoked_reason: None,
        template_oid: "1.3.6.1.4.1.311.21.8.1".to_string(),
        template_name: "WebServer".to_string(),
        thumbprint: "ab12cd34".to_string(),
        subject_key_identifier: Some("ski".to_string()),
        requester_name: Some("CONTOSO\\alice".to_string()),
        caller_name: Some("CONTOSO\\alice".to_string()),
        key_recovery_hashes: Some("original-hash".to_string()),
        signer_policies: None,
        signer_application_policies: Some("1.3.6.1.5.5.7.3.1".to_string()),
        public_key_length: Some("2048".to_string()),
        public_key_algorithm: Some("RSA".to_string()),
        disposition_message: Some("Issued".to_string()),
        status_code: Some(0),
        request_type: Some(1),
        request_flags: Some(0),
    }
}

fn with_disposition(code: DispositionCode) -> CertificateFields {
    let mut fields = issued();
    fields.disposition = code;
    fields.disposition_message = Some(format!("moved to {code}"));
    fields.status_code = Some(code.code());
    fields.not_before = datetime!(2030-01-01 00:00 UTC);
    fields.not_after = datetime!(2031-01-01 00:00 UTC);
    fields.thumbprint = "different".to_string();
    fields.key_recovery_hashes = Some("new-hash".to_string());
    fields.revoked_when = Some(datetime!(2026-06-01 00:00 UTC));
    fields.revoked_effective_when = Some(datetime!(2026-06-02 00:00 UTC));
    fields.revoked_reason = Some(4);
    fields
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn missing_record_is_created_in_full() {
    let mut slot = None;
    let plan = reconcile(&mut slot, &issued());
    assert_eq!(plan, UpsertPlan::Create);
    assert_eq!(slot, Some(issued()));
}

#[test]
fn same_disposition_is_a_conflict_and_changes_nothing() {
    let mut slot = Some(issued());
    let mut resend = issued();
    resend.disposition_message = Some("changed".to_string());
    let plan = reconcile(&mut slot, &resend);
    assert_eq!(
        plan,
        UpsertPlan::Conflict {
            stored: DispositionCode::ISSUED
        }
    );
    assert_eq!(slot, Some(issued()));
}

#[test]
fn revocation_updates_only_revocation_fields_and_trio() {
    let mut slot = Some(issued());
    let incoming = with_disposition(DispositionCode::REVOKED);
    let plan = reconcile(&mut slot, &incoming);
    assert!(matches!(
        plan,
        UpsertPlan::Update(ref update)
            if matches!(update.change, DispositionChange::Revocation { .. })
    ));
    let record = slot.unwrap();
    let mut expected = issued();
    expected.disposition = DispositionCode::REVOKED;
    expected.status_code = incoming.status_code;
    expected.disposition_message.clone_from(&incoming.disposition_message);
    expected.revoked_when = incoming.revoked_when;
    expected.revoked_effective_when = incoming.revoked_effective_when;
    expected.revoked_reason = incoming.revoked_reason;
    assert_eq!(record, expected);
}

#[test]
fn renewal_updates_not_after_and_keeps_revocation() {
    let mut slot = Some(issued());
    reconcile(&mut slot, &with_disposition(DispositionCode::REVOKED));
    let revoked = slot.clone().unwrap();
    let renewal = with_disposition(DispositionCode::RENEWAL);
    reconcile(&mut slot, &renewal);
    let record = slot.unwrap();
    assert_eq!(record.disposition, DispositionCode::RENEWAL);
    assert_eq!(record.not_after, renewal.not_after);
    assert_eq!(record.not_before, revoked.not_before);
    assert_eq!(record.revoked_when, revoked.revoked_when);
    assert_eq!(record.revoked_reason, revoked.revoked_reason);
    assert_eq!(record.key_recovery_hashes, revoked.key_recovery_hashes);
}

#[test]
fn key_recovery_updates_hashes_only() {
    let mut slot = Some(issued());
    let incoming = with_disposition(DispositionCode::KEY_RECOVERY);
    reconcile(&mut slot, &incoming);
    let record = slot.unwrap();
    assert_eq!(record.key_recovery_hashes.as_deref(), Some("new-hash"));
    assert_eq!(record.not_after, issued().not_after);
    assert_eq!(record.revoked_when, None);
}

#[test]
fn non_enumerated_transition_updates_trio_only() {
    let mut pending = issued();
    pending.disposition = DispositionCode::PENDING;
    let mut slot = Some(pending.clone());
    let denied = with_disposition(DispositionCode::DENIED);
    let plan = plan_upsert(slot.as_ref(), &denied);
    assert!(matches!(
        plan,
        UpsertPlan::Update(ref update) if update.change == DispositionChange::None
    ));
    reconcile(&mut slot, &denied);
    let record = slot.unwrap();
    let mut expected = pending;
    expected.disposition = DispositionCode::DENIED;
    expected.status_code = denied.status_code;
    expected.disposition_message = denied.disposition_message;
    assert_eq!(record, expected);
}

// ============================================================================
// SECTION: Properties
// ============================================================================

fn disposition_strategy() -> impl Strategy<Value = DispositionCode> {
    prop::sample::select(VALID_DISPOSITIONS.to_vec())
        .prop_map(|code| DispositionCode::new(code).unwrap())
}

proptest! {
    #[test]
    fn transitions_never_touch_identity_fields(
        sequence in prop::collection::vec(disposition_strategy(), 1..12)
    ) {
        let original = issued();
        let mut slot = Some(original.clone());
        for code in sequence {
            let before = slot.clone().unwrap();
            let plan = reconcile(&mut slot, &with_disposition(code));
            let after = slot.clone().unwrap();
            prop_assert_eq!(&after.ca_id, &original.ca_id);
            prop_assert_eq!(&after.serial_number, &original.serial_number);
            prop_assert_eq!(after.not_before, original.not_before);
            prop_assert_eq!(&after.thumbprint, &original.thumbprint);
            prop_assert_eq!(after.disposition, code);
            if before.disposition == code {
                prop_assert_eq!(&after, &before);
                let is_conflict = matches!(plan, UpsertPlan::Conflict { .. });
                prop_assert!(is_conflict);
            }
        }
    }
}
