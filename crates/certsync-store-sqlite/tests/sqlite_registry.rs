// crates/certsync-store-sqlite/tests/sqlite_registry.rs
// ============================================================================
// Module: SQLite Registry Tests
// Description: Persistence tests for certificate upserts and expiry reads.
// Purpose: Ensure stored records follow disposition-gated update rules.
// Dependencies: certsync-store-sqlite, certsync-core, tempfile, proptest
// ============================================================================

//! ## Overview
//! Covers idempotent resubmission, field-level updates, SAN deduplication,
//! concurrent first delivery from two connections, the expiring query, and
//! schema version checks.

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

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use certsync_core::CertificateFields;
use certsync_core::CertificateRegistry;
use certsync_core::CertificateSubmission;
use certsync_core::DispositionCode;
use certsync_core::SanEntry;
use certsync_core::SubjectAttributeEntry;
use certsync_core::SubmitOutcome;
use certsync_store_sqlite::SqliteRegistry;
use certsync_store_sqlite::SqliteStoreConfig;
use certsync_store_sqlite::SqliteStoreError;
use proptest::prelude::*;
use rusqlite::Connection;
use tempfile::TempDir;
use time::macros::datetime;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    registry: SqliteRegistry,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("registry").join("certsync.db");
    let registry = SqliteRegistry::new(SqliteStoreConfig::at_path(&path)).expect("open registry");
    Fixture {
        _dir: dir,
        path,
        registry,
    }
}

fn san(san_type: &str, value: &str) -> SanEntry {
    SanEntry {
        san_type: san_type.to_string(),
        oid: None,
        value: value.to_string(),
    }
}

fn issued_fields(serial: &str) -> CertificateFields {
    CertificateFields {
        ca_id: "CA01".to_string(),
        issuer_name: "Contoso Issuing CA".to_string(),
        serial_number: serial.to_string(),
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
        key_recovery_hashes: None,
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

fn submission(fields: CertificateFields) -> CertificateSubmission {
    CertificateSubmission {
        fields,
        sans: vec![san("dnsname", "www.example.test"), san("ipaddress", "10.0.0.1")],
        attributes: vec![SubjectAttributeEntry {
            attribute_type: "CommonName".to_string(),
            attribute_value: "www.example.test".to_string(),
        }],
    }
}

fn revoked_fields(serial: &str) -> CertificateFields {
    let mut fields = issued_fields(serial);
    fields.disposition = DispositionCode::REVOKED;
    fields.disposition_message = Some("Revoked by admin".to_string());
    fields.status_code = Some(21);
    fields.not_after = datetime!(2040-01-01 00:00 UTC);
    fields.thumbprint = "ignored".to_string();
    fields.revoked_when = Some(datetime!(2026-03-01 08:00 UTC));
    fields.revoked_effective_when = Some(datetime!(2026-03-01 08:05 UTC));
    fields.revoked_reason = Some(1);
    fields
}

// ============================================================================
// SECTION: Upsert Tests
// ============================================================================

#[test]
fn first_submission_creates_full_record() {
    let fixture = fixture();
    let outcome = fixture.registry.submit(&submission(issued_fields("01"))).unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Created {
            sans_added: 2,
            attributes_added: 1,
            ..
        }
    ));
    let detail = fixture.registry.certificate("CA01", "01").unwrap().unwrap();
    assert_eq!(detail.fields, issued_fields("01"));
    assert_eq!(detail.sans.len(), 2);
    assert_eq!(detail.subject_attributes[0].attribute_value, "www.example.test");
}

#[test]
fn resubmission_is_conflict_without_changes() {
    let fixture = fixture();
    let first = fixture.registry.submit(&submission(issued_fields("02"))).unwrap();
    let before = fixture.registry.certificate("CA01", "02").unwrap().unwrap();
    let mut resend = submission(issued_fields("02"));
    resend.fields.disposition_message = Some("changed".to_string());
    resend.sans.push(san("dnsname", "new.example.test"));
    let second = fixture.registry.submit(&resend).unwrap();
    let SubmitOutcome::Created {
        certificate_id, ..
    } = first
    else {
        panic!("expected created, got {first:?}");
    };
    assert_eq!(
        second,
        SubmitOutcome::Conflict {
            certificate_id,
            disposition: DispositionCode::ISSUED,
        }
    );
    let after = fixture.registry.certificate("CA01", "02").unwrap().unwrap();
    assert_eq!(after, before);
}

#[test]
fn revocation_updates_only_revocation_fields() {
    let fixture = fixture();
    fixture.registry.submit(&submission(issued_fields("03"))).unwrap();
    let outcome = fixture.registry.submit(&submission(revoked_fields("03"))).unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Updated {
            sans_added: 0,
            attributes_added: 1,
            ..
        }
    ));
    let stored = fixture.registry.certificate("CA01", "03").unwrap().unwrap().fields;
    let incoming = revoked_fields("03");
    let mut expected = issued_fields("03");
    expected.disposition = DispositionCode::REVOKED;
    expected.disposition_message = incoming.disposition_message;
    expected.status_code = incoming.status_code;
    expected.revoked_when = incoming.revoked_when;
    expected.revoked_effective_when = incoming.revoked_effective_when;
    expected.revoked_reason = incoming.revoked_reason;
    assert_eq!(stored, expected);
}

#[test]
fn renewal_updates_not_after_and_keeps_revocation() {
    let fixture = fixture();
    fixture.registry.submit(&submission(issued_fields("04"))).unwrap();
    fixture.registry.submit(&submission(revoked_fields("04"))).unwrap();
    let mut renewal = issued_fields("04");
    renewal.disposition = DispositionCode::RENEWAL;
    renewal.not_after = datetime!(2028-01-05 10:00 UTC);
    fixture.registry.submit(&submission(renewal)).unwrap();
    let stored = fixture.registry.certificate("CA01", "04").unwrap().unwrap().fields;
    assert_eq!(stored.disposition, DispositionCode::RENEWAL);
    assert_eq!(stored.not_after, datetime!(2028-01-05 10:00 UTC));
    assert_eq!(stored.revoked_reason, Some(1));
    assert_eq!(stored.revoked_when, Some(datetime!(2026-03-01 08:00 UTC)));
}

#[test]
fn duplicate_sans_are_stored_once() {
    let fixture = fixture();
    let mut first = submission(issued_fields("05"));
    first.sans.push(san("dnsname", "www.example.test"));
    fixture.registry.submit(&first).unwrap();
    let mut second = submission(revoked_fields("05"));
    second.sans = vec![san("dnsname", "www.example.test"), san("url", "https://example.test/")];
    let outcome = fixture.registry.submit(&second).unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Updated {
            sans_added: 1,
            ..
        }
    ));
    let detail = fixture.registry.certificate("CA01", "05").unwrap().unwrap();
    let values: Vec<_> = detail.sans.iter().map(|entry| entry.value.as_str()).collect();
    assert_eq!(values, vec!["www.example.test", "10.0.0.1", "https://example.test/"]);
}

#[test]
fn concurrent_first_delivery_creates_one_record() {
    let fixture = fixture();
    let other = SqliteRegistry::new(SqliteStoreConfig::at_path(&fixture.path)).unwrap();
    let registries = [fixture.registry.clone(), other];
    let barrier = Arc::new(Barrier::new(registries.len()));
    let handles: Vec<_> = registries
        .into_iter()
        .map(|registry| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.submit(&submission(issued_fields("06"))).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let created = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SubmitOutcome::Created { .. }))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SubmitOutcome::Conflict { .. }))
        .count();
    assert_eq!((created, conflicts), (1, 1));
    let connection = Connection::open(&fixture.path).unwrap();
    let rows: i64 = connection
        .query_row("SELECT COUNT(*) FROM certificates WHERE serial_number = '06'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(rows, 1);
}

// ============================================================================
// SECTION: Read Tests
// ============================================================================

#[test]
fn expiring_lists_issued_records_before_cutoff() {
    let fixture = fixture();
    let mut soon = issued_fields("10");
    soon.not_after = datetime!(2027-01-20 00:00 UTC);
    let sooner = issued_fields("11");
    let mut later = issued_fields("12");
    later.not_after = datetime!(2030-01-01 00:00 UTC);
    for fields in [soon, sooner, later] {
        fixture.registry.submit(&submission(fields)).unwrap();
    }
    let mut revoked = issued_fields("13");
    revoked.not_after = datetime!(2026-12-01 00:00 UTC);
    fixture.registry.submit(&submission(revoked)).unwrap();
    fixture.registry.submit(&submission(revoked_fields("13"))).unwrap();

    let expiring = fixture.registry.expiring_before(datetime!(2027-02-01 00:00 UTC)).unwrap();
    let serials: Vec<_> = expiring.iter().map(|summary| summary.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["11", "10"]);
    assert_eq!(expiring[0].template_name, "WebServer");
}

#[test]
fn unknown_certificate_reads_as_none() {
    let fixture = fixture();
    assert!(fixture.registry.certificate("CA01", "missing").unwrap().is_none());
}

#[test]
fn schema_version_mismatch_fails_closed() {
    let fixture = fixture();
    drop(fixture.registry);
    let connection = Connection::open(&fixture.path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);
    let error = SqliteRegistry::new(SqliteStoreConfig::at_path(&fixture.path)).err().unwrap();
    assert!(matches!(error, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let error = SqliteRegistry::new(SqliteStoreConfig::at_path(dir.path())).err().unwrap();
    assert!(matches!(error, SqliteStoreError::Invalid(_)));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

fn san_strategy() -> impl Strategy<Value = SanEntry> {
    (prop::sample::select(vec!["dnsname", "url", "ipaddress"]), "[a-c]{1,2}")
        .prop_map(|(san_type, value)| san(san_type, &value))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn stored_sans_never_repeat(
        batches in prop::collection::vec(prop::collection::vec(san_strategy(), 0..6), 1..4)
    ) {
        let fixture = fixture();
        let dispositions = [
            DispositionCode::ISSUED,
            DispositionCode::REVOKED,
            DispositionCode::RENEWAL,
            DispositionCode::KEY_RECOVERY,
        ];
        for (batch, disposition) in batches.iter().zip(dispositions) {
            let mut fields = issued_fields("20");
            fields.disposition = disposition;
            fields.revoked_when = Some(datetime!(2026-03-01 08:00 UTC));
            fields.revoked_effective_when = Some(datetime!(2026-03-01 08:00 UTC));
            fields.revoked_reason = Some(4);
            let mut request = submission(fields);
            request.sans.clone_from(batch);
            fixture.registry.submit(&request).unwrap();
        }
        let detail = fixture.registry.certificate("CA01", "20").unwrap().unwrap();
        let mut keys: Vec<_> =
            detail.sans.iter().map(|entry| (entry.san_type.clone(), entry.value.clone())).collect();
        let stored = keys.len();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), stored);
        let expected: std::collections::BTreeSet<_> = batches
            .iter()
            .flatten()
            .map(|entry| (entry.san_type.clone(), entry.value.clone()))
            .collect();
        prop_assert_eq!(keys.into_iter().collect::<std::collections::BTreeSet<_>>(), expected);
    }
}
