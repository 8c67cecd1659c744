// crates/certsync-core/tests/ingest_validation.rs
// ============================================================================
// Module: Ingestion Validation Tests
// Description: Verifies payload parsing, classification, and violation reports.
// Purpose: Ensure malformed deliveries are rejected with every problem listed.
// Dependencies: certsync-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises case-insensitive key matching, schema violations, the closed
//! disposition set, and revocation completeness for revoked payloads.

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

use certsync_core::DispositionCode;
use certsync_core::RejectionKind;
use certsync_core::ViolationProblem;
use certsync_core::runtime::declared_text;
use certsync_core::runtime::parse_document;
use certsync_core::runtime::parse_submission;
use certsync_core::runtime::parse_submission_bytes;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn issued_payload() -> Value {
    json!({
        "data": {
            "caId": "CA01",
            "issuerName": "Contoso Issuing CA",
            "serialNumber": "1a2b3c",
            "request_RequestID": 42,
            "disposition": 20,
            "submittedWhen": "2026-01-05T10:00:00Z",
            "notBefore": "2026-01-05T10:00:00Z",
            "notAfter": "2027-01-05T10:00:00Z",
            "templateOID": "1.3.6.1.4.1.311.21.8.1",
            "templateName": "WebServer",
            "keyRecoveryHashes": "",
            "signerApplicationPolicies": "1.3.6.1.5.5.7.3.1",
            "thumbprint": "ab12cd34",
            "publicKeyLength": 2048,
            "statusCode": 0
        },
        "sans": [
            { "SANSType": "dnsname", "OID": null, "Value": "www.example.test" },
            { "SANSType": "", "OID": null, "Value": "dropped" }
        ],
        "subjectAttributes": [
            { "attributeType": "CommonName", "attributeValue": "www.example.test" },
            { "attributeType": "Organization", "attributeValue": "  " }
        ]
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn valid_payload_parses_into_typed_submission() {
    let submission = parse_submission(&issued_payload()).unwrap();
    assert_eq!(submission.fields.ca_id, "CA01");
    assert_eq!(submission.fields.request_id, 42);
    assert_eq!(submission.fields.disposition, DispositionCode::ISSUED);
    assert_eq!(submission.fields.public_key_length.as_deref(), Some("2048"));
    assert_eq!(submission.fields.key_recovery_hashes, None);
    assert_eq!(submission.sans.len(), 1);
    assert_eq!(submission.attributes.len(), 1);
}

#[test]
fn ca_id_is_trimmed_and_upper_cased() {
    let mut payload = issued_payload();
    payload["data"]["caId"] = json!("  ca-01 ");
    let submission = parse_submission(&payload).unwrap();
    assert_eq!(submission.fields.ca_id, "CA-01");
}

#[test]
fn keys_match_case_insensitively() {
    let payload = json!({
        "Data": {
            "CAID": "CA01",
            "IssuerName": "Contoso Issuing CA",
            "SerialNumber": "1a2b3c",
            "Request_RequestId": "42",
            "Disposition": "21",
            "SubmittedWhen": "2026-01-05T10:00:00Z",
            "NotBefore": "2026-01-05T10:00:00Z",
            "NotAfter": "2027-01-05T10:00:00Z",
            "TemplateOid": "1.3.6.1.4.1.311.21.8.1",
            "Thumbprint": "ab12cd34",
            "RevokedWhen": "2026-03-01T00:00:00Z",
            "REVOKEDEFFECTIVEWHEN": "2026-03-01T00:00:00Z",
            "RevokedReason": 1
        },
        "SANS": [{ "sansType": "dnsname", "value": "a.example.test" }]
    });
    let submission = parse_submission(&payload).unwrap();
    assert_eq!(submission.fields.disposition, DispositionCode::REVOKED);
    assert_eq!(submission.fields.revoked_reason, Some(1));
    assert_eq!(submission.fields.template_name, "1.3.6.1.4.1.311.21.8.1");
    assert_eq!(submission.sans[0].value, "a.example.test");
}

#[test]
fn schema_rejection_lists_every_violation() {
    let mut payload = issued_payload();
    let data = payload["data"].as_object_mut().unwrap();
    data.remove("caId");
    data.remove("thumbprint");
    data.insert("serialNumber".to_string(), json!("x".repeat(129)));
    data.insert("notAfter".to_string(), json!("next tuesday"));
    data.insert("request_RequestID".to_string(), json!(true));
    let rejection = parse_submission(&payload).unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Schema);
    for field in ["caId", "thumbprint", "serialNumber", "notAfter", "request_RequestID"] {
        assert!(rejection.mentions(field), "missing violation for {field}");
    }
    let serial = rejection.violations.iter().find(|v| v.field == "serialNumber").unwrap();
    assert_eq!(
        serial.problem,
        ViolationProblem::TooLong {
            max_length: 128
        }
    );
}

#[test]
fn disposition_outside_set_is_rejected() {
    let mut payload = issued_payload();
    payload["data"]["disposition"] = json!(22);
    let rejection = parse_submission(&payload).unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Disposition);
    assert!(rejection.mentions("disposition"));
}

#[test]
fn revoked_without_reason_lists_revoked_reason() {
    let mut payload = issued_payload();
    payload["data"]["disposition"] = json!(21);
    payload["data"]["revokedWhen"] = json!("2026-03-01T00:00:00Z");
    payload["data"]["revokedEffectiveWhen"] = json!("2026-03-01T00:00:00Z");
    let rejection = parse_submission(&payload).unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Validation);
    assert_eq!(rejection.violations.len(), 1);
    assert_eq!(rejection.violations[0].field, "revokedReason");
    assert_eq!(rejection.violations[0].problem, ViolationProblem::Missing);
}

#[test]
fn envelope_errors_are_schema_errors() {
    let rejection = parse_submission_bytes(b"").unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Schema);
    let rejection = parse_submission_bytes(b"{not json").unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Schema);
    let rejection = parse_submission(&json!({ "sans": "nope" })).unwrap_err();
    assert!(rejection.mentions("data"));
    assert!(rejection.mentions("sans"));
}

#[test]
fn too_many_sans_is_a_schema_error() {
    let mut payload = issued_payload();
    let sans: Vec<Value> = (0..=certsync_core::runtime::ingest::MAX_SANS)
        .map(|index| json!({ "SANSType": "dnsname", "Value": format!("h{index}.test") }))
        .collect();
    payload["sans"] = Value::Array(sans);
    let rejection = parse_submission(&payload).unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Schema);
    assert!(rejection.mentions("sans"));
}

#[test]
fn rejection_serializes_with_error_label() {
    let mut payload = issued_payload();
    payload["data"]["disposition"] = json!(3);
    let rejection = parse_submission(&payload).unwrap_err();
    let value = serde_json::to_value(&rejection).unwrap();
    assert_eq!(value["error"], "disposition_error");
    assert_eq!(value["violations"][0]["field"], "disposition");
    assert_eq!(value["violations"][0]["problem"], "invalid_value");
}

#[test]
fn declared_text_reads_keys_case_insensitively() {
    let document = json!({ "DATA": { "CAID": "  ca01 ", "serialNumber": "" } });
    assert_eq!(declared_text(&document, "caId").as_deref(), Some("ca01"));
    assert_eq!(declared_text(&document, "serialNumber"), None);
    assert_eq!(declared_text(&json!([1, 2]), "caId"), None);
    assert_eq!(parse_document(b"  ").unwrap_err().kind, RejectionKind::Schema);
}
