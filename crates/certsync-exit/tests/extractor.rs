// crates/certsync-exit/tests/extractor.rs
// ============================================================================
// Module: Extractor and Builder Tests
// Description: Property-bag extraction, SAN parsing, and delivery validation.
// Purpose: Ensure events are normalized and missing fields are all reported.
// Dependencies: certsync-core, certsync-exit
// ============================================================================

//! ## Overview
//! Drives the extractor with complete and partial property bags and checks
//! the payload the builder produces from the result.

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

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use certsync_core::DispositionCode;
use certsync_core::DispositionError;
use certsync_core::EventKind;
use certsync_exit::EventExtractor;
use certsync_exit::ExtractionError;
use certsync_exit::PropertyValue;
use certsync_exit::StaticTemplateResolver;
use certsync_exit::build_payload;
use certsync_exit::parse_sans;
use certsync_exit::validate_for_delivery;
use common::TEMPLATE_OID;
use common::complete_bag;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an extractor that knows the fixture template.
fn extractor() -> EventExtractor<StaticTemplateResolver> {
    let mut names = BTreeMap::new();
    names.insert(TEMPLATE_OID.to_string(), "WebServer".to_string());
    EventExtractor::new(
        "CA-01",
        "Example Issuing CA",
        StaticTemplateResolver::new(names),
        "UnknownTemplate",
    )
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

#[test]
fn complete_bag_extracts_every_field() {
    let event = extractor().extract(EventKind::Issued, &complete_bag("1A2B")).unwrap();
    assert_eq!(event.disposition, DispositionCode::ISSUED);
    assert_eq!(event.serial_number.as_deref(), Some("1A2B"));
    assert_eq!(event.request_id, Some(4711));
    assert_eq!(event.template_name.as_deref(), Some("WebServer"));
    assert_eq!(event.thumbprint.as_deref(), Some("abcdef01"));
    assert_eq!(event.public_key_length.as_deref(), Some("2048"));
    assert_eq!(event.key_recovery_hashes.as_deref(), Some(""));
    assert!(event.not_after.is_some());
    let attributes: Vec<(&str, &str)> = event
        .subject_attributes
        .iter()
        .map(|entry| (entry.attribute_type.as_str(), entry.attribute_value.as_str()))
        .collect();
    assert_eq!(
        attributes,
        vec![("CommonName", "www.example.test"), ("Organization", "Example Corp")]
    );
}

#[test]
fn symbolic_dispositions_are_normalized() {
    let mut bag = complete_bag("1A2B");
    bag.insert("Request_Disposition".to_string(), PropertyValue::Text("Revoked".to_string()));
    let event = extractor().extract(EventKind::Revoked, &bag).unwrap();
    assert_eq!(event.disposition, DispositionCode::REVOKED);
}

#[test]
fn unmapped_disposition_fails_extraction() {
    let mut bag = complete_bag("1A2B");
    bag.insert("Request_Disposition".to_string(), PropertyValue::Text("Archived".to_string()));
    assert_eq!(
        extractor().extract(EventKind::Issued, &bag),
        Err(ExtractionError::Disposition(DispositionError::Unmapped("Archived".to_string())))
    );
    bag.insert("Request_Disposition".to_string(), PropertyValue::Integer(99));
    assert_eq!(
        extractor().extract(EventKind::Issued, &bag),
        Err(ExtractionError::Disposition(DispositionError::OutOfRange(99)))
    );
    bag.remove("Request_Disposition");
    assert_eq!(
        extractor().extract(EventKind::Issued, &bag),
        Err(ExtractionError::MissingDisposition)
    );
}

#[test]
fn unknown_template_uses_fallback_name() {
    let mut bag = complete_bag("1A2B");
    bag.insert("CertificateTemplate".to_string(), PropertyValue::Text("9.9.9".to_string()));
    let event = extractor().extract(EventKind::Issued, &bag).unwrap();
    assert_eq!(event.template_oid.as_deref(), Some("9.9.9"));
    assert_eq!(event.template_name.as_deref(), Some("UnknownTemplate"));
}

// ============================================================================
// SECTION: SAN Parsing
// ============================================================================

#[test]
fn sans_are_read_from_certificate() {
    let sans = parse_sans(&common::certificate_der());
    let pairs: Vec<(&str, &str)> =
        sans.iter().map(|entry| (entry.san_type.as_str(), entry.value.as_str())).collect();
    assert_eq!(
        pairs,
        vec![
            ("dnsname", "www.example.test"),
            ("ipaddress", "10.0.0.1"),
            ("rfc822name", "ops@example.test"),
            ("url", "https://example.test/"),
        ]
    );
    assert!(sans.iter().all(|entry| entry.oid.is_none()));
}

#[test]
fn unparsable_certificate_yields_no_sans() {
    assert!(parse_sans(&[0x30, 0x03, 0x01, 0x02]).is_empty());
    let mut bag = complete_bag("1A2B");
    bag.insert("RawCertificate".to_string(), PropertyValue::Bytes(vec![0xde, 0xad]));
    let event = extractor().extract(EventKind::Issued, &bag).unwrap();
    assert!(event.sans.is_empty());
}

// ============================================================================
// SECTION: Payload Validation
// ============================================================================

#[test]
fn complete_payload_passes_validation() {
    let event = extractor().extract(EventKind::Issued, &complete_bag("1A2B")).unwrap();
    let payload = build_payload(&event);
    assert_eq!(payload.sans.len(), 4);
    validate_for_delivery(&payload, EventKind::Issued).unwrap();
}

#[test]
fn validation_lists_every_missing_field_in_order() {
    let mut bag = complete_bag("1A2B");
    let removed =
        ["SerialNumber", "NotBefore", "CertificateTemplate", "Request_SignerApplicationPolicies"];
    for name in removed {
        bag.remove(name);
    }
    let event = extractor().extract(EventKind::Revoked, &bag).unwrap();
    let error = validate_for_delivery(&build_payload(&event), EventKind::Revoked).unwrap_err();
    assert_eq!(
        error.missing,
        vec![
            "serialNumber",
            "notBefore",
            "templateOID",
            "signerApplicationPolicies",
            "revokedWhen",
            "revokedEffectiveWhen",
            "revokedReason",
        ]
    );
    assert!(error.to_string().contains("revokedReason"));
}

#[test]
fn revoked_payload_missing_reason_is_rejected() {
    let mut bag = complete_bag("1A2B");
    bag.insert(
        "Request_RevokedWhen".to_string(),
        PropertyValue::Text("2026-03-01T00:00:00Z".to_string()),
    );
    bag.insert(
        "Request_RevokedEffectiveWhen".to_string(),
        PropertyValue::Text("2026-03-01T00:00:00Z".to_string()),
    );
    let event = extractor().extract(EventKind::Revoked, &bag).unwrap();
    let error = validate_for_delivery(&build_payload(&event), EventKind::Revoked).unwrap_err();
    assert_eq!(error.missing, vec!["revokedReason"]);
}

#[test]
fn payload_uses_wire_field_names() {
    let event = extractor().extract(EventKind::Issued, &complete_bag("1A2B")).unwrap();
    let value = serde_json::to_value(build_payload(&event)).unwrap();
    assert_eq!(value["data"]["request_RequestID"], 4711);
    assert_eq!(value["data"]["templateOID"], TEMPLATE_OID);
    assert_eq!(value["data"]["keyRecoveryHashes"], "");
    assert!(value["data"]["revokedReason"].is_null());
    assert_eq!(value["sans"][0]["SANSType"], "dnsname");
    assert_eq!(value["subjectAttributes"][0]["attributeType"], "CommonName");
}
