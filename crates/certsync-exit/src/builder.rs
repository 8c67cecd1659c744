// crates/certsync-exit/src/builder.rs
// ============================================================================
// Module: Payload Builder
// Description: Wire payload construction and pre-delivery validation.
// Purpose: Turn certificate events into payloads and name every missing field.
// Dependencies: certsync-core
// ============================================================================

//! ## Overview
//! Building never fails: absent fields serialize as `null` so a payload can
//! always be buffered. [`validate_for_delivery`] then reports every missing
//! mandatory field in wire order, plus the revocation trio for revoked events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use certsync_core::CertificateData;
use certsync_core::CertificateEvent;
use certsync_core::CertificatePayload;
use certsync_core::EventKind;
use certsync_core::core::payload::fields;
use certsync_core::core::payload::format_timestamp;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mandatory fields missing from a payload.
///
/// # Invariants
/// - `missing` is non-empty and in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    /// Wire names of the missing fields.
    pub missing: Vec<&'static str>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the wire payload for an event.
#[must_use]
pub fn build_payload(event: &CertificateEvent) -> CertificatePayload {
    CertificatePayload {
        data: CertificateData {
            ca_id: Some(event.ca_id.clone()),
            issuer_name: Some(event.issuer_name.clone()),
            serial_number: event.serial_number.clone(),
            request_id: event.request_id,
            disposition: Some(event.disposition.code()),
            submitted_when: stamp(event.submitted_when),
            resolved_when: stamp(event.resolved_when),
            not_before: stamp(event.not_before),
            not_after: stamp(event.not_after),
            template_oid: event.template_oid.clone(),
            template_name: event.template_name.clone(),
            key_recovery_hashes: event.key_recovery_hashes.clone(),
            signer_application_policies: event.signer_application_policies.clone(),
            requester_name: event.requester_name.clone(),
            caller_name: event.caller_name.clone(),
            subject_key_identifier: event.subject_key_identifier.clone(),
            thumbprint: event.thumbprint.clone(),
            public_key_length: event.public_key_length.clone(),
            public_key_algorithm: event.public_key_algorithm.clone(),
            disposition_message: event.disposition_message.clone(),
            signer_policies: event.signer_policies.clone(),
            status_code: event.status_code,
            request_type: event.request_type,
            request_flags: event.request_flags,
            revoked_when: stamp(event.revoked_when),
            revoked_effective_when: stamp(event.revoked_effective_when),
            revoked_reason: event.revoked_reason,
        },
        sans: event.sans.clone(),
        subject_attributes: event.subject_attributes.clone(),
    }
}

/// Checks that a payload carries every field the registry requires.
///
/// # Errors
///
/// Returns [`ValidationError`] listing every missing field.
pub fn validate_for_delivery(
    payload: &CertificatePayload,
    kind: EventKind,
) -> Result<(), ValidationError> {
    let data = &payload.data;
    let mut checks = vec![
        (fields::CA_ID, filled(data.ca_id.as_deref())),
        (fields::ISSUER_NAME, filled(data.issuer_name.as_deref())),
        (fields::SERIAL_NUMBER, filled(data.serial_number.as_deref())),
        (fields::REQUEST_ID, data.request_id.is_some()),
        (fields::DISPOSITION, data.disposition.is_some()),
        (fields::SUBMITTED_WHEN, data.submitted_when.is_some()),
        (fields::NOT_BEFORE, data.not_before.is_some()),
        (fields::NOT_AFTER, data.not_after.is_some()),
        (fields::TEMPLATE_OID, filled(data.template_oid.as_deref())),
        (fields::TEMPLATE_NAME, filled(data.template_name.as_deref())),
        // Present-but-empty is accepted for key recovery.
        (fields::KEY_RECOVERY_HASHES, data.key_recovery_hashes.is_some()),
        (fields::SIGNER_APPLICATION_POLICIES, filled(data.signer_application_policies.as_deref())),
    ];
    if kind.requires_revocation() {
        checks.push((fields::REVOKED_WHEN, data.revoked_when.is_some()));
        checks.push((fields::REVOKED_EFFECTIVE_WHEN, data.revoked_effective_when.is_some()));
        checks.push((fields::REVOKED_REASON, data.revoked_reason.is_some()));
    }
    let missing: Vec<&'static str> =
        checks.into_iter().filter(|(_, present)| !present).map(|(name, _)| name).collect();
    if missing.is_empty() { Ok(()) } else { Err(ValidationError { missing }) }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Formats an optional timestamp for the wire.
fn stamp(value: Option<OffsetDateTime>) -> Option<String> {
    value.and_then(format_timestamp)
}

/// Returns true when text is present and non-blank.
fn filled(value: Option<&str>) -> bool {
    value.is_some_and(|text| !text.trim().is_empty())
}
