// crates/certsync-core/src/core/payload.rs
// ============================================================================
// Module: Wire Payload
// Description: JSON payload exchanged between producers and the registry.
// Purpose: Define the serialized shape of a certificate event delivery.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`CertificatePayload`] carries one certificate event as `data` plus the
//! SAN and subject-attribute lists. Every `data` field is optional on the wire
//! so a payload that fails producer-side validation can still be serialized
//! and buffered. Timestamps travel as RFC 3339 strings.
//!
//! Field names are part of the wire contract; [`fields`] lists the canonical
//! spelling used in payloads and in validation reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Field Names
// ============================================================================

/// Canonical wire field names.
pub mod fields {
    /// Payload data object.
    pub const DATA: &str = "data";
    /// SAN list.
    pub const SANS: &str = "sans";
    /// Subject attribute list.
    pub const SUBJECT_ATTRIBUTES: &str = "subjectAttributes";
    /// Issuing authority identifier.
    pub const CA_ID: &str = "caId";
    /// Issuing authority display name.
    pub const ISSUER_NAME: &str = "issuerName";
    /// Certificate serial number.
    pub const SERIAL_NUMBER: &str = "serialNumber";
    /// Authority request identifier.
    pub const REQUEST_ID: &str = "request_RequestID";
    /// Disposition code.
    pub const DISPOSITION: &str = "disposition";
    /// Request submission time.
    pub const SUBMITTED_WHEN: &str = "submittedWhen";
    /// Request resolution time.
    pub const RESOLVED_WHEN: &str = "resolvedWhen";
    /// Validity start.
    pub const NOT_BEFORE: &str = "notBefore";
    /// Validity end.
    pub const NOT_AFTER: &str = "notAfter";
    /// Template object identifier.
    pub const TEMPLATE_OID: &str = "templateOID";
    /// Template display name.
    pub const TEMPLATE_NAME: &str = "templateName";
    /// Key recovery hashes.
    pub const KEY_RECOVERY_HASHES: &str = "keyRecoveryHashes";
    /// Signer application policies.
    pub const SIGNER_APPLICATION_POLICIES: &str = "signerApplicationPolicies";
    /// Signer policies.
    pub const SIGNER_POLICIES: &str = "signerPolicies";
    /// Requester identity.
    pub const REQUESTER_NAME: &str = "requesterName";
    /// Caller identity.
    pub const CALLER_NAME: &str = "callerName";
    /// Subject key identifier.
    pub const SUBJECT_KEY_IDENTIFIER: &str = "subjectKeyIdentifier";
    /// Certificate thumbprint.
    pub const THUMBPRINT: &str = "thumbprint";
    /// Public key length.
    pub const PUBLIC_KEY_LENGTH: &str = "publicKeyLength";
    /// Public key algorithm.
    pub const PUBLIC_KEY_ALGORITHM: &str = "publicKeyAlgorithm";
    /// Disposition message.
    pub const DISPOSITION_MESSAGE: &str = "dispositionMessage";
    /// Authority status code.
    pub const STATUS_CODE: &str = "statusCode";
    /// Request type flags.
    pub const REQUEST_TYPE: &str = "requestType";
    /// Request flags.
    pub const REQUEST_FLAGS: &str = "requestFlags";
    /// Revocation time.
    pub const REVOKED_WHEN: &str = "revokedWhen";
    /// Revocation effective time.
    pub const REVOKED_EFFECTIVE_WHEN: &str = "revokedEffectiveWhen";
    /// Revocation reason code.
    pub const REVOKED_REASON: &str = "revokedReason";
    /// SAN type.
    pub const SAN_TYPE: &str = "SANSType";
    /// SAN object identifier.
    pub const SAN_OID: &str = "OID";
    /// SAN value.
    pub const SAN_VALUE: &str = "Value";
    /// Subject attribute type.
    pub const ATTRIBUTE_TYPE: &str = "attributeType";
    /// Subject attribute value.
    pub const ATTRIBUTE_VALUE: &str = "attributeValue";
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Wire payload for one certificate event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePayload {
    /// Certificate metadata.
    pub data: CertificateData,
    /// Subject alternative names.
    #[serde(default)]
    pub sans: Vec<SanEntry>,
    /// Subject attributes.
    #[serde(default)]
    pub subject_attributes: Vec<SubjectAttributeEntry>,
}

impl CertificatePayload {
    /// Returns the serial number when present and non-empty.
    #[must_use]
    pub fn serial_number(&self) -> Option<&str> {
        self.data.serial_number.as_deref().filter(|value| !value.trim().is_empty())
    }
}

/// Certificate metadata carried in the `data` object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    /// Issuing authority identifier.
    pub ca_id: Option<String>,
    /// Issuing authority display name.
    pub issuer_name: Option<String>,
    /// Certificate serial number.
    pub serial_number: Option<String>,
    /// Authority request identifier.
    #[serde(rename = "request_RequestID")]
    pub request_id: Option<i64>,
    /// Disposition code.
    pub disposition: Option<i64>,
    /// Request submission time (RFC 3339).
    pub submitted_when: Option<String>,
    /// Request resolution time (RFC 3339).
    pub resolved_when: Option<String>,
    /// Validity start (RFC 3339).
    pub not_before: Option<String>,
    /// Validity end (RFC 3339).
    pub not_after: Option<String>,
    /// Template object identifier.
    #[serde(rename = "templateOID")]
    pub template_oid: Option<String>,
    /// Template display name.
    pub template_name: Option<String>,
    /// Key recovery hashes.
    pub key_recovery_hashes: Option<String>,
    /// Signer application policies.
    pub signer_application_policies: Option<String>,
    /// Requester identity.
    pub requester_name: Option<String>,
    /// Caller identity.
    pub caller_name: Option<String>,
    /// Subject key identifier.
    pub subject_key_identifier: Option<String>,
    /// Certificate thumbprint.
    pub thumbprint: Option<String>,
    /// Public key length.
    pub public_key_length: Option<String>,
    /// Public key algorithm.
    pub public_key_algorithm: Option<String>,
    /// Disposition message.
    pub disposition_message: Option<String>,
    /// Signer policies.
    pub signer_policies: Option<String>,
    /// Authority status code.
    pub status_code: Option<i64>,
    /// Request type.
    pub request_type: Option<i64>,
    /// Request flags.
    pub request_flags: Option<i64>,
    /// Revocation time (RFC 3339).
    pub revoked_when: Option<String>,
    /// Revocation effective time (RFC 3339).
    pub revoked_effective_when: Option<String>,
    /// Revocation reason code.
    pub revoked_reason: Option<i64>,
}

/// Subject alternative name entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SanEntry {
    /// SAN type label (for example `dnsname`).
    #[serde(rename = "SANSType")]
    pub san_type: String,
    /// Object identifier for other-name and registered-id entries.
    #[serde(rename = "OID", default)]
    pub oid: Option<String>,
    /// SAN value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl SanEntry {
    /// Returns true when either the type or value is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.san_type.trim().is_empty() || self.value.trim().is_empty()
    }
}

/// Subject distinguished-name attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttributeEntry {
    /// Attribute type (for example `CommonName`).
    pub attribute_type: String,
    /// Attribute value.
    pub attribute_value: String,
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Formats a timestamp as RFC 3339 for the wire.
#[must_use]
pub fn format_timestamp(value: OffsetDateTime) -> Option<String> {
    value.format(&Rfc3339).ok()
}

/// Parses an RFC 3339 wire timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}
