// crates/certsync-core/src/core/record.rs
// ============================================================================
// Module: Certificate Records
// Description: Strongly typed certificate state accepted and stored by the registry.
// Purpose: Share one field model between ingestion, reconciliation, and storage.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`CertificateFields`] is the validated form of an inbound payload and the
//! stored form of a certificate record. Reconciliation compares and mutates
//! this struct, so storage backends only persist what it already decided.
//!
//! Invariants:
//! - At most one record exists per (`ca_id`, `serial_number`).
//! - SAN entries are unique per (record, type, value).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::disposition::DispositionCode;
use crate::core::payload::SanEntry;
use crate::core::payload::SubjectAttributeEntry;

// ============================================================================
// SECTION: Certificate Fields
// ============================================================================

/// Full certificate field set as accepted on ingestion and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFields {
    /// Issuing authority identifier.
    pub ca_id: String,
    /// Issuing authority display name.
    pub issuer_name: String,
    /// Certificate serial number.
    pub serial_number: String,
    /// Authority request identifier.
    #[serde(rename = "request_RequestID")]
    pub request_id: i64,
    /// Current disposition.
    pub disposition: DispositionCode,
    /// Request submission time.
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_when: OffsetDateTime,
    /// Request resolution time.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub resolved_when: Option<OffsetDateTime>,
    /// Validity start.
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    /// Validity end.
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    /// Revocation time.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub revoked_when: Option<OffsetDateTime>,
    /// Revocation effective time.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub revoked_effective_when: Option<OffsetDateTime>,
    /// Revocation reason code.
    pub revoked_reason: Option<i64>,
    /// Template object identifier.
    #[serde(rename = "templateOID")]
    pub template_oid: String,
    /// Template display name.
    pub template_name: String,
    /// Certificate thumbprint.
    pub thumbprint: String,
    /// Subject key identifier.
    pub subject_key_identifier: Option<String>,
    /// Requester identity.
    pub requester_name: Option<String>,
    /// Caller identity.
    pub caller_name: Option<String>,
    /// Key recovery hashes.
    pub key_recovery_hashes: Option<String>,
    /// Signer policies.
    pub signer_policies: Option<String>,
    /// Signer application policies.
    pub signer_application_policies: Option<String>,
    /// Public key length.
    pub public_key_length: Option<String>,
    /// Public key algorithm.
    pub public_key_algorithm: Option<String>,
    /// Disposition message.
    pub disposition_message: Option<String>,
    /// Authority status code.
    pub status_code: Option<i64>,
    /// Request type.
    pub request_type: Option<i64>,
    /// Request flags.
    pub request_flags: Option<i64>,
}

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Validated ingestion request ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSubmission {
    /// Certificate fields.
    pub fields: CertificateFields,
    /// Non-blank SAN candidates in payload order.
    pub sans: Vec<SanEntry>,
    /// Non-blank subject attribute candidates in payload order.
    pub attributes: Vec<SubjectAttributeEntry>,
}

/// Subject attribute with its content digest, ready to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedAttribute {
    /// Attribute type.
    pub attribute_type: String,
    /// Attribute value.
    pub attribute_value: String,
    /// Lower-case hex SHA-256 of the attribute value.
    pub value_hash: String,
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a registry submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A new record was created.
    Created {
        /// Record identifier.
        #[serde(rename = "certificateId")]
        certificate_id: i64,
        /// SAN entries inserted.
        #[serde(rename = "sansAdded")]
        sans_added: usize,
        /// Subject attributes inserted.
        #[serde(rename = "attributesAdded")]
        attributes_added: usize,
    },
    /// An existing record was partially updated.
    Updated {
        /// Record identifier.
        #[serde(rename = "certificateId")]
        certificate_id: i64,
        /// SAN entries inserted.
        #[serde(rename = "sansAdded")]
        sans_added: usize,
        /// Subject attributes inserted.
        #[serde(rename = "attributesAdded")]
        attributes_added: usize,
    },
    /// The record already holds the incoming disposition; nothing changed.
    Conflict {
        /// Record identifier.
        #[serde(rename = "certificateId")]
        certificate_id: i64,
        /// Stored disposition.
        disposition: DispositionCode,
    },
}

// ============================================================================
// SECTION: Read Models
// ============================================================================

/// Summary row for expiry reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Record identifier.
    pub certificate_id: i64,
    /// Issuing authority identifier.
    pub ca_id: String,
    /// Certificate serial number.
    pub serial_number: String,
    /// Current disposition.
    pub disposition: DispositionCode,
    /// Template object identifier.
    #[serde(rename = "templateOID")]
    pub template_oid: String,
    /// Template display name.
    pub template_name: String,
    /// Requester identity.
    pub requester_name: Option<String>,
    /// Certificate thumbprint.
    pub thumbprint: String,
    /// Validity start.
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    /// Validity end.
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

/// Full stored certificate including SANs and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDetail {
    /// Record identifier.
    pub certificate_id: i64,
    /// Stored fields.
    #[serde(flatten)]
    pub fields: CertificateFields,
    /// Stored SAN entries.
    pub sans: Vec<SanEntry>,
    /// Stored subject attributes.
    pub subject_attributes: Vec<PreparedAttribute>,
    /// Creation time (unix millis).
    pub created_at_ms: i64,
    /// Last update time (unix millis).
    pub updated_at_ms: i64,
}
