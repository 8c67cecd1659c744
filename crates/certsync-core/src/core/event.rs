// crates/certsync-core/src/core/event.rs
// ============================================================================
// Module: Certificate Event
// Description: Normalized certificate lifecycle event produced by the extractor.
// Purpose: Carry the authority's view of one certificate at one point in time.
// Dependencies: time
// ============================================================================

//! ## Overview
//! A [`CertificateEvent`] is built once per authority notification and never
//! mutated afterwards. Only the authority identity, disposition, and event
//! kind are guaranteed; every other field may be absent and is checked by the
//! payload builder before delivery.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::disposition::DispositionCode;
use crate::core::disposition::EventKind;
use crate::core::payload::SanEntry;
use crate::core::payload::SubjectAttributeEntry;

// ============================================================================
// SECTION: Certificate Event
// ============================================================================

/// Normalized certificate lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEvent {
    /// Notification kind raised by the authority.
    pub kind: EventKind,
    /// Issuing authority identifier.
    pub ca_id: String,
    /// Issuing authority display name.
    pub issuer_name: String,
    /// Normalized disposition code.
    pub disposition: DispositionCode,
    /// Certificate serial number.
    pub serial_number: Option<String>,
    /// Authority request identifier.
    pub request_id: Option<i64>,
    /// Request submission time.
    pub submitted_when: Option<OffsetDateTime>,
    /// Request resolution time.
    pub resolved_when: Option<OffsetDateTime>,
    /// Validity start.
    pub not_before: Option<OffsetDateTime>,
    /// Validity end.
    pub not_after: Option<OffsetDateTime>,
    /// Revocation time.
    pub revoked_when: Option<OffsetDateTime>,
    /// Revocation effective time.
    pub revoked_effective_when: Option<OffsetDateTime>,
    /// Revocation reason code.
    pub revoked_reason: Option<i64>,
    /// Subject key identifier.
    pub subject_key_identifier: Option<String>,
    /// Certificate thumbprint.
    pub thumbprint: Option<String>,
    /// Template object identifier.
    pub template_oid: Option<String>,
    /// Template display name.
    pub template_name: Option<String>,
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
    /// Subject alternative names from the certificate.
    pub sans: Vec<SanEntry>,
    /// Non-empty subject attributes from the request.
    pub subject_attributes: Vec<SubjectAttributeEntry>,
}
