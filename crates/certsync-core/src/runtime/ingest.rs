// crates/certsync-core/src/runtime/ingest.rs
// ============================================================================
// Module: Ingestion Validation
// Description: Parses untrusted JSON payloads into typed certificate submissions.
// Purpose: Reject malformed deliveries with every violated constraint listed.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Ingestion starts from an untyped JSON document so that a single response
//! can describe every problem: wrong types, missing mandatory fields, overlong
//! values, dispositions outside the closed set, and incomplete revocations.
//! Keys are matched case-insensitively.
//!
//! Rejection classes are ordered: structural problems make the whole
//! rejection a [`RejectionKind::Schema`]; otherwise an unknown disposition is a
//! [`RejectionKind::Disposition`]; otherwise a revoked payload missing any
//! revocation detail is a [`RejectionKind::Validation`].
//!
//! Security posture: payloads are untrusted input; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::disposition::DispositionCode;
use crate::core::payload::SanEntry;
use crate::core::payload::SubjectAttributeEntry;
use crate::core::payload::fields;
use crate::core::payload::parse_timestamp;
use crate::core::producer::normalize_account;
use crate::core::record::CertificateFields;
use crate::core::record::CertificateSubmission;
use crate::core::violation::FieldViolation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum SAN entries per payload.
pub const MAX_SANS: usize = 1024;
/// Maximum subject attributes per payload.
pub const MAX_ATTRIBUTES: usize = 256;

/// Maximum issuing authority identifier length.
const MAX_CA_ID: usize = 50;
/// Maximum issuer name length.
const MAX_ISSUER_NAME: usize = 512;
/// Maximum serial number length.
const MAX_SERIAL_NUMBER: usize = 128;
/// Maximum identity field length.
const MAX_IDENTITY: usize = 512;
/// Maximum subject key identifier and thumbprint length.
const MAX_KEY_IDENTIFIER: usize = 128;
/// Maximum template OID and name length.
const MAX_TEMPLATE: usize = 255;
/// Maximum policy, key-recovery, and message length.
const MAX_LONG_TEXT: usize = 4000;
/// Maximum public key length field.
const MAX_PUBLIC_KEY_LENGTH: usize = 50;
/// Maximum public key algorithm length.
const MAX_PUBLIC_KEY_ALGORITHM: usize = 254;
/// Maximum SAN type length.
const MAX_SAN_TYPE: usize = 50;
/// Maximum SAN OID and value length.
const MAX_SAN_VALUE: usize = 255;
/// Maximum attribute type length.
const MAX_ATTRIBUTE_TYPE: usize = 50;
/// Maximum attribute value length.
const MAX_ATTRIBUTE_VALUE: usize = 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Classification of an ingestion rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectionKind {
    /// Malformed envelope, wrong types, missing or overlong fields.
    #[serde(rename = "schema_error")]
    Schema,
    /// Disposition outside the accepted set.
    #[serde(rename = "disposition_error")]
    Disposition,
    /// Revoked payload missing revocation details.
    #[serde(rename = "validation_error")]
    Validation,
}

impl RejectionKind {
    /// Returns the stable label used in responses and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema_error",
            Self::Disposition => "disposition_error",
            Self::Validation => "validation_error",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion rejection listing every violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {} violation(s)", .violations.len())]
pub struct IngestRejection {
    /// Rejection class.
    #[serde(rename = "error")]
    pub kind: RejectionKind,
    /// Every violated constraint.
    pub violations: Vec<FieldViolation>,
}

impl IngestRejection {
    /// Builds a schema rejection with a single violation.
    #[must_use]
    pub fn schema(violation: FieldViolation) -> Self {
        Self {
            kind: RejectionKind::Schema,
            violations: vec![violation],
        }
    }

    /// Returns true when the rejection lists the named field.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|violation| violation.field == field)
    }
}

// ============================================================================
// SECTION: Entry Points
// ============================================================================

/// Parses raw request bytes into a validated submission.
///
/// # Errors
///
/// Returns [`IngestRejection`] when the body is not JSON or fails validation.
pub fn parse_submission_bytes(bytes: &[u8]) -> Result<CertificateSubmission, IngestRejection> {
    parse_submission(&parse_document(bytes)?)
}

/// Parses raw request bytes into an untyped JSON document.
///
/// # Errors
///
/// Returns a schema [`IngestRejection`] when the body is blank or not JSON.
pub fn parse_document(bytes: &[u8]) -> Result<Value, IngestRejection> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestRejection::schema(FieldViolation::missing("$")));
    }
    serde_json::from_slice(bytes).map_err(|err| {
        IngestRejection::schema(FieldViolation::invalid_value("$", format!("invalid json: {err}")))
    })
}

/// Returns the trimmed text of `data.<field>` before validation.
///
/// Keys match case-insensitively. Blank and non-string values read as
/// `None`. Used to identify the declaring producer ahead of full parsing.
#[must_use]
pub fn declared_text(document: &Value, field: &str) -> Option<String> {
    let root = document.as_object()?;
    let Some(Value::Object(data)) = lookup(root, fields::DATA) else {
        return None;
    };
    match lookup(data, field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

/// Parses a JSON document into a validated submission.
///
/// # Errors
///
/// Returns [`IngestRejection`] describing every violated constraint.
pub fn parse_submission(document: &Value) -> Result<CertificateSubmission, IngestRejection> {
    let Some(root) = document.as_object() else {
        return Err(IngestRejection::schema(FieldViolation::invalid_type("$", "object")));
    };
    let mut reader = FieldReader::default();
    let data = match lookup(root, fields::DATA) {
        Some(Value::Object(data)) => Some(data),
        None | Some(Value::Null) => {
            reader.schema.push(FieldViolation::missing(fields::DATA));
            None
        }
        Some(_) => {
            reader.schema.push(FieldViolation::invalid_type(fields::DATA, "object"));
            None
        }
    };
    let certificate = data.and_then(|data| reader.certificate(data));
    let sans = reader.sans(lookup(root, fields::SANS));
    let attributes = reader.attributes(lookup(root, fields::SUBJECT_ATTRIBUTES));
    reader.finish(certificate, sans, attributes)
}

// ============================================================================
// SECTION: Field Reader
// ============================================================================

/// Accumulates violations while reading fields.
#[derive(Default)]
struct FieldReader {
    /// Structural, type, presence, and length violations.
    schema: Vec<FieldViolation>,
    /// Disposition domain violations.
    disposition: Vec<FieldViolation>,
    /// Disposition-specific completeness violations.
    validation: Vec<FieldViolation>,
}

impl FieldReader {
    /// Reads the certificate `data` object.
    fn certificate(&mut self, data: &Map<String, Value>) -> Option<CertificateFields> {
        let ca_id =
            self.required_text(data, fields::CA_ID, MAX_CA_ID).map(|value| normalize_account(&value));
        let issuer_name = self.required_text(data, fields::ISSUER_NAME, MAX_ISSUER_NAME);
        let serial_number = self.required_text(data, fields::SERIAL_NUMBER, MAX_SERIAL_NUMBER);
        let request_id = self.required_integer(data, fields::REQUEST_ID);
        let disposition_raw = self.required_integer(data, fields::DISPOSITION);
        let submitted_when = self.required_timestamp(data, fields::SUBMITTED_WHEN);
        let not_before = self.required_timestamp(data, fields::NOT_BEFORE);
        let not_after = self.required_timestamp(data, fields::NOT_AFTER);
        let thumbprint = self.required_text(data, fields::THUMBPRINT, MAX_KEY_IDENTIFIER);
        let template_oid = self.required_text(data, fields::TEMPLATE_OID, MAX_TEMPLATE);
        let template_name = self.optional_text(data, fields::TEMPLATE_NAME, MAX_TEMPLATE);
        let requester_name = self.optional_text(data, fields::REQUESTER_NAME, MAX_IDENTITY);
        let caller_name = self.optional_text(data, fields::CALLER_NAME, MAX_IDENTITY);
        let subject_key_identifier =
            self.optional_text(data, fields::SUBJECT_KEY_IDENTIFIER, MAX_KEY_IDENTIFIER);
        let key_recovery_hashes =
            self.optional_text(data, fields::KEY_RECOVERY_HASHES, MAX_LONG_TEXT);
        let signer_policies = self.optional_text(data, fields::SIGNER_POLICIES, MAX_LONG_TEXT);
        let signer_application_policies =
            self.optional_text(data, fields::SIGNER_APPLICATION_POLICIES, MAX_LONG_TEXT);
        let disposition_message =
            self.optional_text(data, fields::DISPOSITION_MESSAGE, MAX_LONG_TEXT);
        let public_key_length =
            self.optional_text_or_number(data, fields::PUBLIC_KEY_LENGTH, MAX_PUBLIC_KEY_LENGTH);
        let public_key_algorithm =
            self.optional_text(data, fields::PUBLIC_KEY_ALGORITHM, MAX_PUBLIC_KEY_ALGORITHM);
        let resolved_when = self.optional_timestamp(data, fields::RESOLVED_WHEN);
        let revoked_when = self.optional_timestamp(data, fields::REVOKED_WHEN);
        let revoked_effective_when = self.optional_timestamp(data, fields::REVOKED_EFFECTIVE_WHEN);
        let revoked_reason = self.optional_integer(data, fields::REVOKED_REASON);
        let status_code = self.optional_integer(data, fields::STATUS_CODE);
        let request_type = self.optional_integer(data, fields::REQUEST_TYPE);
        let request_flags = self.optional_integer(data, fields::REQUEST_FLAGS);

        let disposition = disposition_raw.and_then(|code| match DispositionCode::new(code) {
            Ok(disposition) => Some(disposition),
            Err(err) => {
                self.disposition
                    .push(FieldViolation::invalid_value(fields::DISPOSITION, err.to_string()));
                None
            }
        });
        if disposition.is_some_and(DispositionCode::is_revoked) {
            for name in
                [fields::REVOKED_WHEN, fields::REVOKED_EFFECTIVE_WHEN, fields::REVOKED_REASON]
            {
                if !is_present(data, name) {
                    self.validation.push(FieldViolation::missing(name));
                }
            }
        }

        let template_oid = template_oid?;
        let template_name = template_name.unwrap_or_else(|| template_oid.clone());
        Some(CertificateFields {
            ca_id: ca_id?,
            issuer_name: issuer_name?,
            serial_number: serial_number?,
            request_id: request_id?,
            disposition: disposition?,
            submitted_when: submitted_when?,
            resolved_when,
            not_before: not_before?,
            not_after: not_after?,
            revoked_when,
            revoked_effective_when,
            revoked_reason,
            template_oid,
            template_name,
            thumbprint: thumbprint?,
            subject_key_identifier,
            requester_name,
            caller_name,
            key_recovery_hashes,
            signer_policies,
            signer_application_policies,
            public_key_length,
            public_key_algorithm,
            disposition_message,
            status_code,
            request_type,
            request_flags,
        })
    }

    /// Reads the SAN list, dropping blank entries.
    fn sans(&mut self, value: Option<&Value>) -> Vec<SanEntry> {
        let Some(items) = self.list(value, fields::SANS, MAX_SANS) else {
            return Vec::new();
        };
        let mut sans = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let path = |name: &str| format!("{}[{index}].{name}", fields::SANS);
            let Some(entry) = item.as_object() else {
                self.schema.push(FieldViolation::invalid_type(
                    format!("{}[{index}]", fields::SANS),
                    "object",
                ));
                continue;
            };
            let san_type =
                self.bounded_text(entry, fields::SAN_TYPE, &path(fields::SAN_TYPE), MAX_SAN_TYPE);
            let oid =
                self.bounded_text(entry, fields::SAN_OID, &path(fields::SAN_OID), MAX_SAN_VALUE);
            let value = self.bounded_text(
                entry,
                fields::SAN_VALUE,
                &path(fields::SAN_VALUE),
                MAX_SAN_VALUE,
            );
            if let (Some(san_type), Some(value)) = (san_type, value) {
                sans.push(SanEntry {
                    san_type,
                    oid,
                    value,
                });
            }
        }
        sans
    }

    /// Reads the subject attribute list, dropping blank entries.
    fn attributes(&mut self, value: Option<&Value>) -> Vec<SubjectAttributeEntry> {
        let Some(items) = self.list(value, fields::SUBJECT_ATTRIBUTES, MAX_ATTRIBUTES) else {
            return Vec::new();
        };
        let mut attributes = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let path = |name: &str| format!("{}[{index}].{name}", fields::SUBJECT_ATTRIBUTES);
            let Some(entry) = item.as_object() else {
                self.schema.push(FieldViolation::invalid_type(
                    format!("{}[{index}]", fields::SUBJECT_ATTRIBUTES),
                    "object",
                ));
                continue;
            };
            let attribute_type = self.bounded_text(
                entry,
                fields::ATTRIBUTE_TYPE,
                &path(fields::ATTRIBUTE_TYPE),
                MAX_ATTRIBUTE_TYPE,
            );
            let attribute_value = self.bounded_text(
                entry,
                fields::ATTRIBUTE_VALUE,
                &path(fields::ATTRIBUTE_VALUE),
                MAX_ATTRIBUTE_VALUE,
            );
            if let (Some(attribute_type), Some(attribute_value)) = (attribute_type, attribute_value)
            {
                attributes.push(SubjectAttributeEntry {
                    attribute_type,
                    attribute_value,
                });
            }
        }
        attributes
    }

    /// Combines collected violations into the final result.
    fn finish(
        self,
        certificate: Option<CertificateFields>,
        sans: Vec<SanEntry>,
        attributes: Vec<SubjectAttributeEntry>,
    ) -> Result<CertificateSubmission, IngestRejection> {
        let kind = if !self.schema.is_empty() {
            RejectionKind::Schema
        } else if !self.disposition.is_empty() {
            RejectionKind::Disposition
        } else if !self.validation.is_empty() {
            RejectionKind::Validation
        } else {
            return certificate
                .map(|fields| CertificateSubmission {
                    fields,
                    sans,
                    attributes,
                })
                .ok_or_else(|| IngestRejection::schema(FieldViolation::missing(fields::DATA)));
        };
        let mut violations = self.schema;
        violations.extend(self.disposition);
        violations.extend(self.validation);
        Err(IngestRejection {
            kind,
            violations,
        })
    }

    /// Reads an optional JSON array with an item limit.
    fn list<'v>(
        &mut self,
        value: Option<&'v Value>,
        name: &str,
        max: usize,
    ) -> Option<&'v [Value]> {
        match value {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) if items.len() > max => {
                self.schema.push(FieldViolation::too_many(name, max));
                None
            }
            Some(Value::Array(items)) => Some(items.as_slice()),
            Some(_) => {
                self.schema.push(FieldViolation::invalid_type(name, "array"));
                None
            }
        }
    }

    /// Reads a mandatory string field.
    fn required_text(
        &mut self,
        data: &Map<String, Value>,
        name: &str,
        max: usize,
    ) -> Option<String> {
        let value = self.bounded_text(data, name, name, max);
        if value.is_none() && !is_present(data, name) {
            self.schema.push(FieldViolation::missing(name));
        }
        value
    }

    /// Reads an optional string field.
    fn optional_text(
        &mut self,
        data: &Map<String, Value>,
        name: &str,
        max: usize,
    ) -> Option<String> {
        self.bounded_text(data, name, name, max)
    }

    /// Reads a string field; blank values read as absent.
    fn bounded_text(
        &mut self,
        object: &Map<String, Value>,
        name: &str,
        path: &str,
        max: usize,
    ) -> Option<String> {
        match lookup(object, name) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.trim().is_empty() => None,
            Some(Value::String(text)) if text.chars().count() > max => {
                self.schema.push(FieldViolation::too_long(path, max));
                None
            }
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => {
                self.schema.push(FieldViolation::invalid_type(path, "string"));
                None
            }
        }
    }

    /// Reads an optional field that may be a string or a number.
    fn optional_text_or_number(
        &mut self,
        data: &Map<String, Value>,
        name: &str,
        max: usize,
    ) -> Option<String> {
        match lookup(data, name) {
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => self.bounded_text(data, name, name, max),
        }
    }

    /// Reads a mandatory integer field.
    fn required_integer(&mut self, data: &Map<String, Value>, name: &str) -> Option<i64> {
        let value = self.optional_integer(data, name);
        if value.is_none() && !is_present(data, name) {
            self.schema.push(FieldViolation::missing(name));
        }
        value
    }

    /// Reads an optional integer field given as a number or integer string.
    fn optional_integer(&mut self, data: &Map<String, Value>, name: &str) -> Option<i64> {
        let parsed = match lookup(data, name) {
            None | Some(Value::Null) => return None,
            Some(Value::String(text)) if text.trim().is_empty() => return None,
            Some(Value::Number(number)) => number.as_i64(),
            Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        if parsed.is_none() {
            self.schema.push(FieldViolation::invalid_type(name, "integer"));
        }
        parsed
    }

    /// Reads a mandatory RFC 3339 timestamp.
    fn required_timestamp(
        &mut self,
        data: &Map<String, Value>,
        name: &str,
    ) -> Option<OffsetDateTime> {
        let value = self.optional_timestamp(data, name);
        if value.is_none() && !is_present(data, name) {
            self.schema.push(FieldViolation::missing(name));
        }
        value
    }

    /// Reads an optional RFC 3339 timestamp.
    fn optional_timestamp(
        &mut self,
        data: &Map<String, Value>,
        name: &str,
    ) -> Option<OffsetDateTime> {
        match lookup(data, name) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.trim().is_empty() => None,
            Some(Value::String(text)) => {
                let parsed = parse_timestamp(text);
                if parsed.is_none() {
                    self.schema
                        .push(FieldViolation::invalid_value(name, "not an RFC 3339 timestamp"));
                }
                parsed
            }
            Some(_) => {
                self.schema.push(FieldViolation::invalid_type(name, "string"));
                None
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Looks up a key case-insensitively, preferring an exact match.
fn lookup<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| {
        object.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    })
}

/// Returns true when a key holds a non-null, non-blank value.
fn is_present(object: &Map<String, Value>, name: &str) -> bool {
    match lookup(object, name) {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}
