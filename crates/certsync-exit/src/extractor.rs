// crates/certsync-exit/src/extractor.rs
// ============================================================================
// Module: Event Extractor
// Description: Builds certificate events from authority property bags.
// Purpose: Normalize dispositions and collect fields, SANs, and attributes.
// Dependencies: certsync-core, x509-parser
// ============================================================================

//! ## Overview
//! [`EventExtractor`] turns one raw property bag into a [`CertificateEvent`].
//! Only the disposition can fail extraction: it must map to the closed code
//! set, whether it arrives as a number or a symbolic name. Every other field
//! is collected as-is and left for the payload builder to check.
//!
//! SANs are read from the DER certificate. A missing or unparsable
//! certificate yields no SANs rather than an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use certsync_core::CertificateEvent;
use certsync_core::DispositionCode;
use certsync_core::DispositionError;
use certsync_core::EventKind;
use certsync_core::SanEntry;
use certsync_core::SubjectAttributeEntry;
use certsync_core::TemplateNameResolver;
use certsync_core::core::hashing::hex_encode;
use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::FromDer;

use crate::properties::PropertyBag;
use crate::properties::PropertyValue;
use crate::properties::names;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Other-name OID for the user principal name.
const UPN_OID: &str = "1.3.6.1.4.1.311.20.2.3";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures that prevent building a certificate event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The bag carries no disposition.
    #[error("request disposition missing")]
    MissingDisposition,
    /// The disposition is not a number or text.
    #[error("request disposition has unsupported type")]
    DispositionType,
    /// The disposition does not map to a known code.
    #[error(transparent)]
    Disposition(#[from] DispositionError),
}

// ============================================================================
// SECTION: Extractor
// ============================================================================

/// Builds certificate events for one issuing authority.
pub struct EventExtractor<R> {
    /// Issuing authority identifier.
    ca_id: String,
    /// Issuing authority display name.
    issuer_name: String,
    /// Template naming service.
    templates: R,
    /// Name used when the template cannot be resolved.
    fallback_template_name: String,
}

impl<R: TemplateNameResolver> EventExtractor<R> {
    /// Creates an extractor for one authority.
    #[must_use]
    pub fn new(
        ca_id: impl Into<String>,
        issuer_name: impl Into<String>,
        templates: R,
        fallback_template_name: impl Into<String>,
    ) -> Self {
        Self {
            ca_id: ca_id.into(),
            issuer_name: issuer_name.into(),
            templates,
            fallback_template_name: fallback_template_name.into(),
        }
    }

    /// Extracts a certificate event from a property bag.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] when the disposition is missing or cannot
    /// be mapped to a known code.
    pub fn extract(
        &self,
        kind: EventKind,
        bag: &PropertyBag,
    ) -> Result<CertificateEvent, ExtractionError> {
        let disposition = extract_disposition(bag)?;
        let template_oid = text(bag, names::CERTIFICATE_TEMPLATE);
        Ok(CertificateEvent {
            kind,
            ca_id: self.ca_id.clone(),
            issuer_name: self.issuer_name.clone(),
            disposition,
            serial_number: text(bag, names::SERIAL_NUMBER),
            request_id: integer(bag, names::REQUEST_ID),
            submitted_when: timestamp(bag, names::SUBMITTED_WHEN),
            resolved_when: timestamp(bag, names::RESOLVED_WHEN),
            not_before: timestamp(bag, names::NOT_BEFORE),
            not_after: timestamp(bag, names::NOT_AFTER),
            revoked_when: timestamp(bag, names::REVOKED_WHEN),
            revoked_effective_when: timestamp(bag, names::REVOKED_EFFECTIVE_WHEN),
            revoked_reason: integer(bag, names::REVOKED_REASON),
            subject_key_identifier: text(bag, names::SUBJECT_KEY_IDENTIFIER),
            thumbprint: text(bag, names::CERTIFICATE_HASH).map(|hash| compact_hash(&hash)),
            template_name: Some(self.template_name(template_oid.as_deref())),
            template_oid,
            requester_name: text(bag, names::REQUESTER_NAME),
            caller_name: text(bag, names::CALLER_NAME),
            key_recovery_hashes: text_or_empty(bag, names::KEY_RECOVERY_HASHES),
            signer_policies: text(bag, names::SIGNER_POLICIES),
            signer_application_policies: text(bag, names::SIGNER_APPLICATION_POLICIES),
            public_key_length: text(bag, names::PUBLIC_KEY_LENGTH),
            public_key_algorithm: text(bag, names::PUBLIC_KEY_ALGORITHM),
            disposition_message: text(bag, names::DISPOSITION_MESSAGE),
            status_code: integer(bag, names::STATUS_CODE),
            request_type: integer(bag, names::REQUEST_TYPE),
            request_flags: integer(bag, names::REQUEST_FLAGS),
            sans: bag
                .get(names::RAW_CERTIFICATE)
                .and_then(PropertyValue::as_bytes)
                .map(parse_sans)
                .unwrap_or_default(),
            subject_attributes: subject_attributes(bag),
        })
    }

    /// Resolves a template display name, falling back when unavailable.
    fn template_name(&self, oid: Option<&str>) -> String {
        oid.and_then(|oid| self.templates.resolve_template_name(oid).ok())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.fallback_template_name.clone())
    }
}

// ============================================================================
// SECTION: Field Helpers
// ============================================================================

/// Maps the bag disposition to a known code.
fn extract_disposition(bag: &PropertyBag) -> Result<DispositionCode, ExtractionError> {
    match bag.get(names::DISPOSITION) {
        None | Some(PropertyValue::Null) => Err(ExtractionError::MissingDisposition),
        Some(PropertyValue::Integer(code)) => Ok(DispositionCode::new(*code)?),
        Some(PropertyValue::Text(symbol)) => Ok(DispositionCode::from_symbol(symbol)?),
        Some(PropertyValue::Timestamp(_) | PropertyValue::Bytes(_)) => {
            Err(ExtractionError::DispositionType)
        }
    }
}

/// Reads a non-empty text property.
fn text(bag: &PropertyBag, name: &str) -> Option<String> {
    bag.get(name).and_then(PropertyValue::as_text)
}

/// Reads a text property that is sent as empty when absent.
fn text_or_empty(bag: &PropertyBag, name: &str) -> Option<String> {
    Some(text(bag, name).unwrap_or_default())
}

/// Reads an integer property.
fn integer(bag: &PropertyBag, name: &str) -> Option<i64> {
    bag.get(name).and_then(PropertyValue::as_integer)
}

/// Reads a timestamp property.
fn timestamp(bag: &PropertyBag, name: &str) -> Option<OffsetDateTime> {
    bag.get(name).and_then(PropertyValue::as_timestamp)
}

/// Removes the spacing some hosts insert between thumbprint octets.
fn compact_hash(value: &str) -> String {
    value.chars().filter(|ch| !ch.is_whitespace()).collect()
}

/// Collects non-empty subject attributes in a fixed order.
fn subject_attributes(bag: &PropertyBag) -> Vec<SubjectAttributeEntry> {
    names::SUBJECT_ATTRIBUTES
        .iter()
        .filter_map(|name| {
            let value = text(bag, name)?;
            let attribute_type = name.strip_prefix(names::REQUEST_PREFIX).unwrap_or(name);
            Some(SubjectAttributeEntry {
                attribute_type: attribute_type.to_string(),
                attribute_value: value,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: SAN Parsing
// ============================================================================

/// Extracts subject alternative names from a DER certificate.
///
/// Returns an empty list when the certificate cannot be parsed or carries no
/// SAN extension.
#[must_use]
pub fn parse_sans(der: &[u8]) -> Vec<SanEntry> {
    let Ok((_, certificate)) = X509Certificate::from_der(der) else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for extension in certificate.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = extension.parsed_extension() {
            entries.extend(san.general_names.iter().filter_map(san_entry));
        }
    }
    entries
}

/// Converts one general name into a SAN entry; unsupported forms are skipped.
fn san_entry(name: &GeneralName<'_>) -> Option<SanEntry> {
    let (san_type, oid, value) = match name {
        GeneralName::DNSName(value) => ("dnsname", None, (*value).to_string()),
        GeneralName::RFC822Name(value) => ("rfc822name", None, (*value).to_string()),
        GeneralName::URI(value) => ("url", None, (*value).to_string()),
        GeneralName::IPAddress(bytes) => ("ipaddress", None, format_ip(bytes)),
        GeneralName::RegisteredID(oid) => {
            let text = oid.to_id_string();
            ("registeredid", Some(text.clone()), text)
        }
        GeneralName::DirectoryName(name) => ("directoryname", None, name.to_string()),
        GeneralName::OtherName(oid, bytes) => {
            let oid = oid.to_id_string();
            let value = other_name_text(bytes).unwrap_or_else(|| hex_encode(bytes));
            let label = if oid == UPN_OID { "userprincipalname" } else { "othername" };
            (label, Some(oid), value)
        }
        _ => return None,
    };
    Some(SanEntry {
        san_type: san_type.to_string(),
        oid,
        value,
    })
}

/// Formats a SAN IP address.
fn format_ip(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        Ipv4Addr::from(octets).to_string()
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        Ipv6Addr::from(octets).to_string()
    } else {
        hex_encode(bytes)
    }
}

/// Decodes the string inside an other-name value, with or without its
/// explicit `[0]` wrapper.
fn other_name_text(bytes: &[u8]) -> Option<String> {
    let (tag, body) = read_tlv(bytes)?;
    let (tag, body) = if tag == 0xa0 { read_tlv(body)? } else { (tag, body) };
    match tag {
        // UTF8String, PrintableString, IA5String.
        0x0c | 0x13 | 0x16 => std::str::from_utf8(body).ok().map(str::to_string),
        _ => None,
    }
}

/// Reads one DER tag-length-value header and returns the tag and content.
fn read_tlv(bytes: &[u8]) -> Option<(u8, &[u8])> {
    let (&tag, rest) = bytes.split_first()?;
    let (&first, rest) = rest.split_first()?;
    let (length, rest) = if first < 0x80 {
        (usize::from(first), rest)
    } else {
        let count = usize::from(first & 0x7f);
        if count == 0 || count > 2 || rest.len() < count {
            return None;
        }
        let (length_bytes, rest) = rest.split_at(count);
        let length = length_bytes.iter().fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
        (length, rest)
    };
    rest.get(.. length).map(|body| (tag, body))
}
