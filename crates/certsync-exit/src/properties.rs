// crates/certsync-exit/src/properties.rs
// ============================================================================
// Module: Authority Property Bag
// Description: Typed view of the raw properties an authority exposes per event.
// Purpose: Carry host-provided request and certificate properties by name.
// Dependencies: base64, serde, time
// ============================================================================

//! ## Overview
//! The issuing authority exposes each request as a flat map of named
//! properties. Values are tagged with their host type so the extractor can
//! coerce them without guessing: `{"type": "integer", "value": 20}`.
//! Byte values travel as standard base64 and timestamps as RFC 3339.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use certsync_core::core::payload::format_timestamp;
use certsync_core::core::payload::parse_timestamp;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Property Names
// ============================================================================

/// Property names recognized by the extractor.
pub mod names {
    /// Request disposition (numeric code or symbolic name).
    pub const DISPOSITION: &str = "Request_Disposition";
    /// Authority request identifier.
    pub const REQUEST_ID: &str = "Request_RequestID";
    /// Request submission time.
    pub const SUBMITTED_WHEN: &str = "Request_SubmittedWhen";
    /// Request resolution time.
    pub const RESOLVED_WHEN: &str = "Request_ResolvedWhen";
    /// Revocation time.
    pub const REVOKED_WHEN: &str = "Request_RevokedWhen";
    /// Revocation effective time.
    pub const REVOKED_EFFECTIVE_WHEN: &str = "Request_RevokedEffectiveWhen";
    /// Revocation reason code.
    pub const REVOKED_REASON: &str = "Request_RevokedReason";
    /// Requester identity.
    pub const REQUESTER_NAME: &str = "Request_RequesterName";
    /// Caller identity.
    pub const CALLER_NAME: &str = "Request_CallerName";
    /// Key recovery hashes.
    pub const KEY_RECOVERY_HASHES: &str = "Request_KeyRecoveryHashes";
    /// Signer policies.
    pub const SIGNER_POLICIES: &str = "Request_SignerPolicies";
    /// Signer application policies.
    pub const SIGNER_APPLICATION_POLICIES: &str = "Request_SignerApplicationPolicies";
    /// Disposition message.
    pub const DISPOSITION_MESSAGE: &str = "Request_DispositionMessage";
    /// Authority status code.
    pub const STATUS_CODE: &str = "Request_StatusCode";
    /// Certificate serial number.
    pub const SERIAL_NUMBER: &str = "SerialNumber";
    /// Validity start.
    pub const NOT_BEFORE: &str = "NotBefore";
    /// Validity end.
    pub const NOT_AFTER: &str = "NotAfter";
    /// Template object identifier.
    pub const CERTIFICATE_TEMPLATE: &str = "CertificateTemplate";
    /// Subject key identifier.
    pub const SUBJECT_KEY_IDENTIFIER: &str = "SubjectKeyIdentifier";
    /// Certificate thumbprint.
    pub const CERTIFICATE_HASH: &str = "CertificateHash";
    /// Public key length.
    pub const PUBLIC_KEY_LENGTH: &str = "PublicKeyLength";
    /// Public key algorithm.
    pub const PUBLIC_KEY_ALGORITHM: &str = "PublicKeyAlgorithm";
    /// Request type.
    pub const REQUEST_TYPE: &str = "RequestType";
    /// Request flags.
    pub const REQUEST_FLAGS: &str = "RequestFlags";
    /// DER-encoded certificate.
    pub const RAW_CERTIFICATE: &str = "RawCertificate";

    /// Request properties that become subject attributes.
    pub const SUBJECT_ATTRIBUTES: [&str; 11] = [
        "Request_CommonName",
        "Request_Organization",
        "Request_OrgUnit",
        "Request_Locality",
        "Request_State",
        "Request_Country",
        "Request_EMail",
        "Request_StreetAddress",
        "Request_UnstructuredName",
        "Request_UnstructuredAddress",
        "Request_DeviceSerialNumber",
    ];

    /// Prefix stripped from request property names for attribute types.
    pub const REQUEST_PREFIX: &str = "Request_";
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// One host property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Timestamp value.
    Timestamp(#[serde(with = "rfc3339")] OffsetDateTime),
    /// Raw bytes.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Explicit null.
    Null,
}

/// Raw property bag for one authority notification.
pub type PropertyBag = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    /// Returns the value rendered as non-empty text.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Self::Text(value) => value.trim().to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Timestamp(value) => format_timestamp(*value)?,
            Self::Bytes(_) | Self::Null => return None,
        };
        if text.is_empty() { None } else { Some(text) }
    }

    /// Returns the value as an integer, parsing text when needed.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
            Self::Timestamp(_) | Self::Bytes(_) | Self::Null => None,
        }
    }

    /// Returns the value as a timestamp, parsing RFC 3339 text when needed.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::Text(value) => parse_timestamp(value),
            Self::Integer(_) | Self::Bytes(_) | Self::Null => None,
        }
    }

    /// Returns the raw bytes of a bytes value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            Self::Text(_) | Self::Integer(_) | Self::Timestamp(_) | Self::Null => None,
        }
    }
}

// ============================================================================
// SECTION: Serde Helpers
// ============================================================================

/// RFC 3339 encoding for timestamp values.
mod rfc3339 {
    use certsync_core::core::payload::format_timestamp;
    use certsync_core::core::payload::parse_timestamp;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use time::OffsetDateTime;

    /// Serializes a timestamp as RFC 3339 text.
    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text =
            format_timestamp(*value).ok_or_else(|| S::Error::custom("timestamp not encodable"))?;
        serializer.serialize_str(&text)
    }

    /// Deserializes RFC 3339 text into a timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_timestamp(&text).ok_or_else(|| D::Error::custom("timestamp must be RFC 3339"))
    }
}

/// Base64 encoding for byte values.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as _;

    /// Serializes bytes as standard base64.
    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    /// Deserializes standard base64 into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.trim()).map_err(|err| D::Error::custom(format!("invalid base64: {err}")))
    }
}
