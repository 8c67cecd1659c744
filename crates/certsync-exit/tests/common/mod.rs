// crates/certsync-exit/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for certsync-exit tests.
// Purpose: Provide property bags, certificates, and recording collaborators.
// Dependencies: certsync-core, certsync-exit, rcgen, time
// ============================================================================

//! ## Overview
//! Builds complete authority property bags and DER certificates with SANs,
//! plus a scripted transport and an in-memory audit sink.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::Mutex;

use certsync_core::CertificatePayload;
use certsync_exit::DeliveryReceipt;
use certsync_exit::ExitAuditEvent;
use certsync_exit::ExitAuditSink;
use certsync_exit::PropertyBag;
use certsync_exit::PropertyValue;
use certsync_exit::Transport;
use certsync_exit::TransportError;
use rcgen::CertificateParams;
use rcgen::KeyPair;
use rcgen::SanType;
use time::macros::datetime;

/// Template OID used by the fixtures.
pub const TEMPLATE_OID: &str = "1.3.6.1.4.1.311.21.8.1.2";

/// Builds a DER certificate carrying DNS, IP, email, and URI SANs.
pub fn certificate_der() -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["www.example.test".to_string()]).unwrap();
    params.subject_alt_names.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    params
        .subject_alt_names
        .push(SanType::Rfc822Name("ops@example.test".try_into().unwrap()));
    params
        .subject_alt_names
        .push(SanType::URI("https://example.test/".try_into().unwrap()));
    let certificate = params.self_signed(&key).unwrap();
    certificate.der().to_vec()
}

/// Builds a property bag for an issued certificate with every field present.
pub fn complete_bag(serial: &str) -> PropertyBag {
    let mut bag = PropertyBag::new();
    let mut put = |name: &str, value: PropertyValue| {
        bag.insert(name.to_string(), value);
    };
    put("Request_Disposition", PropertyValue::Integer(20));
    put("Request_RequestID", PropertyValue::Integer(4711));
    put("Request_SubmittedWhen", PropertyValue::Timestamp(datetime!(2026-01-02 03:04:05 UTC)));
    put("Request_ResolvedWhen", PropertyValue::Timestamp(datetime!(2026-01-02 03:04:06 UTC)));
    put("Request_RequesterName", PropertyValue::Text("CORP\\alice".to_string()));
    put("Request_CallerName", PropertyValue::Text("CORP\\alice".to_string()));
    put("Request_SignerApplicationPolicies", PropertyValue::Text("1.3.6.1.5.5.7.3.1".to_string()));
    put("Request_StatusCode", PropertyValue::Integer(0));
    put("Request_DispositionMessage", PropertyValue::Text("Issued".to_string()));
    put("Request_CommonName", PropertyValue::Text("www.example.test".to_string()));
    put("Request_Organization", PropertyValue::Text("Example Corp".to_string()));
    put("Request_Country", PropertyValue::Text(String::new()));
    put("SerialNumber", PropertyValue::Text(serial.to_string()));
    put("NotBefore", PropertyValue::Timestamp(datetime!(2026-01-02 00:00:00 UTC)));
    put("NotAfter", PropertyValue::Text("2027-01-02T00:00:00Z".to_string()));
    put("CertificateTemplate", PropertyValue::Text(TEMPLATE_OID.to_string()));
    put("CertificateHash", PropertyValue::Text("ab cd ef 01".to_string()));
    put("SubjectKeyIdentifier", PropertyValue::Text("0a1b2c".to_string()));
    put("PublicKeyLength", PropertyValue::Integer(2048));
    put("PublicKeyAlgorithm", PropertyValue::Text("1.2.840.113549.1.1.1".to_string()));
    put("RequestType", PropertyValue::Integer(256));
    put("RawCertificate", PropertyValue::Bytes(certificate_der()));
    bag
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Recorded events.
    pub events: Mutex<Vec<ExitAuditEvent>>,
}

impl ExitAuditSink for RecordingSink {
    fn record(&self, event: &ExitAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Transport that replays a fixed result and records payloads.
pub struct ScriptedTransport {
    /// Result returned for every delivery.
    pub result: Result<DeliveryReceipt, TransportError>,
    /// Payloads seen so far.
    pub delivered: Arc<Mutex<Vec<CertificatePayload>>>,
}

impl ScriptedTransport {
    /// Creates a transport that always answers with `status`.
    pub fn accepting(status: u16) -> Self {
        Self {
            result: Ok(DeliveryReceipt {
                status,
            }),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a transport that always fails with `error`.
    pub fn failing(error: TransportError) -> Self {
        Self {
            result: Err(error),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Transport for ScriptedTransport {
    fn deliver(&self, payload: &CertificatePayload) -> Result<DeliveryReceipt, TransportError> {
        self.delivered.lock().unwrap().push(payload.clone());
        self.result.clone()
    }
}
