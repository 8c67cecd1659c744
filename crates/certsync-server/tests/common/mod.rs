// crates/certsync-server/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fixtures for certsync-server tests.
// Purpose: Build services over temporary registries and sample payloads.
// Dependencies: certsync-core, certsync-server, certsync-store-sqlite, tempfile
// ============================================================================

//! ## Overview
//! Opens a `SQLite` registry in a temporary directory, wires it into an
//! ingestion service with a recording audit sink, and builds wire payloads.

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

use std::sync::Arc;
use std::sync::Mutex;

use certsync_core::InstanceId;
use certsync_core::NewProducer;
use certsync_core::ProducerEntry;
use certsync_core::ProducerRegistry;
use certsync_server::IngestAuditEvent;
use certsync_server::IngestAuditSink;
use certsync_server::IngestOutcome;
use certsync_server::IngestionService;
use certsync_server::IngestionServiceParams;
use certsync_server::TokenSet;
use certsync_store_sqlite::SqliteRegistry;
use certsync_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Instance identifier registered for the fixture producer.
pub const INSTANCE: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
/// Token accepted on ingestion routes.
pub const INGEST_TOKEN: &str = "ingest-secret";
/// Token accepted on management routes.
pub const ADMIN_TOKEN: &str = "admin-secret";

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Recorded events.
    pub events: Mutex<Vec<IngestAuditEvent>>,
}

impl RecordingSink {
    /// Returns the outcomes recorded so far.
    pub fn outcomes(&self) -> Vec<IngestOutcome> {
        self.events.lock().unwrap().iter().map(|event| event.outcome).collect()
    }
}

impl IngestAuditSink for RecordingSink {
    fn record(&self, event: &IngestAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Service wired to a temporary registry.
pub struct Fixture {
    /// Keeps the database directory alive.
    pub _dir: TempDir,
    /// Registry shared with the service.
    pub registry: Arc<SqliteRegistry>,
    /// Service under test.
    pub service: Arc<IngestionService>,
    /// Audit events.
    pub audit: Arc<RecordingSink>,
}

/// Builds a fixture that requires the fixture tokens.
pub fn fixture() -> Fixture {
    fixture_with_limit(64 * 1024)
}

/// Builds a fixture with a custom body limit.
pub fn fixture_with_limit(max_body_bytes: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");
    let registry = Arc::new(SqliteRegistry::new(SqliteStoreConfig::at_path(&path)).unwrap());
    let audit = Arc::new(RecordingSink::default());
    let service = IngestionService::new(IngestionServiceParams {
        certificates: registry.clone(),
        producers: registry.clone(),
        audit: audit.clone(),
        ingest_tokens: TokenSet::new(&[INGEST_TOKEN.to_string()]),
        admin_tokens: TokenSet::new(&[ADMIN_TOKEN.to_string()]),
        max_body_bytes,
        expiring_horizon_days: 30,
    });
    Fixture {
        _dir: dir,
        registry,
        service: Arc::new(service),
        audit,
    }
}

/// Registers `account` with the fixture instance identifier.
pub fn allow(registry: &SqliteRegistry, account: &str) -> ProducerEntry {
    registry
        .create_producer(&NewProducer {
            producer_account: account.to_string(),
            instance_id: InstanceId::parse(INSTANCE).unwrap(),
            description: Some("test producer".to_string()),
        })
        .unwrap()
}

/// Returns an `Authorization` header value for `token`.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Builds an issued payload for `serial` expiring at `not_after`.
pub fn issued_payload(serial: &str, not_after: &str) -> Value {
    json!({
        "data": {
            "caId": "CA01",
            "issuerName": "Contoso Issuing CA",
            "serialNumber": serial,
            "request_RequestID": 42,
            "disposition": 20,
            "submittedWhen": "2026-01-05T10:00:00Z",
            "notBefore": "2026-01-05T10:00:00Z",
            "notAfter": not_after,
            "templateOID": "1.3.6.1.4.1.311.21.8.1",
            "templateName": "WebServer",
            "keyRecoveryHashes": "",
            "signerApplicationPolicies": "1.3.6.1.5.5.7.3.1",
            "thumbprint": "ab12cd34",
            "statusCode": 0,
            "dispositionMessage": "Issued"
        },
        "sans": [
            { "SANSType": "dnsname", "OID": null, "Value": "www.example.test" },
            { "SANSType": "dnsname", "OID": null, "Value": "www.example.test" }
        ],
        "subjectAttributes": [
            { "attributeType": "CommonName", "attributeValue": "www.example.test" }
        ]
    })
}

/// Turns an issued payload into a revocation of the same certificate.
pub fn revoked(mut payload: Value) -> Value {
    payload["data"]["disposition"] = json!(21);
    payload["data"]["dispositionMessage"] = json!("Revoked by admin");
    payload["data"]["revokedWhen"] = json!("2026-03-01T08:00:00Z");
    payload["data"]["revokedEffectiveWhen"] = json!("2026-03-01T08:05:00Z");
    payload["data"]["revokedReason"] = json!(1);
    payload
}
