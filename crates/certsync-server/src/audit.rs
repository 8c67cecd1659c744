// crates/certsync-server/src/audit.rs
// ============================================================================
// Module: Registry Audit Logging
// Description: Structured audit events for registry requests.
// Purpose: Emit one JSON line per handled request.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every request handled by the ingestion service produces one
//! [`IngestAuditEvent`] naming the route, the declared producer identity when
//! one was presented, and how the request ended.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How a registry request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// A certificate record or allow-list entry was created.
    Created,
    /// An existing record or entry was updated.
    Updated,
    /// The submission repeated the stored disposition, or an allow-list key
    /// was already taken.
    Conflict,
    /// The request failed validation.
    Rejected,
    /// The producer is not on the active allow-list.
    Forbidden,
    /// Credentials were missing or invalid.
    Unauthenticated,
    /// A read completed.
    Served,
    /// The requested record or entry does not exist.
    NotFound,
    /// Persistence failed.
    Error,
}

/// Registry audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Route label.
    pub route: &'static str,
    /// Declared producer account.
    pub producer_account: Option<String>,
    /// Declared producer instance identifier.
    pub instance_id: Option<String>,
    /// Certificate serial number when known.
    pub serial_number: Option<String>,
    /// Request outcome.
    pub outcome: IngestOutcome,
    /// HTTP status returned.
    pub status: u16,
    /// Number of violations reported.
    pub violation_count: usize,
    /// Failure detail.
    pub detail: Option<String>,
}

/// Inputs required to construct a registry audit event.
pub struct IngestAuditEventParams {
    /// Route label.
    pub route: &'static str,
    /// Declared producer account.
    pub producer_account: Option<String>,
    /// Declared producer instance identifier.
    pub instance_id: Option<String>,
    /// Certificate serial number when known.
    pub serial_number: Option<String>,
    /// Request outcome.
    pub outcome: IngestOutcome,
    /// HTTP status returned.
    pub status: u16,
    /// Number of violations reported.
    pub violation_count: usize,
    /// Failure detail.
    pub detail: Option<String>,
}

impl IngestAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: IngestAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "registry_request",
            timestamp_ms,
            route: params.route,
            producer_account: params.producer_account,
            instance_id: params.instance_id,
            serial_number: params.serial_number,
            outcome: params.outcome,
            status: params.status,
            violation_count: params.violation_count,
            detail: params.detail,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for registry events.
pub trait IngestAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &IngestAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrIngestAuditSink;

impl IngestAuditSink for StderrIngestAuditSink {
    fn record(&self, event: &IngestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileIngestAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<fs::File>,
}

impl FileIngestAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl IngestAuditSink for FileIngestAuditSink {
    fn record(&self, event: &IngestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopIngestAuditSink;

impl IngestAuditSink for NoopIngestAuditSink {
    fn record(&self, _event: &IngestAuditEvent) {}
}
