// crates/certsync-exit/src/audit.rs
// ============================================================================
// Module: Producer Audit Logging
// Description: Structured diagnostic events for the producer pipeline.
// Purpose: Record one JSON line per handled certificate event.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every event handled by the exit module produces exactly one
//! [`ExitAuditEvent`], whether it was delivered, buffered, or lost. Sinks are
//! trait objects so hosts can route events wherever they collect logs.

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

use certsync_core::EventKind;
use serde::Serialize;

use crate::buffer::FailureKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name of the producer log inside the configured log directory.
pub const EXIT_LOG_FILE_NAME: &str = "certsync-exit.jsonl";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Final outcome of one handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The registry accepted the payload.
    Delivered,
    /// The payload was written to the buffer store.
    Buffered,
    /// The payload could not be buffered either.
    BufferFailed,
}

/// Producer audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ExitAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Host notification context.
    pub context: i64,
    /// Notification kind.
    pub event_kind: EventKind,
    /// Certificate serial number when known.
    pub serial_number: Option<String>,
    /// Final outcome.
    pub outcome: ExitOutcome,
    /// HTTP status when the registry answered.
    pub http_status: Option<u16>,
    /// Failure stage when not delivered.
    pub failure_kind: Option<FailureKind>,
    /// Failure detail when not delivered.
    pub failure_detail: Option<String>,
    /// Buffer files written.
    pub buffer_files: Vec<String>,
}

/// Inputs required to construct a producer audit event.
pub struct ExitAuditEventParams {
    /// Host notification context.
    pub context: i64,
    /// Notification kind.
    pub event_kind: EventKind,
    /// Certificate serial number when known.
    pub serial_number: Option<String>,
    /// Final outcome.
    pub outcome: ExitOutcome,
    /// HTTP status when the registry answered.
    pub http_status: Option<u16>,
    /// Failure stage when not delivered.
    pub failure_kind: Option<FailureKind>,
    /// Failure detail when not delivered.
    pub failure_detail: Option<String>,
    /// Buffer files written.
    pub buffer_files: Vec<String>,
}

impl ExitAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: ExitAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "certificate_event",
            timestamp_ms,
            context: params.context,
            event_kind: params.event_kind,
            serial_number: params.serial_number,
            outcome: params.outcome,
            http_status: params.http_status,
            failure_kind: params.failure_kind,
            failure_detail: params.failure_detail,
            buffer_files: params.buffer_files,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for producer events.
pub trait ExitAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &ExitAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrExitAuditSink;

impl ExitAuditSink for StderrExitAuditSink {
    fn record(&self, event: &ExitAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileExitAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<fs::File>,
}

impl FileExitAuditSink {
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

    /// Opens `certsync-exit.jsonl` inside `dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn in_dir(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Self::new(&dir.join(EXIT_LOG_FILE_NAME))
    }
}

impl ExitAuditSink for FileExitAuditSink {
    fn record(&self, event: &ExitAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopExitAuditSink;

impl ExitAuditSink for NoopExitAuditSink {
    fn record(&self, _event: &ExitAuditEvent) {}
}
