// crates/certsync-exit/src/buffer.rs
// ============================================================================
// Module: Buffer Store
// Description: Durable local storage for payloads that could not be delivered.
// Purpose: Preserve every failed attempt for diagnosis and operator redelivery.
// Dependencies: certsync-core, serde, serde_json, tempfile, time
// ============================================================================

//! ## Overview
//! Each failed attempt is written twice: once under a unique per-attempt name
//! and once as the latest snapshot for its serial number. Both writes go
//! through a uniquely named temporary file that is synced and then moved into
//! place, so readers never observe a partial file.
//! Invariants:
//! - Attempt names carry the process id and a process-wide sequence.
//! - An attempt file is never replaced; a taken name moves on to the next
//!   sequence.
//! - Once the attempt file is durable the event counts as preserved. A failed
//!   serial snapshot is reported on the receipt.
//! - Buffered file names contain only `[A-Za-z0-9_.-]`.
//!
//! Security posture: buffered files may be read back by operator tooling and
//! are treated as untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use certsync_core::CertificatePayload;
use certsync_core::EventKind;
use certsync_core::core::payload::fields;
use certsync_core::core::payload::format_timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::properties::PropertyBag;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix of per-attempt file names.
const ATTEMPT_PREFIX: &str = "Notify_";
/// Extension of buffered files.
const BUFFER_EXTENSION: &str = ".json";
/// Maximum buffered file size accepted by [`BufferStore::load`].
const MAX_BUFFER_FILE_BYTES: u64 = 16 * 1024 * 1024;
/// Attempt names tried before giving up on a crowded directory.
const MAX_ATTEMPT_NAMES: usize = 64;

/// Process-wide attempt counter.
static ATTEMPT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Stage at which an event failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The property bag could not be turned into an event.
    Extraction,
    /// The payload lacked mandatory fields.
    Validation,
    /// Delivery to the registry failed.
    Transport,
}

impl FailureKind {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Validation => "validation",
            Self::Transport => "transport",
        }
    }
}

/// Why an event was buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferFailure {
    /// Failure stage.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub detail: String,
}

/// Buffered envelope written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedPayload {
    /// Buffer time (RFC 3339).
    pub buffered_at: String,
    /// Host notification context.
    pub context: i64,
    /// Notification kind.
    pub event_kind: EventKind,
    /// Certificate serial number when known.
    pub serial_number: Option<String>,
    /// Why the event was buffered.
    pub failure: BufferFailure,
    /// Wire payload, or the raw property bag for extraction failures.
    pub payload: Value,
}

impl BufferedPayload {
    /// Wraps a built payload.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Encode`] when the payload cannot be encoded.
    pub fn from_payload(
        context: i64,
        event_kind: EventKind,
        payload: &CertificatePayload,
        failure: BufferFailure,
    ) -> Result<Self, BufferError> {
        let value =
            serde_json::to_value(payload).map_err(|err| BufferError::Encode(err.to_string()))?;
        Ok(Self {
            buffered_at: now_rfc3339(),
            context,
            event_kind,
            serial_number: payload.serial_number().map(str::to_string),
            failure,
            payload: value,
        })
    }

    /// Wraps a raw property bag that could not be extracted.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Encode`] when the bag cannot be encoded.
    pub fn from_properties(
        context: i64,
        event_kind: EventKind,
        properties: &PropertyBag,
        serial_number: Option<String>,
        failure: BufferFailure,
    ) -> Result<Self, BufferError> {
        let data =
            serde_json::to_value(properties).map_err(|err| BufferError::Encode(err.to_string()))?;
        Ok(Self {
            buffered_at: now_rfc3339(),
            context,
            event_kind,
            serial_number,
            failure,
            payload: json!({
                (fields::DATA): data,
                (fields::SANS): [],
                (fields::SUBJECT_ATTRIBUTES): [],
            }),
        })
    }

    /// Decodes the wire payload for redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Decode`] for extraction failures, which hold a
    /// raw property bag, or when the payload does not decode.
    pub fn certificate_payload(&self) -> Result<CertificatePayload, BufferError> {
        if self.failure.kind == FailureKind::Extraction {
            return Err(BufferError::Decode(
                "extraction failures hold raw properties and cannot be redelivered".to_string(),
            ));
        }
        serde_json::from_value(self.payload.clone())
            .map_err(|err| BufferError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Buffer store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Filesystem failure.
    #[error("buffer io error: {0}")]
    Io(String),
    /// Envelope encoding failure.
    #[error("buffer encode error: {0}")]
    Encode(String),
    /// Envelope decoding failure.
    #[error("buffer decode error: {0}")]
    Decode(String),
    /// File name outside the buffer namespace.
    #[error("invalid buffer file name: {0}")]
    InvalidName(String),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Names of the files written for one buffered attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferReceipt {
    /// Unique per-attempt file name.
    pub attempt_file: String,
    /// Per-serial snapshot file name when a serial was known and written.
    pub serial_file: Option<String>,
    /// Why the serial snapshot could not be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_error: Option<String>,
}

/// One buffered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferEntry {
    /// File name inside the buffer directory.
    pub name: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Serial number recorded for the file, if any.
    pub serial_number: Option<String>,
}

/// Directory-backed buffer store.
#[derive(Debug, Clone)]
pub struct BufferStore {
    /// Buffer directory.
    dir: PathBuf,
}

impl BufferStore {
    /// Opens the store, creating the directory when needed.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BufferError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, &err))?;
        Ok(Self {
            dir,
        })
    }

    /// Returns the buffer directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably writes an envelope under its attempt and serial names.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] when encoding fails or the attempt file cannot
    /// be written. Serial snapshot failures land in
    /// [`BufferReceipt::serial_error`] instead.
    pub fn put(&self, envelope: &BufferedPayload) -> Result<BufferReceipt, BufferError> {
        let bytes = serde_json::to_vec_pretty(envelope)
            .map_err(|err| BufferError::Encode(err.to_string()))?;
        let names = (0 .. MAX_ATTEMPT_NAMES).map(|_| attempt_file_name(envelope.context));
        let attempt_file = self.write_new(names, &bytes)?;
        let mut receipt = BufferReceipt {
            attempt_file,
            serial_file: None,
            serial_error: None,
        };
        let serial_name = envelope
            .serial_number
            .as_deref()
            .and_then(sanitize_serial)
            .map(|serial| format!("{serial}{BUFFER_EXTENSION}"));
        if let Some(name) = serial_name {
            match self.write_replace(&name, &bytes) {
                Ok(()) => receipt.serial_file = Some(name),
                Err(err) => receipt.serial_error = Some(err.to_string()),
            }
        }
        Ok(receipt)
    }

    /// Lists buffered files sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Io`] when the directory cannot be read.
    pub fn list(&self) -> Result<Vec<BufferEntry>, BufferError> {
        let reader = fs::read_dir(&self.dir).map_err(|err| io_error(&self.dir, &err))?;
        let mut entries = Vec::new();
        for item in reader {
            let item = item.map_err(|err| io_error(&self.dir, &err))?;
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            if validate_name(&name).is_err() {
                continue;
            }
            let metadata = item.metadata().map_err(|err| io_error(&item.path(), &err))?;
            if !metadata.is_file() {
                continue;
            }
            let serial_number = if name.starts_with(ATTEMPT_PREFIX) {
                self.load(&name).ok().and_then(|envelope| envelope.serial_number)
            } else {
                name.strip_suffix(BUFFER_EXTENSION).map(str::to_string)
            };
            entries.push(BufferEntry {
                name,
                size_bytes: metadata.len(),
                serial_number,
            });
        }
        entries.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(entries)
    }

    /// Reads one buffered envelope.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] when the name is invalid or the file cannot be
    /// read or decoded.
    pub fn load(&self, name: &str) -> Result<BufferedPayload, BufferError> {
        let path = self.resolve(name)?;
        let metadata = fs::metadata(&path).map_err(|err| io_error(&path, &err))?;
        if metadata.len() > MAX_BUFFER_FILE_BYTES {
            return Err(BufferError::Decode(format!("{name} exceeds size limit")));
        }
        let bytes = fs::read(&path).map_err(|err| io_error(&path, &err))?;
        serde_json::from_slice(&bytes).map_err(|err| BufferError::Decode(err.to_string()))
    }

    /// Deletes one buffered file.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] when the name is invalid or removal fails.
    pub fn remove(&self, name: &str) -> Result<(), BufferError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|err| io_error(&path, &err))
    }

    /// Maps a file name to a path inside the buffer directory.
    fn resolve(&self, name: &str) -> Result<PathBuf, BufferError> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Writes bytes to a synced temporary file inside the buffer directory.
    fn write_temp(&self, bytes: &[u8]) -> Result<NamedTempFile, BufferError> {
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|err| io_error(&self.dir, &err))?;
        temp.write_all(bytes).map_err(|err| io_error(temp.path(), &err))?;
        temp.as_file().sync_all().map_err(|err| io_error(temp.path(), &err))?;
        Ok(temp)
    }

    /// Moves bytes into place under the first free name and returns it.
    fn write_new(
        &self,
        names: impl IntoIterator<Item = String>,
        bytes: &[u8],
    ) -> Result<String, BufferError> {
        let mut temp = self.write_temp(bytes)?;
        for name in names {
            let target = self.dir.join(&name);
            match temp.persist_noclobber(&target) {
                Ok(_) => return Ok(name),
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => temp = err.file,
                Err(err) => return Err(io_error(&target, &err.error)),
            }
        }
        Err(BufferError::Io(format!("no free attempt file name in {}", self.dir.display())))
    }

    /// Moves bytes into place under `name`, replacing any previous file.
    fn write_replace(&self, name: &str, bytes: &[u8]) -> Result<(), BufferError> {
        let target = self.dir.join(name);
        self.write_temp(bytes)?
            .persist(&target)
            .map(|_| ())
            .map_err(|err| io_error(&target, &err.error))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a per-attempt file name from the clock, process id and sequence.
fn attempt_file_name(context: i64) -> String {
    let sequence = ATTEMPT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_default();
    let pid = std::process::id();
    format!("{ATTEMPT_PREFIX}{context}_{stamp}_{pid}_{sequence:04}{BUFFER_EXTENSION}")
}

/// Reduces a serial number to a safe file stem.
fn sanitize_serial(serial: &str) -> Option<String> {
    let cleaned: String = serial
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Rejects names that could escape the buffer directory.
fn validate_name(name: &str) -> Result<(), BufferError> {
    let valid = name.ends_with(BUFFER_EXTENSION)
        && name.len() > BUFFER_EXTENSION.len()
        && !name.starts_with('.')
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid { Ok(()) } else { Err(BufferError::InvalidName(name.to_string())) }
}

/// Returns the current time in RFC 3339.
fn now_rfc3339() -> String {
    format_timestamp(OffsetDateTime::now_utc()).unwrap_or_default()
}

/// Formats an I/O error with its path.
fn io_error(path: &Path, err: &std::io::Error) -> BufferError {
    BufferError::Io(format!("{}: {err}", path.display()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
