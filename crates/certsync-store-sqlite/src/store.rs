// crates/certsync-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Registry Store
// Description: Connection setup, schema management, and shared helpers.
// Purpose: Open and version the durable certificate registry database.
// Dependencies: certsync-core, rusqlite, serde, thiserror, time
// ============================================================================

//! ## Overview
//! [`SqliteRegistry`] owns a single `SQLite` connection guarded by a mutex.
//! Opening the registry validates the path, applies durability pragmas, and
//! creates or verifies the schema version recorded in `store_meta`. Several
//! registries may share one database file; cross-process serialization is
//! delegated to `SQLite` write locks and the configured busy timeout.
//!
//! Security posture: database contents are untrusted and decoded fail-closed;
//! see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use certsync_core::RegistryError;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the registry.
pub const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` registry.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config with default tuning for `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Validates the configured path against length and type limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path violates limits.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` registry errors.
///
/// # Invariants
/// - Error messages avoid embedding raw certificate payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Uniqueness constraint violated.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Requested row does not exist.
    #[error("sqlite store not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for RegistryError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

/// Maps a rusqlite error into a store error.
pub(crate) fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Returns true when the error is a uniqueness or check constraint failure.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// `SQLite`-backed certificate registry and producer allow-list.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Every certificate submission runs in one immediate transaction.
#[derive(Clone)]
pub struct SqliteRegistry {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Opens an `SQLite`-backed registry.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquires the connection mutex.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS certificate_authorities (
                    ca_id TEXT PRIMARY KEY,
                    issuer_name TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS certificate_templates (
                    template_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    template_oid TEXT NOT NULL UNIQUE,
                    template_name TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS certificates (
                    certificate_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ca_id TEXT NOT NULL REFERENCES certificate_authorities(ca_id),
                    template_id INTEGER NOT NULL REFERENCES certificate_templates(template_id),
                    serial_number TEXT NOT NULL,
                    request_id INTEGER NOT NULL,
                    disposition INTEGER NOT NULL,
                    submitted_when INTEGER NOT NULL,
                    resolved_when INTEGER,
                    not_before INTEGER NOT NULL,
                    not_after INTEGER NOT NULL,
                    revoked_when INTEGER,
                    revoked_effective_when INTEGER,
                    revoked_reason INTEGER,
                    thumbprint TEXT NOT NULL,
                    subject_key_identifier TEXT,
                    requester_name TEXT,
                    caller_name TEXT,
                    key_recovery_hashes TEXT,
                    signer_policies TEXT,
                    signer_application_policies TEXT,
                    public_key_length TEXT,
                    public_key_algorithm TEXT,
                    disposition_message TEXT,
                    status_code INTEGER,
                    request_type INTEGER,
                    request_flags INTEGER,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE (ca_id, serial_number)
                );
                CREATE INDEX IF NOT EXISTS idx_certificates_expiring
                    ON certificates (disposition, not_after);
                CREATE TABLE IF NOT EXISTS certificate_sans (
                    san_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    certificate_id INTEGER NOT NULL
                        REFERENCES certificates(certificate_id) ON DELETE CASCADE,
                    san_type TEXT NOT NULL,
                    san_oid TEXT,
                    san_value TEXT NOT NULL,
                    UNIQUE (certificate_id, san_type, san_value)
                );
                CREATE TABLE IF NOT EXISTS subject_attributes (
                    attribute_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    certificate_id INTEGER NOT NULL
                        REFERENCES certificates(certificate_id) ON DELETE CASCADE,
                    attribute_type TEXT NOT NULL,
                    attribute_value TEXT NOT NULL,
                    value_hash TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_subject_attributes_certificate
                    ON subject_attributes (certificate_id);
                CREATE TABLE IF NOT EXISTS authorized_producers (
                    producer_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    producer_account TEXT NOT NULL UNIQUE,
                    instance_id TEXT NOT NULL UNIQUE,
                    description TEXT,
                    status TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
pub(crate) fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Converts stored unix seconds back into a timestamp.
pub(crate) fn from_unix_seconds(
    column: &str,
    seconds: i64,
) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| SqliteStoreError::Corrupt(format!("{column} out of range: {err}")))
}

/// Converts optional stored unix seconds back into a timestamp.
pub(crate) fn from_optional_unix_seconds(
    column: &str,
    seconds: Option<i64>,
) -> Result<Option<OffsetDateTime>, SqliteStoreError> {
    seconds.map(|value| from_unix_seconds(column, value)).transpose()
}
