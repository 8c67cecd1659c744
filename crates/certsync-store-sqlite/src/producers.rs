// crates/certsync-store-sqlite/src/producers.rs
// ============================================================================
// Module: SQLite Producer Allow-List
// Description: Allow-list CRUD with soft delete and authorization lookups.
// Purpose: Persist which producer instances may submit certificate events.
// Dependencies: certsync-core, rusqlite
// ============================================================================

//! ## Overview
//! Entries are keyed by producer account with a secondary unique instance
//! identifier. Accounts are stored upper-cased and instance identifiers as
//! lower-case hyphenated GUIDs so lookups are exact matches. Entries are never
//! deleted; deactivation flips the status to `inactive`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use certsync_core::InstanceId;
use certsync_core::NewProducer;
use certsync_core::ProducerEntry;
use certsync_core::ProducerRegistry;
use certsync_core::ProducerStatus;
use certsync_core::ProducerUpdate;
use certsync_core::RegistryError;
use certsync_core::core::producer::normalize_account;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::store::SqliteRegistry;
use crate::store::SqliteStoreError;
use crate::store::db_error;
use crate::store::is_constraint_violation;
use crate::store::unix_millis;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Column list for producer reads; see [`RawProducer::from_row`].
const PRODUCER_COLUMNS: &str =
    "producer_id, producer_account, instance_id, description, status, created_at, updated_at";

// ============================================================================
// SECTION: Registry Implementation
// ============================================================================

impl ProducerRegistry for SqliteRegistry {
    fn list_producers(&self) -> Result<Vec<ProducerEntry>, RegistryError> {
        let guard = self.lock()?;
        let sql = format!("SELECT {PRODUCER_COLUMNS} FROM authorized_producers ORDER BY producer_id");
        let mut statement = guard.prepare(&sql).map_err(|err| db_error(&err))?;
        let rows = statement.query_map([], RawProducer::from_row).map_err(|err| db_error(&err))?;
        let mut entries = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| db_error(&err))?;
            entries.push(raw.into_entry()?);
        }
        Ok(entries)
    }

    fn producer(&self, producer_id: i64) -> Result<Option<ProducerEntry>, RegistryError> {
        let guard = self.lock()?;
        Ok(select_producer(&guard, producer_id)?)
    }

    fn create_producer(&self, producer: &NewProducer) -> Result<ProducerEntry, RegistryError> {
        let guard = self.lock()?;
        let now = unix_millis();
        guard
            .execute(
                "INSERT INTO authorized_producers (producer_account, instance_id, description, \
                 status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    normalize_account(&producer.producer_account),
                    producer.instance_id.as_hyphenated(),
                    producer.description,
                    ProducerStatus::Active.as_str(),
                    now
                ],
            )
            .map_err(|err| map_write_error(&err))?;
        let producer_id = guard.last_insert_rowid();
        Ok(require_producer(&guard, producer_id)?)
    }

    fn update_producer(
        &self,
        producer_id: i64,
        update: &ProducerUpdate,
    ) -> Result<ProducerEntry, RegistryError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE authorized_producers SET producer_account = ?1, instance_id = ?2, \
                 description = ?3, status = ?4, updated_at = ?5 WHERE producer_id = ?6",
                params![
                    normalize_account(&update.producer_account),
                    update.instance_id.as_hyphenated(),
                    update.description,
                    update.status.as_str(),
                    unix_millis(),
                    producer_id
                ],
            )
            .map_err(|err| map_write_error(&err))?;
        if changed == 0 {
            return Err(not_found(producer_id));
        }
        Ok(require_producer(&guard, producer_id)?)
    }

    fn deactivate_producer(&self, producer_id: i64) -> Result<ProducerEntry, RegistryError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE authorized_producers SET status = ?1, updated_at = ?2 WHERE producer_id = \
                 ?3",
                params![ProducerStatus::Inactive.as_str(), unix_millis(), producer_id],
            )
            .map_err(|err| db_error(&err))?;
        if changed == 0 {
            return Err(not_found(producer_id));
        }
        Ok(require_producer(&guard, producer_id)?)
    }

    fn is_authorized(&self, account: &str, instance_id: &InstanceId) -> Result<bool, RegistryError> {
        let guard = self.lock()?;
        let found: Option<i64> = guard
            .query_row(
                "SELECT producer_id FROM authorized_producers WHERE producer_account = ?1 AND \
                 instance_id = ?2 AND status = ?3",
                params![
                    normalize_account(account),
                    instance_id.as_hyphenated(),
                    ProducerStatus::Active.as_str()
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        Ok(found.is_some())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads one entry by id.
fn select_producer(
    connection: &Connection,
    producer_id: i64,
) -> Result<Option<ProducerEntry>, SqliteStoreError> {
    let sql = format!("SELECT {PRODUCER_COLUMNS} FROM authorized_producers WHERE producer_id = ?1");
    let raw = connection
        .query_row(&sql, params![producer_id], RawProducer::from_row)
        .optional()
        .map_err(|err| db_error(&err))?;
    raw.map(RawProducer::into_entry).transpose()
}

/// Loads one entry that must exist.
fn require_producer(
    connection: &Connection,
    producer_id: i64,
) -> Result<ProducerEntry, SqliteStoreError> {
    select_producer(connection, producer_id)?
        .ok_or_else(|| SqliteStoreError::NotFound(format!("producer {producer_id}")))
}

/// Builds the not-found error for an entry id.
fn not_found(producer_id: i64) -> RegistryError {
    RegistryError::NotFound(format!("producer {producer_id}"))
}

/// Maps insert/update failures, surfacing uniqueness violations as conflicts.
fn map_write_error(err: &rusqlite::Error) -> SqliteStoreError {
    if is_constraint_violation(err) {
        SqliteStoreError::Conflict("producer account or instance id already registered".to_string())
    } else {
        db_error(err)
    }
}

/// Producer row before decoding.
struct RawProducer {
    /// Entry identifier.
    producer_id: i64,
    /// Producer account.
    producer_account: String,
    /// Instance identifier text.
    instance_id: String,
    /// Optional description.
    description: Option<String>,
    /// Status label.
    status: String,
    /// Creation time (unix millis).
    created_at: i64,
    /// Last update time (unix millis).
    updated_at: i64,
}

impl RawProducer {
    /// Reads a row selected with [`PRODUCER_COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            producer_id: row.get(0)?,
            producer_account: row.get(1)?,
            instance_id: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Decodes the row, failing closed on malformed identifiers or statuses.
    fn into_entry(self) -> Result<ProducerEntry, SqliteStoreError> {
        let instance_id =
            InstanceId::parse(&self.instance_id).map_err(SqliteStoreError::Corrupt)?;
        let status = ProducerStatus::from_label(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("unknown producer status: {}", self.status))
        })?;
        Ok(ProducerEntry {
            producer_id: self.producer_id,
            producer_account: self.producer_account,
            instance_id,
            description: self.description,
            status,
            created_at_ms: self.created_at,
            updated_at_ms: self.updated_at,
        })
    }
}
