// crates/certsync-store-sqlite/src/certificates.rs
// ============================================================================
// Module: SQLite Certificate Registry
// Description: Certificate upsert, expiry queries, and record reads.
// Purpose: Persist reconciliation decisions made by the upsert engine.
// Dependencies: certsync-core, rusqlite, time
// ============================================================================

//! ## Overview
//! Each submission runs inside one `BEGIN IMMEDIATE` transaction: reference
//! rows are ensured, the stored record is loaded and planned against, and
//! exactly the columns named by the plan are written. Concurrent first
//! arrivals are tolerated by treating unique-constraint failures on insert as
//! a signal to re-read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use certsync_core::CertificateDetail;
use certsync_core::CertificateFields;
use certsync_core::CertificateRegistry;
use certsync_core::CertificateSubmission;
use certsync_core::CertificateSummary;
use certsync_core::DispositionChange;
use certsync_core::DispositionCode;
use certsync_core::FieldUpdate;
use certsync_core::PreparedAttribute;
use certsync_core::RegistryError;
use certsync_core::SanEntry;
use certsync_core::SubmitOutcome;
use certsync_core::UpsertPlan;
use certsync_core::runtime::SanKey;
use certsync_core::runtime::plan_san_inserts;
use certsync_core::runtime::plan_upsert;
use certsync_core::runtime::prepare_attributes;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use time::OffsetDateTime;

use crate::store::SqliteRegistry;
use crate::store::SqliteStoreError;
use crate::store::db_error;
use crate::store::from_optional_unix_seconds;
use crate::store::from_unix_seconds;
use crate::store::is_constraint_violation;
use crate::store::unix_millis;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Column list shared by record reads; see [`RawCertificate::from_row`].
const CERTIFICATE_COLUMNS: &str = "c.certificate_id, c.ca_id, a.issuer_name, c.serial_number, \
     c.request_id, c.disposition, c.submitted_when, c.resolved_when, c.not_before, c.not_after, \
     c.revoked_when, c.revoked_effective_when, c.revoked_reason, t.template_oid, \
     t.template_name, c.thumbprint, c.subject_key_identifier, c.requester_name, c.caller_name, \
     c.key_recovery_hashes, c.signer_policies, c.signer_application_policies, \
     c.public_key_length, c.public_key_algorithm, c.disposition_message, c.status_code, \
     c.request_type, c.request_flags, c.created_at, c.updated_at";

/// Joins shared by record reads.
const CERTIFICATE_JOINS: &str = "FROM certificates c JOIN certificate_authorities a ON a.ca_id = \
     c.ca_id JOIN certificate_templates t ON t.template_id = c.template_id";

// ============================================================================
// SECTION: Registry Implementation
// ============================================================================

impl CertificateRegistry for SqliteRegistry {
    fn submit(&self, submission: &CertificateSubmission) -> Result<SubmitOutcome, RegistryError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let outcome = submit_in_tx(&tx, submission)?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(outcome)
    }

    fn expiring_before(
        &self,
        cutoff: OffsetDateTime,
    ) -> Result<Vec<CertificateSummary>, RegistryError> {
        let guard = self.lock()?;
        let sql = format!(
            "SELECT c.certificate_id, c.ca_id, c.serial_number, c.disposition, t.template_oid, \
             t.template_name, c.requester_name, c.thumbprint, c.not_before, c.not_after \
             {CERTIFICATE_JOINS} WHERE c.disposition = ?1 AND c.not_after < ?2 ORDER BY \
             c.not_after, c.certificate_id"
        );
        let mut statement = guard.prepare(&sql).map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![DispositionCode::ISSUED.code(), cutoff.unix_timestamp()],
                RawSummary::from_row,
            )
            .map_err(|err| db_error(&err))?;
        let mut summaries = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| db_error(&err))?;
            summaries.push(raw.into_summary()?);
        }
        Ok(summaries)
    }

    fn certificate(
        &self,
        ca_id: &str,
        serial_number: &str,
    ) -> Result<Option<CertificateDetail>, RegistryError> {
        let guard = self.lock()?;
        let Some(raw) = query_raw(&guard, ca_id, serial_number)? else {
            return Ok(None);
        };
        let certificate_id = raw.certificate_id;
        let created_at_ms = raw.created_at;
        let updated_at_ms = raw.updated_at;
        let fields = raw.into_fields()?;
        let sans = load_sans(&guard, certificate_id)?;
        let subject_attributes = load_attributes(&guard, certificate_id)?;
        Ok(Some(CertificateDetail {
            certificate_id,
            fields,
            sans,
            subject_attributes,
            created_at_ms,
            updated_at_ms,
        }))
    }
}

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Reconciles one submission inside an open transaction.
fn submit_in_tx(
    tx: &Connection,
    submission: &CertificateSubmission,
) -> Result<SubmitOutcome, SqliteStoreError> {
    let fields = &submission.fields;
    let now = unix_millis();
    let template_id = ensure_template(tx, &fields.template_oid, &fields.template_name, now)?;
    ensure_authority(tx, &fields.ca_id, &fields.issuer_name, now)?;

    let existing = load_fields(tx, &fields.ca_id, &fields.serial_number)?;
    let (certificate_id, plan) = match existing {
        Some((certificate_id, stored)) => (certificate_id, plan_upsert(Some(&stored), fields)),
        None => match insert_certificate(tx, template_id, fields, now) {
            Ok(certificate_id) => (certificate_id, UpsertPlan::Create),
            Err(err) if is_constraint_violation(&err) => {
                let (certificate_id, stored) = load_fields(tx, &fields.ca_id, &fields.serial_number)?
                    .ok_or_else(|| {
                        SqliteStoreError::Corrupt(
                            "certificate missing after duplicate insert".to_string(),
                        )
                    })?;
                (certificate_id, plan_upsert(Some(&stored), fields))
            }
            Err(err) => return Err(db_error(&err)),
        },
    };

    let created = match &plan {
        UpsertPlan::Conflict {
            stored,
        } => {
            return Ok(SubmitOutcome::Conflict {
                certificate_id,
                disposition: *stored,
            });
        }
        UpsertPlan::Update(update) => {
            apply_update(tx, certificate_id, update, now)?;
            false
        }
        UpsertPlan::Create => true,
    };

    let attributes_added =
        insert_attributes(tx, certificate_id, &prepare_attributes(&submission.attributes))?;
    let sans_added = insert_sans(tx, certificate_id, &submission.sans)?;
    if created {
        Ok(SubmitOutcome::Created {
            certificate_id,
            sans_added,
            attributes_added,
        })
    } else {
        Ok(SubmitOutcome::Updated {
            certificate_id,
            sans_added,
            attributes_added,
        })
    }
}

/// Returns the template row id for `oid`, inserting it on first reference.
fn ensure_template(
    tx: &Connection,
    oid: &str,
    name: &str,
    now: i64,
) -> Result<i64, SqliteStoreError> {
    if let Some(template_id) = select_template(tx, oid)? {
        return Ok(template_id);
    }
    match tx.execute(
        "INSERT INTO certificate_templates (template_oid, template_name, created_at) VALUES (?1, \
         ?2, ?3)",
        params![oid, name, now],
    ) {
        Ok(_) => Ok(tx.last_insert_rowid()),
        Err(err) if is_constraint_violation(&err) => select_template(tx, oid)?.ok_or_else(|| {
            SqliteStoreError::Corrupt("template missing after duplicate insert".to_string())
        }),
        Err(err) => Err(db_error(&err)),
    }
}

/// Looks up a template row id by OID.
fn select_template(tx: &Connection, oid: &str) -> Result<Option<i64>, SqliteStoreError> {
    tx.query_row(
        "SELECT template_id FROM certificate_templates WHERE template_oid = ?1",
        params![oid],
        |row| row.get(0),
    )
    .optional()
    .map_err(|err| db_error(&err))
}

/// Ensures the issuing authority row exists.
fn ensure_authority(
    tx: &Connection,
    ca_id: &str,
    issuer_name: &str,
    now: i64,
) -> Result<(), SqliteStoreError> {
    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM certificate_authorities WHERE ca_id = ?1",
            params![ca_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    if exists.is_some() {
        return Ok(());
    }
    match tx.execute(
        "INSERT INTO certificate_authorities (ca_id, issuer_name, created_at) VALUES (?1, ?2, ?3)",
        params![ca_id, issuer_name, now],
    ) {
        Ok(_) => Ok(()),
        Err(err) if is_constraint_violation(&err) => Ok(()),
        Err(err) => Err(db_error(&err)),
    }
}

/// Inserts a full certificate row and returns its id.
fn insert_certificate(
    tx: &Connection,
    template_id: i64,
    fields: &CertificateFields,
    now: i64,
) -> Result<i64, rusqlite::Error> {
    tx.execute(
        "INSERT INTO certificates (ca_id, template_id, serial_number, request_id, disposition, \
         submitted_when, resolved_when, not_before, not_after, revoked_when, \
         revoked_effective_when, revoked_reason, thumbprint, subject_key_identifier, \
         requester_name, caller_name, key_recovery_hashes, signer_policies, \
         signer_application_policies, public_key_length, public_key_algorithm, \
         disposition_message, status_code, request_type, request_flags, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
         ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?26)",
        params![
            fields.ca_id,
            template_id,
            fields.serial_number,
            fields.request_id,
            fields.disposition.code(),
            fields.submitted_when.unix_timestamp(),
            fields.resolved_when.map(OffsetDateTime::unix_timestamp),
            fields.not_before.unix_timestamp(),
            fields.not_after.unix_timestamp(),
            fields.revoked_when.map(OffsetDateTime::unix_timestamp),
            fields.revoked_effective_when.map(OffsetDateTime::unix_timestamp),
            fields.revoked_reason,
            fields.thumbprint,
            fields.subject_key_identifier,
            fields.requester_name,
            fields.caller_name,
            fields.key_recovery_hashes,
            fields.signer_policies,
            fields.signer_application_policies,
            fields.public_key_length,
            fields.public_key_algorithm,
            fields.disposition_message,
            fields.status_code,
            fields.request_type,
            fields.request_flags,
            now,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Writes exactly the columns a partial update owns.
fn apply_update(
    tx: &Connection,
    certificate_id: i64,
    update: &FieldUpdate,
    now: i64,
) -> Result<(), SqliteStoreError> {
    tx.execute(
        "UPDATE certificates SET disposition = ?1, status_code = ?2, disposition_message = ?3, \
         updated_at = ?4 WHERE certificate_id = ?5",
        params![
            update.disposition.code(),
            update.status_code,
            update.disposition_message,
            now,
            certificate_id
        ],
    )
    .map_err(|err| db_error(&err))?;
    let result = match &update.change {
        DispositionChange::None => return Ok(()),
        DispositionChange::NotAfter(not_after) => tx.execute(
            "UPDATE certificates SET not_after = ?1 WHERE certificate_id = ?2",
            params![not_after.unix_timestamp(), certificate_id],
        ),
        DispositionChange::KeyRecovery(hashes) => tx.execute(
            "UPDATE certificates SET key_recovery_hashes = ?1 WHERE certificate_id = ?2",
            params![hashes, certificate_id],
        ),
        DispositionChange::Revocation {
            when,
            effective_when,
            reason,
        } => tx.execute(
            "UPDATE certificates SET revoked_when = ?1, revoked_effective_when = ?2, \
             revoked_reason = ?3 WHERE certificate_id = ?4",
            params![
                when.map(OffsetDateTime::unix_timestamp),
                effective_when.map(OffsetDateTime::unix_timestamp),
                reason,
                certificate_id
            ],
        ),
    };
    result.map(|_| ()).map_err(|err| db_error(&err))
}

/// Inserts prepared subject attributes and returns the number written.
fn insert_attributes(
    tx: &Connection,
    certificate_id: i64,
    attributes: &[PreparedAttribute],
) -> Result<usize, SqliteStoreError> {
    if attributes.is_empty() {
        return Ok(0);
    }
    let mut statement = tx
        .prepare(
            "INSERT INTO subject_attributes (certificate_id, attribute_type, attribute_value, \
             value_hash) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|err| db_error(&err))?;
    for attribute in attributes {
        statement
            .execute(params![
                certificate_id,
                attribute.attribute_type,
                attribute.attribute_value,
                attribute.value_hash
            ])
            .map_err(|err| db_error(&err))?;
    }
    Ok(attributes.len())
}

/// Inserts SAN candidates not already stored and returns the number written.
fn insert_sans(
    tx: &Connection,
    certificate_id: i64,
    candidates: &[SanEntry],
) -> Result<usize, SqliteStoreError> {
    if candidates.is_empty() {
        return Ok(0);
    }
    let existing = existing_san_keys(tx, certificate_id)?;
    let planned = plan_san_inserts(&existing, candidates);
    let mut statement = tx
        .prepare(
            "INSERT INTO certificate_sans (certificate_id, san_type, san_oid, san_value) VALUES \
             (?1, ?2, ?3, ?4)",
        )
        .map_err(|err| db_error(&err))?;
    for entry in &planned {
        statement
            .execute(params![certificate_id, entry.san_type, entry.oid, entry.value])
            .map_err(|err| db_error(&err))?;
    }
    Ok(planned.len())
}

/// Returns the (type, value) keys already stored for a record.
fn existing_san_keys(
    tx: &Connection,
    certificate_id: i64,
) -> Result<BTreeSet<SanKey>, SqliteStoreError> {
    let mut statement = tx
        .prepare("SELECT san_type, san_value FROM certificate_sans WHERE certificate_id = ?1")
        .map_err(|err| db_error(&err))?;
    let rows = statement
        .query_map(params![certificate_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|err| db_error(&err))?;
    rows.collect::<Result<BTreeSet<SanKey>, _>>().map_err(|err| db_error(&err))
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Loads the stored fields for a record, when present.
fn load_fields(
    connection: &Connection,
    ca_id: &str,
    serial_number: &str,
) -> Result<Option<(i64, CertificateFields)>, SqliteStoreError> {
    let Some(raw) = query_raw(connection, ca_id, serial_number)? else {
        return Ok(None);
    };
    let certificate_id = raw.certificate_id;
    Ok(Some((certificate_id, raw.into_fields()?)))
}

/// Reads the raw row for a record.
fn query_raw(
    connection: &Connection,
    ca_id: &str,
    serial_number: &str,
) -> Result<Option<RawCertificate>, SqliteStoreError> {
    let sql = format!(
        "SELECT {CERTIFICATE_COLUMNS} {CERTIFICATE_JOINS} WHERE c.ca_id = ?1 AND \
         c.serial_number = ?2"
    );
    connection
        .query_row(&sql, params![ca_id, serial_number], RawCertificate::from_row)
        .optional()
        .map_err(|err| db_error(&err))
}

/// Loads stored SAN entries in insertion order.
fn load_sans(
    connection: &Connection,
    certificate_id: i64,
) -> Result<Vec<SanEntry>, SqliteStoreError> {
    let mut statement = connection
        .prepare(
            "SELECT san_type, san_oid, san_value FROM certificate_sans WHERE certificate_id = ?1 \
             ORDER BY san_id",
        )
        .map_err(|err| db_error(&err))?;
    let rows = statement
        .query_map(params![certificate_id], |row| {
            Ok(SanEntry {
                san_type: row.get(0)?,
                oid: row.get(1)?,
                value: row.get(2)?,
            })
        })
        .map_err(|err| db_error(&err))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
}

/// Loads stored subject attributes in insertion order.
fn load_attributes(
    connection: &Connection,
    certificate_id: i64,
) -> Result<Vec<PreparedAttribute>, SqliteStoreError> {
    let mut statement = connection
        .prepare(
            "SELECT attribute_type, attribute_value, value_hash FROM subject_attributes WHERE \
             certificate_id = ?1 ORDER BY attribute_id",
        )
        .map_err(|err| db_error(&err))?;
    let rows = statement
        .query_map(params![certificate_id], |row| {
            Ok(PreparedAttribute {
                attribute_type: row.get(0)?,
                attribute_value: row.get(1)?,
                value_hash: row.get(2)?,
            })
        })
        .map_err(|err| db_error(&err))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Certificate row as stored, before timestamp and disposition decoding.
struct RawCertificate {
    /// Record identifier.
    certificate_id: i64,
    /// Issuing authority identifier.
    ca_id: String,
    /// Issuing authority display name.
    issuer_name: String,
    /// Serial number.
    serial_number: String,
    /// Request identifier.
    request_id: i64,
    /// Disposition code.
    disposition: i64,
    /// Submission time (unix seconds).
    submitted_when: i64,
    /// Resolution time (unix seconds).
    resolved_when: Option<i64>,
    /// Validity start (unix seconds).
    not_before: i64,
    /// Validity end (unix seconds).
    not_after: i64,
    /// Revocation time (unix seconds).
    revoked_when: Option<i64>,
    /// Revocation effective time (unix seconds).
    revoked_effective_when: Option<i64>,
    /// Revocation reason.
    revoked_reason: Option<i64>,
    /// Template OID.
    template_oid: String,
    /// Template name.
    template_name: String,
    /// Thumbprint.
    thumbprint: String,
    /// Subject key identifier.
    subject_key_identifier: Option<String>,
    /// Requester identity.
    requester_name: Option<String>,
    /// Caller identity.
    caller_name: Option<String>,
    /// Key recovery hashes.
    key_recovery_hashes: Option<String>,
    /// Signer policies.
    signer_policies: Option<String>,
    /// Signer application policies.
    signer_application_policies: Option<String>,
    /// Public key length.
    public_key_length: Option<String>,
    /// Public key algorithm.
    public_key_algorithm: Option<String>,
    /// Disposition message.
    disposition_message: Option<String>,
    /// Status code.
    status_code: Option<i64>,
    /// Request type.
    request_type: Option<i64>,
    /// Request flags.
    request_flags: Option<i64>,
    /// Creation time (unix millis).
    created_at: i64,
    /// Last update time (unix millis).
    updated_at: i64,
}

impl RawCertificate {
    /// Reads a row selected with [`CERTIFICATE_COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            certificate_id: row.get(0)?,
            ca_id: row.get(1)?,
            issuer_name: row.get(2)?,
            serial_number: row.get(3)?,
            request_id: row.get(4)?,
            disposition: row.get(5)?,
            submitted_when: row.get(6)?,
            resolved_when: row.get(7)?,
            not_before: row.get(8)?,
            not_after: row.get(9)?,
            revoked_when: row.get(10)?,
            revoked_effective_when: row.get(11)?,
            revoked_reason: row.get(12)?,
            template_oid: row.get(13)?,
            template_name: row.get(14)?,
            thumbprint: row.get(15)?,
            subject_key_identifier: row.get(16)?,
            requester_name: row.get(17)?,
            caller_name: row.get(18)?,
            key_recovery_hashes: row.get(19)?,
            signer_policies: row.get(20)?,
            signer_application_policies: row.get(21)?,
            public_key_length: row.get(22)?,
            public_key_algorithm: row.get(23)?,
            disposition_message: row.get(24)?,
            status_code: row.get(25)?,
            request_type: row.get(26)?,
            request_flags: row.get(27)?,
            created_at: row.get(28)?,
            updated_at: row.get(29)?,
        })
    }

    /// Decodes the row into typed fields.
    fn into_fields(self) -> Result<CertificateFields, SqliteStoreError> {
        Ok(CertificateFields {
            ca_id: self.ca_id,
            issuer_name: self.issuer_name,
            serial_number: self.serial_number,
            request_id: self.request_id,
            disposition: decode_disposition(self.disposition)?,
            submitted_when: from_unix_seconds("submitted_when", self.submitted_when)?,
            resolved_when: from_optional_unix_seconds("resolved_when", self.resolved_when)?,
            not_before: from_unix_seconds("not_before", self.not_before)?,
            not_after: from_unix_seconds("not_after", self.not_after)?,
            revoked_when: from_optional_unix_seconds("revoked_when", self.revoked_when)?,
            revoked_effective_when: from_optional_unix_seconds(
                "revoked_effective_when",
                self.revoked_effective_when,
            )?,
            revoked_reason: self.revoked_reason,
            template_oid: self.template_oid,
            template_name: self.template_name,
            thumbprint: self.thumbprint,
            subject_key_identifier: self.subject_key_identifier,
            requester_name: self.requester_name,
            caller_name: self.caller_name,
            key_recovery_hashes: self.key_recovery_hashes,
            signer_policies: self.signer_policies,
            signer_application_policies: self.signer_application_policies,
            public_key_length: self.public_key_length,
            public_key_algorithm: self.public_key_algorithm,
            disposition_message: self.disposition_message,
            status_code: self.status_code,
            request_type: self.request_type,
            request_flags: self.request_flags,
        })
    }
}

/// Expiry summary row before decoding.
struct RawSummary {
    /// Record identifier.
    certificate_id: i64,
    /// Issuing authority identifier.
    ca_id: String,
    /// Serial number.
    serial_number: String,
    /// Disposition code.
    disposition: i64,
    /// Template OID.
    template_oid: String,
    /// Template name.
    template_name: String,
    /// Requester identity.
    requester_name: Option<String>,
    /// Thumbprint.
    thumbprint: String,
    /// Validity start (unix seconds).
    not_before: i64,
    /// Validity end (unix seconds).
    not_after: i64,
}

impl RawSummary {
    /// Reads a summary row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            certificate_id: row.get(0)?,
            ca_id: row.get(1)?,
            serial_number: row.get(2)?,
            disposition: row.get(3)?,
            template_oid: row.get(4)?,
            template_name: row.get(5)?,
            requester_name: row.get(6)?,
            thumbprint: row.get(7)?,
            not_before: row.get(8)?,
            not_after: row.get(9)?,
        })
    }

    /// Decodes the row into a summary.
    fn into_summary(self) -> Result<CertificateSummary, SqliteStoreError> {
        Ok(CertificateSummary {
            certificate_id: self.certificate_id,
            ca_id: self.ca_id,
            serial_number: self.serial_number,
            disposition: decode_disposition(self.disposition)?,
            template_oid: self.template_oid,
            template_name: self.template_name,
            requester_name: self.requester_name,
            thumbprint: self.thumbprint,
            not_before: from_unix_seconds("not_before", self.not_before)?,
            not_after: from_unix_seconds("not_after", self.not_after)?,
        })
    }
}

/// Decodes a stored disposition, failing closed on unknown codes.
fn decode_disposition(code: i64) -> Result<DispositionCode, SqliteStoreError> {
    DispositionCode::new(code).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}
