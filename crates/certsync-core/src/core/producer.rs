// crates/certsync-core/src/core/producer.rs
// ============================================================================
// Module: Producer Allow-List
// Description: Identities of issuing-authority hosts allowed to submit events.
// Purpose: Model allow-list entries with soft-delete status.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Each allow-list entry pairs a producer account (the authority host name)
//! with a producer-supplied instance identifier. Entries are never removed;
//! deactivation flips [`ProducerStatus`] so history is preserved.
//!
//! Invariants:
//! - Accounts are stored trimmed and upper-cased.
//! - Instance identifiers are GUIDs, stored lower-case hyphenated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::core::violation::FieldViolation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum producer account length.
pub const MAX_PRODUCER_ACCOUNT_LENGTH: usize = 256;
/// Maximum producer description length.
pub const MAX_PRODUCER_DESCRIPTION_LENGTH: usize = 1024;
/// HTTP header carrying the producer instance identifier on deliveries.
pub const PRODUCER_INSTANCE_HEADER: &str = "x-producer-instance-id";

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Producer-supplied instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Parses a GUID in any common textual form.
    ///
    /// # Errors
    ///
    /// Returns an error message when the value is not a GUID.
    pub fn parse(value: &str) -> Result<Self, String> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| format!("'{}' is not a valid GUID", value.trim()))
    }

    /// Returns the canonical lower-case hyphenated form.
    #[must_use]
    pub fn as_hyphenated(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for InstanceId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Normalizes a producer account for storage and comparison.
#[must_use]
pub fn normalize_account(account: &str) -> String {
    account.trim().to_ascii_uppercase()
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Allow-list entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStatus {
    /// Entry authorizes submissions.
    Active,
    /// Entry retained for history only.
    Inactive,
}

impl ProducerStatus {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Stored allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerEntry {
    /// Entry identifier.
    pub producer_id: i64,
    /// Normalized producer account.
    pub producer_account: String,
    /// Producer instance identifier.
    pub instance_id: InstanceId,
    /// Free-form description.
    pub description: Option<String>,
    /// Entry status.
    pub status: ProducerStatus,
    /// Creation time (unix millis).
    pub created_at_ms: i64,
    /// Last update time (unix millis).
    pub updated_at_ms: i64,
}

/// Validated allow-list entry to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProducer {
    /// Normalized producer account.
    pub producer_account: String,
    /// Producer instance identifier.
    pub instance_id: InstanceId,
    /// Free-form description.
    pub description: Option<String>,
}

/// Validated replacement values for an allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerUpdate {
    /// Normalized producer account.
    pub producer_account: String,
    /// Producer instance identifier.
    pub instance_id: InstanceId,
    /// Free-form description.
    pub description: Option<String>,
    /// Entry status.
    pub status: ProducerStatus,
}

// ============================================================================
// SECTION: Drafts
// ============================================================================

/// Unvalidated allow-list input as received from an operator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerDraft {
    /// Entry identifier echoed on updates.
    #[serde(default)]
    pub producer_id: Option<i64>,
    /// Producer account.
    #[serde(default)]
    pub producer_account: Option<String>,
    /// Instance identifier text.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Requested status on updates.
    #[serde(default)]
    pub status: Option<ProducerStatus>,
}

impl ProducerDraft {
    /// Validates the draft as a new entry.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint.
    pub fn into_new(self) -> Result<NewProducer, Vec<FieldViolation>> {
        let mut violations = Vec::new();
        let (account, instance_id, description) = self.validate_common(&mut violations);
        match (account, instance_id) {
            (Some(producer_account), Some(instance_id)) if violations.is_empty() => Ok(NewProducer {
                producer_account,
                instance_id,
                description,
            }),
            _ => Err(violations),
        }
    }

    /// Validates the draft as a replacement for entry `producer_id`.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint, including an identifier mismatch.
    pub fn into_update(self, producer_id: i64) -> Result<ProducerUpdate, Vec<FieldViolation>> {
        let mut violations = Vec::new();
        match self.producer_id {
            Some(value) if value == producer_id => {}
            Some(_) => violations
                .push(FieldViolation::invalid_value("producerId", "does not match the path id")),
            None => violations.push(FieldViolation::missing("producerId")),
        }
        let status = self.status;
        let (account, instance_id, description) = self.validate_common(&mut violations);
        match (account, instance_id) {
            (Some(producer_account), Some(instance_id)) if violations.is_empty() => {
                Ok(ProducerUpdate {
                    producer_account,
                    instance_id,
                    description,
                    status: status.unwrap_or(ProducerStatus::Active),
                })
            }
            _ => Err(violations),
        }
    }

    /// Validates fields shared by creation and update.
    fn validate_common(
        self,
        violations: &mut Vec<FieldViolation>,
    ) -> (Option<String>, Option<InstanceId>, Option<String>) {
        let account = match self.producer_account.as_deref().map(normalize_account) {
            None => {
                violations.push(FieldViolation::missing("producerAccount"));
                None
            }
            Some(value) if value.is_empty() => {
                violations.push(FieldViolation::missing("producerAccount"));
                None
            }
            Some(value) if value.chars().count() > MAX_PRODUCER_ACCOUNT_LENGTH => {
                violations
                    .push(FieldViolation::too_long("producerAccount", MAX_PRODUCER_ACCOUNT_LENGTH));
                None
            }
            Some(value) => Some(value),
        };
        let instance_id = match self.instance_id.as_deref() {
            None => {
                violations.push(FieldViolation::missing("instanceId"));
                None
            }
            Some(value) => match InstanceId::parse(value) {
                Ok(id) => Some(id),
                Err(detail) => {
                    violations.push(FieldViolation::invalid_value("instanceId", detail));
                    None
                }
            },
        };
        let description = self.description.filter(|value| !value.trim().is_empty());
        if let Some(value) = &description {
            if value.chars().count() > MAX_PRODUCER_DESCRIPTION_LENGTH {
                violations
                    .push(FieldViolation::too_long("description", MAX_PRODUCER_DESCRIPTION_LENGTH));
            }
        }
        (account, instance_id, description)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
