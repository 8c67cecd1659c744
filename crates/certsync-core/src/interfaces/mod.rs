// crates/certsync-core/src/interfaces/mod.rs
// ============================================================================
// Module: Certsync Interfaces
// Description: Backend-agnostic contracts for registries and name resolution.
// Purpose: Define the seams between pipeline logic and external systems.
// Dependencies: crate::core, thiserror, time
// ============================================================================

//! ## Overview
//! Interfaces decouple the pipeline from concrete storage and directory
//! services. Registry implementations must serialize state transitions per
//! certificate and fail closed on storage errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::producer::InstanceId;
use crate::core::producer::NewProducer;
use crate::core::producer::ProducerEntry;
use crate::core::producer::ProducerUpdate;
use crate::core::record::CertificateDetail;
use crate::core::record::CertificateSubmission;
use crate::core::record::CertificateSummary;
use crate::core::record::SubmitOutcome;

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Registry persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Registry I/O error.
    #[error("registry io error: {0}")]
    Io(String),
    /// Storage engine error.
    #[error("registry storage error: {0}")]
    Store(String),
    /// Stored data failed integrity checks.
    #[error("registry corruption: {0}")]
    Corrupt(String),
    /// Schema version mismatch.
    #[error("registry version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid data supplied to the registry.
    #[error("registry invalid data: {0}")]
    Invalid(String),
    /// Uniqueness constraint violated.
    #[error("registry conflict: {0}")]
    Conflict(String),
    /// Requested entity does not exist.
    #[error("registry entry not found: {0}")]
    NotFound(String),
}

// ============================================================================
// SECTION: Certificate Registry
// ============================================================================

/// Authoritative certificate store.
pub trait CertificateRegistry: Send + Sync {
    /// Reconciles a validated submission against the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persistence fails. Duplicate
    /// dispositions are reported as [`SubmitOutcome::Conflict`], not errors.
    fn submit(&self, submission: &CertificateSubmission) -> Result<SubmitOutcome, RegistryError>;

    /// Lists issued certificates whose validity ends before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the query fails.
    fn expiring_before(
        &self,
        cutoff: OffsetDateTime,
    ) -> Result<Vec<CertificateSummary>, RegistryError>;

    /// Loads one certificate with its SANs and attributes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the query fails.
    fn certificate(
        &self,
        ca_id: &str,
        serial_number: &str,
    ) -> Result<Option<CertificateDetail>, RegistryError>;
}

// ============================================================================
// SECTION: Producer Registry
// ============================================================================

/// Producer allow-list store with soft delete.
pub trait ProducerRegistry: Send + Sync {
    /// Lists every entry, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the query fails.
    fn list_producers(&self) -> Result<Vec<ProducerEntry>, RegistryError>;

    /// Loads one entry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the query fails.
    fn producer(&self, producer_id: i64) -> Result<Option<ProducerEntry>, RegistryError>;

    /// Creates an active entry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] when the account or instance is
    /// already registered.
    fn create_producer(&self, producer: &NewProducer) -> Result<ProducerEntry, RegistryError>;

    /// Replaces an entry's values.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] or [`RegistryError::Conflict`].
    fn update_producer(
        &self,
        producer_id: i64,
        update: &ProducerUpdate,
    ) -> Result<ProducerEntry, RegistryError>;

    /// Marks an entry inactive without deleting it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the entry does not exist.
    fn deactivate_producer(&self, producer_id: i64) -> Result<ProducerEntry, RegistryError>;

    /// Returns true when an active entry matches both account and instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the query fails.
    fn is_authorized(&self, account: &str, instance_id: &InstanceId) -> Result<bool, RegistryError>;
}

/// Shared handle to a registry implementing both stores.
pub type SharedRegistry = Arc<dyn Registry>;

/// Combined certificate and producer registry.
pub trait Registry: CertificateRegistry + ProducerRegistry {}

impl<T: CertificateRegistry + ProducerRegistry> Registry for T {}

// ============================================================================
// SECTION: Template Names
// ============================================================================

/// Template name lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateLookupError {
    /// No template is registered under the OID.
    #[error("template not found: {0}")]
    NotFound(String),
    /// The naming service could not be reached.
    #[error("template lookup unavailable: {0}")]
    Unavailable(String),
}

/// Resolves template OIDs to display names.
pub trait TemplateNameResolver: Send + Sync {
    /// Returns the display name registered for `oid`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateLookupError`] when no name is available.
    fn resolve_template_name(&self, oid: &str) -> Result<String, TemplateLookupError>;
}
