// crates/certsync-core/src/core/mod.rs
// ============================================================================
// Module: Certsync Core Types
// Description: Domain types for certificate events, payloads, and records.
// Purpose: Group the data model shared by producers and the registry.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types are plain data with validation at construction boundaries.
//! They carry no I/O and are shared by the exit module, the registry store,
//! and the ingestion server.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod disposition;
pub mod event;
pub mod hashing;
pub mod payload;
pub mod producer;
pub mod record;
pub mod violation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use disposition::DispositionCode;
pub use disposition::DispositionError;
pub use disposition::EventKind;
pub use disposition::VALID_DISPOSITIONS;
pub use event::CertificateEvent;
pub use payload::CertificateData;
pub use payload::CertificatePayload;
pub use payload::SanEntry;
pub use payload::SubjectAttributeEntry;
pub use producer::InstanceId;
pub use producer::PRODUCER_INSTANCE_HEADER;
pub use producer::NewProducer;
pub use producer::ProducerDraft;
pub use producer::ProducerEntry;
pub use producer::ProducerStatus;
pub use producer::ProducerUpdate;
pub use record::CertificateDetail;
pub use record::CertificateFields;
pub use record::CertificateSubmission;
pub use record::CertificateSummary;
pub use record::PreparedAttribute;
pub use record::SubmitOutcome;
pub use violation::FieldViolation;
pub use violation::ViolationProblem;
