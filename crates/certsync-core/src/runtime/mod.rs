// crates/certsync-core/src/runtime/mod.rs
// ============================================================================
// Module: Certsync Runtime Logic
// Description: Ingestion validation, reconciliation, and deduplication.
// Purpose: Hold the pure decision logic shared by registry backends.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Runtime modules turn untrusted payloads into typed submissions and decide
//! how each submission changes the registry. None of them perform I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dedup;
pub mod ingest;
pub mod reconcile;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dedup::SanKey;
pub use dedup::plan_san_inserts;
pub use dedup::prepare_attributes;
pub use dedup::san_key;
pub use ingest::IngestRejection;
pub use ingest::RejectionKind;
pub use ingest::declared_text;
pub use ingest::parse_document;
pub use ingest::parse_submission;
pub use ingest::parse_submission_bytes;
pub use reconcile::DispositionChange;
pub use reconcile::FieldUpdate;
pub use reconcile::UpsertPlan;
pub use reconcile::plan_upsert;
