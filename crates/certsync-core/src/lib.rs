// crates/certsync-core/src/lib.rs
// ============================================================================
// Module: Certsync Core Library
// Description: Public API surface for the certsync core.
// Purpose: Expose domain types, interfaces, and reconciliation logic.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Certsync core models certificate lifecycle events travelling from an
//! issuing authority to a central registry. It owns the wire payload, the
//! ingestion validator, the disposition-driven upsert engine, and SAN
//! deduplication. It performs no I/O and integrates through the traits in
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::CertificateRegistry;
pub use interfaces::ProducerRegistry;
pub use interfaces::Registry;
pub use interfaces::RegistryError;
pub use interfaces::SharedRegistry;
pub use interfaces::TemplateLookupError;
pub use interfaces::TemplateNameResolver;
pub use runtime::DispositionChange;
pub use runtime::FieldUpdate;
pub use runtime::IngestRejection;
pub use runtime::RejectionKind;
pub use runtime::UpsertPlan;
