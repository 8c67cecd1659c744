// crates/certsync-store-sqlite/src/lib.rs
// ============================================================================
// Module: Certsync SQLite Registry
// Description: Durable certificate registry backend using SQLite WAL.
// Purpose: Persist certificate records, SANs, attributes, and the allow-list.
// Dependencies: certsync-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteRegistry`], which implements both
//! [`certsync_core::CertificateRegistry`] and
//! [`certsync_core::ProducerRegistry`]. Certificate submissions are
//! reconciled by the core upsert engine and persisted field-by-field inside a
//! single immediate transaction. Security posture: storage inputs are
//! untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod certificates;
pub mod producers;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SCHEMA_VERSION;
pub use store::SqliteRegistry;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
