// crates/certsync-server/src/lib.rs
// ============================================================================
// Module: Certsync Server Library
// Description: HTTP surfaces of the central certificate registry.
// Purpose: Accept producer deliveries and serve registry reads and management.
// Dependencies: axum, certsync-core, certsync-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! The registry server accepts certificate payloads from allow-listed
//! producers, reconciles them through the upsert engine, lists certificates
//! nearing expiry, and manages the producer allow-list. Route logic lives in
//! [`service`]; [`server`] only adapts it to HTTP.
//!
//! Security posture: all requests are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod server;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileIngestAuditSink;
pub use audit::IngestAuditEvent;
pub use audit::IngestAuditSink;
pub use audit::IngestOutcome;
pub use audit::NoopIngestAuditSink;
pub use audit::StderrIngestAuditSink;
pub use auth::AuthError;
pub use auth::TokenSet;
pub use server::RegistryServer;
pub use server::ServerError;
pub use server::build_router;
pub use service::ApiResponse;
pub use service::IngestionService;
pub use service::IngestionServiceParams;
pub use service::SubmitRequest;
