// crates/certsync-exit/src/lib.rs
// ============================================================================
// Module: Certsync Exit Library
// Description: Producer pipeline hosted next to the issuing authority.
// Purpose: Expose extraction, payload building, delivery, and buffering.
// Dependencies: certsync-config, certsync-core, reqwest, x509-parser
// ============================================================================

//! ## Overview
//! The exit pipeline receives one property bag per certificate lifecycle
//! notification and either delivers the resulting payload to the registry or
//! preserves it in a local buffer directory. It never retries on its own;
//! buffered payloads are redelivered by operator tooling.
//! Security posture: authority properties and registry responses are
//! untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod buffer;
pub mod builder;
pub mod delivery;
pub mod extractor;
pub mod module;
pub mod properties;
pub mod template;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::ExitAuditEvent;
pub use audit::ExitAuditSink;
pub use audit::ExitOutcome;
pub use audit::FileExitAuditSink;
pub use audit::NoopExitAuditSink;
pub use audit::StderrExitAuditSink;
pub use buffer::BufferEntry;
pub use buffer::BufferError;
pub use buffer::BufferFailure;
pub use buffer::BufferReceipt;
pub use buffer::BufferStore;
pub use buffer::BufferedPayload;
pub use buffer::FailureKind;
pub use builder::ValidationError;
pub use builder::build_payload;
pub use builder::validate_for_delivery;
pub use delivery::DeliveryReceipt;
pub use delivery::HttpTransport;
pub use delivery::Transport;
pub use delivery::TransportError;
pub use extractor::EventExtractor;
pub use extractor::ExtractionError;
pub use extractor::parse_sans;
pub use module::ConfiguredResolver;
pub use module::DeliveryReport;
pub use module::ExitError;
pub use module::ExitModule;
pub use properties::PropertyBag;
pub use properties::PropertyValue;
pub use template::CachedTemplateResolver;
pub use template::StaticTemplateResolver;
