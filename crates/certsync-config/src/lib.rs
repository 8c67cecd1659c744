// crates/certsync-config/src/lib.rs
// ============================================================================
// Module: Certsync Config Library
// Description: Public API surface for certsync configuration.
// Purpose: Expose the config model, loader, and validation errors.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration for the producer pipeline (`[exit]`), the registry server
//! (`[server]`), and the registry store (`[store]`), loaded from one TOML
//! file and validated fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::CertsyncConfig;
pub use config::ConfigError;
pub use config::CredentialConfig;
pub use config::ExitConfig;
pub use config::MAX_EXPIRING_HORIZON_DAYS;
pub use config::ServerAuditConfig;
pub use config::ServerAuthConfig;
pub use config::ServerConfig;
