// crates/certsync-config/src/config.rs
// ============================================================================
// Module: Certsync Configuration
// Description: Configuration loading and validation for certsync.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: certsync-core, certsync-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded once at startup from a TOML file with strict size
//! and path limits, then handed to the producer pipeline and the server as an
//! explicit value. Sections are optional; commands that need a section ask for
//! it through the `require_*` accessors.
//! Security posture: config inputs are untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use certsync_core::InstanceId;
use certsync_core::core::producer::normalize_account;
use certsync_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "certsync.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CERTSYNC_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of the authority identifier.
pub(crate) const MAX_CA_ID_LENGTH: usize = 50;
/// Maximum length of the issuer display name.
pub(crate) const MAX_ISSUER_NAME_LENGTH: usize = 512;
/// Maximum number of server auth tokens per surface.
pub(crate) const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of a server auth token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Minimum delivery request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum delivery request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Minimum delivery connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum delivery connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Maximum accepted request body size in bytes.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum expiring-certificate horizon in days.
pub const MAX_EXPIRING_HORIZON_DAYS: u32 = 3650;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Certsync configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertsyncConfig {
    /// Producer pipeline configuration.
    #[serde(default)]
    pub exit: Option<ExitConfig>,
    /// Registry server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Registry store configuration.
    #[serde(default)]
    pub store: Option<SqliteStoreConfig>,
}

impl CertsyncConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if let Some(exit) = &mut self.exit {
            exit.validate()?;
        }
        self.server.validate()?;
        if let Some(store) = &self.store {
            store.validate().map_err(|err| ConfigError::Invalid(format!("store: {err}")))?;
        }
        Ok(())
    }

    /// Returns the producer section or an error naming it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `[exit]` is absent.
    pub fn require_exit(&self) -> Result<&ExitConfig, ConfigError> {
        self.exit.as_ref().ok_or_else(|| ConfigError::Invalid("missing [exit] section".to_string()))
    }

    /// Returns the store section or an error naming it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `[store]` is absent.
    pub fn require_store(&self) -> Result<&SqliteStoreConfig, ConfigError> {
        self.store
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [store] section".to_string()))
    }
}

// ============================================================================
// SECTION: Producer Configuration
// ============================================================================

/// Producer pipeline configuration, resolved once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitConfig {
    /// Issuing authority identifier (normalized to upper case).
    pub ca_id: String,
    /// Issuing authority display name.
    pub issuer_name: String,
    /// Registry ingestion endpoint.
    pub api_url: String,
    /// Producer instance GUID sent with every delivery.
    pub instance_id: String,
    /// Directory for buffered payloads.
    pub buffer_dir: PathBuf,
    /// Optional directory for the JSON-lines diagnostic log.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Total delivery timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Template name used when no display name can be resolved.
    #[serde(default = "default_fallback_template_name")]
    pub fallback_template_name: String,
    /// Bearer credential source.
    pub credential: CredentialConfig,
    /// Template OID to display-name table.
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
}

impl ExitConfig {
    /// Validates and normalizes the producer section.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.ca_id = normalize_account(&self.ca_id);
        validate_text("exit.ca_id", &self.ca_id, MAX_CA_ID_LENGTH)?;
        validate_text("exit.issuer_name", &self.issuer_name, MAX_ISSUER_NAME_LENGTH)?;
        self.endpoint()?;
        self.instance()?;
        validate_path_string("exit.buffer_dir", &self.buffer_dir.to_string_lossy())?;
        if let Some(log_dir) = &self.log_dir {
            validate_path_string("exit.log_dir", &log_dir.to_string_lossy())?;
        }
        validate_timeout_range(
            "exit.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "exit.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        if self.fallback_template_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "exit.fallback_template_name must be non-empty".to_string(),
            ));
        }
        for (oid, name) in &self.templates {
            if oid.trim().is_empty() || name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "exit.templates entries must be non-empty".to_string(),
                ));
            }
        }
        self.credential.validate()
    }

    /// Returns the parsed ingestion endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is malformed or not HTTP(S).
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.api_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("exit.api_url invalid: {err}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => {
                Err(ConfigError::Invalid(format!("exit.api_url scheme not supported: {scheme}")))
            }
        }
    }

    /// Returns the parsed producer instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value is not a GUID.
    pub fn instance(&self) -> Result<InstanceId, ConfigError> {
        InstanceId::parse(&self.instance_id)
            .map_err(|err| ConfigError::Invalid(format!("exit.instance_id: {err}")))
    }

    /// Returns the delivery request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the delivery connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Source of the producer bearer credential.
///
/// # Invariants
/// - Exactly one of `token` or `token_env` is set.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    /// Inline bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .finish()
    }
}

impl CredentialConfig {
    /// Validates that exactly one source is configured.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.token, &self.token_env) {
            (Some(token), None) => validate_text("exit.credential.token", token, usize::MAX),
            (None, Some(name)) => validate_text("exit.credential.token_env", name, 256),
            _ => Err(ConfigError::Invalid(
                "exit.credential requires exactly one of token or token_env".to_string(),
            )),
        }
    }

    /// Resolves the bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the referenced variable is unset
    /// or empty.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        self.validate()?;
        if let Some(token) = &self.token {
            return Ok(token.trim().to_string());
        }
        let name = self.token_env.as_deref().unwrap_or_default().trim();
        let value = env::var(name).map_err(|_| {
            ConfigError::Invalid(format!("credential environment variable {name} is not set"))
        })?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "credential environment variable {name} is empty"
            )));
        }
        Ok(value.to_string())
    }
}

// ============================================================================
// SECTION: Server Configuration
// ============================================================================

/// Registry server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Default horizon for the expiring-certificates read, in days.
    #[serde(default = "default_expiring_horizon_days")]
    pub expiring_horizon_days: u32,
    /// Bearer token configuration.
    #[serde(default)]
    pub auth: ServerAuthConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            expiring_horizon_days: default_expiring_horizon_days(),
            auth: ServerAuthConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.expiring_horizon_days == 0
            || self.expiring_horizon_days > MAX_EXPIRING_HORIZON_DAYS
        {
            return Err(ConfigError::Invalid(format!(
                "server.expiring_horizon_days must be between 1 and {MAX_EXPIRING_HORIZON_DAYS}"
            )));
        }
        self.auth.validate()?;
        self.audit.validate()?;
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback()
            && (self.auth.ingest_tokens.is_empty() || self.auth.admin_tokens.is_empty())
        {
            return Err(ConfigError::Invalid(
                "non-loopback bind requires ingest_tokens and admin_tokens".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }
}

/// Bearer tokens guarding the server surfaces.
///
/// # Invariants
/// - An empty list leaves that surface open; only allowed on loopback binds.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuthConfig {
    /// Tokens accepted on ingestion and read routes.
    #[serde(default)]
    pub ingest_tokens: Vec<String>,
    /// Tokens accepted on allow-list management routes.
    #[serde(default)]
    pub admin_tokens: Vec<String>,
}

impl fmt::Debug for ServerAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerAuthConfig")
            .field("ingest_tokens", &self.ingest_tokens.len())
            .field("admin_tokens", &self.admin_tokens.len())
            .finish()
    }
}

impl ServerAuthConfig {
    /// Validates token list limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_tokens("server.auth.ingest_tokens", &self.ingest_tokens)?;
        validate_tokens("server.auth.admin_tokens", &self.admin_tokens)
    }
}

/// Audit logging configuration for server requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines).
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a required text value against a character limit.
fn validate_text(field: &str, value: &str, max_chars: usize) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.chars().count() > max_chars {
        return Err(ConfigError::Invalid(format!("{field} exceeds {max_chars} characters")));
    }
    Ok(())
}

/// Validates a bearer token list.
fn validate_tokens(field: &str, tokens: &[String]) -> Result<(), ConfigError> {
    if tokens.len() > MAX_AUTH_TOKENS {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_AUTH_TOKENS} entries")));
    }
    for token in tokens {
        if token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
        }
        if token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{field} entries exceed {MAX_AUTH_TOKEN_LENGTH} bytes"
            )));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default expiring-certificate horizon in days.
pub(crate) const fn default_expiring_horizon_days() -> u32 {
    30
}

/// Default audit logging enabled.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default delivery request timeout in milliseconds.
pub(crate) const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Default delivery connect timeout in milliseconds.
pub(crate) const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Default template name when resolution fails.
fn default_fallback_template_name() -> String {
    "UnknownTemplate".to_string()
}
