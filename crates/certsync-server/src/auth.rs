// crates/certsync-server/src/auth.rs
// ============================================================================
// Module: Registry Authentication
// Description: Bearer token checks for the ingestion and management surfaces.
// Purpose: Fail closed on missing, malformed, or unknown credentials.
// Dependencies: subtle, thiserror
// ============================================================================

//! ## Overview
//! Each surface carries its own [`TokenSet`]. A set built from an empty token
//! list leaves its surface open; configuration only permits that on loopback
//! binds. Tokens are compared in constant time against every configured
//! entry.
//!
//! Security posture: authorization headers are untrusted input; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing or invalid credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Token Sets
// ============================================================================

/// Bearer tokens accepted on one surface.
#[derive(Clone, Default)]
pub struct TokenSet {
    /// Accepted tokens.
    tokens: Vec<String>,
}

impl TokenSet {
    /// Builds a token set from configuration.
    #[must_use]
    pub fn new(tokens: &[String]) -> Self {
        Self {
            tokens: tokens.to_vec(),
        }
    }

    /// Returns true when the surface requires no credentials.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Checks an `Authorization` header against the set.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the header is missing,
    /// malformed, oversized, or carries an unknown token.
    pub fn authorize(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        if self.is_open() {
            return Ok(());
        }
        let token = parse_bearer_token(auth_header)?;
        let matched = self
            .tokens
            .iter()
            .fold(false, |found, candidate| found | constant_time_eq_str(candidate, &token));
        if matched {
            Ok(())
        } else {
            Err(AuthError::Unauthenticated("invalid bearer token".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer` authorization header.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the header is absent, too
/// large, uses another scheme, or carries an empty token.
pub fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
