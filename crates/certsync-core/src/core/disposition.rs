// crates/certsync-core/src/core/disposition.rs
// ============================================================================
// Module: Certificate Dispositions
// Description: Closed disposition code set and certificate event kinds.
// Purpose: Normalize numeric and symbolic dispositions to a single code.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Dispositions identify the lifecycle state of a certificate request and act
//! as the dispatch key for reconciliation. Only codes from the closed set
//! {8, 9, 12, 15, 16, 17, 20, 21, 30, 31} can be represented.
//!
//! Invariants:
//! - A [`DispositionCode`] always holds a member of the closed set.
//! - Symbolic names are matched case-insensitively; unknown names fail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Every disposition code accepted by the registry.
pub const VALID_DISPOSITIONS: [i64; 10] = [8, 9, 12, 15, 16, 17, 20, 21, 30, 31];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when normalizing dispositions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispositionError {
    /// Numeric code outside the closed set.
    #[error("disposition {0} is outside the accepted set")]
    OutOfRange(i64),
    /// Symbolic name with no mapping.
    #[error("disposition name '{0}' has no mapping")]
    Unmapped(String),
}

// ============================================================================
// SECTION: Disposition Code
// ============================================================================

/// Validated certificate disposition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DispositionCode(i64);

impl DispositionCode {
    /// Request denied.
    pub const DENIED: Self = Self(9);
    /// Request pending.
    pub const PENDING: Self = Self(15);
    /// Certificate issued.
    pub const ISSUED: Self = Self(20);
    /// Certificate revoked.
    pub const REVOKED: Self = Self(21);
    /// Certificate renewed; only the validity end changes.
    pub const RENEWAL: Self = Self(30);
    /// Key recovery material updated.
    pub const KEY_RECOVERY: Self = Self(31);

    /// Builds a disposition from a numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`DispositionError::OutOfRange`] when the code is not in the
    /// closed set.
    pub fn new(code: i64) -> Result<Self, DispositionError> {
        if VALID_DISPOSITIONS.contains(&code) {
            Ok(Self(code))
        } else {
            Err(DispositionError::OutOfRange(code))
        }
    }

    /// Maps a symbolic disposition name (or a numeric string) to a code.
    ///
    /// # Errors
    ///
    /// Returns [`DispositionError`] when the name is unknown or the numeric
    /// value is outside the closed set.
    pub fn from_symbol(symbol: &str) -> Result<Self, DispositionError> {
        let trimmed = symbol.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::new(code);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "issued" | "unrevoked" | "imported" => Ok(Self::ISSUED),
            "revoked" => Ok(Self::REVOKED),
            "denied" => Ok(Self::DENIED),
            "pending" => Ok(Self::PENDING),
            _ => Err(DispositionError::Unmapped(trimmed.to_string())),
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        self.0
    }

    /// Returns true when the disposition marks a revoked certificate.
    #[must_use]
    pub const fn is_revoked(self) -> bool {
        self.0 == Self::REVOKED.0
    }
}

impl TryFrom<i64> for DispositionCode {
    type Error = DispositionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DispositionCode> for i64 {
    fn from(value: DispositionCode) -> Self {
        value.0
    }
}

impl fmt::Display for DispositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SECTION: Event Kind
// ============================================================================

/// Certificate lifecycle notification kinds raised by the issuing authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// New certificate issued.
    Issued,
    /// Revocation lifted.
    Unrevoked,
    /// Certificate imported into the authority database.
    Imported,
    /// Certificate revoked.
    Revoked,
    /// Request left pending.
    Pending,
    /// Request denied.
    Denied,
}

impl EventKind {
    /// All event kinds in declaration order.
    pub const ALL: [Self; 6] =
        [Self::Issued, Self::Unrevoked, Self::Imported, Self::Revoked, Self::Pending, Self::Denied];

    /// Returns the stable lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Unrevoked => "unrevoked",
            Self::Imported => "imported",
            Self::Revoked => "revoked",
            Self::Pending => "pending",
            Self::Denied => "denied",
        }
    }

    /// Returns true when the event kind must carry revocation details.
    #[must_use]
    pub const fn requires_revocation(self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown event kind: {value}"))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::DispositionCode;
    use super::DispositionError;
    use super::EventKind;

    #[test]
    fn symbols_map_to_codes() {
        assert_eq!(DispositionCode::from_symbol("Issued").unwrap(), DispositionCode::ISSUED);
        assert_eq!(DispositionCode::from_symbol("unrevoked").unwrap(), DispositionCode::ISSUED);
        assert_eq!(DispositionCode::from_symbol("IMPORTED").unwrap(), DispositionCode::ISSUED);
        assert_eq!(DispositionCode::from_symbol("Revoked").unwrap(), DispositionCode::REVOKED);
        assert_eq!(DispositionCode::from_symbol("Denied").unwrap().code(), 9);
        assert_eq!(DispositionCode::from_symbol("Pending").unwrap().code(), 15);
        assert_eq!(DispositionCode::from_symbol(" 30 ").unwrap(), DispositionCode::RENEWAL);
    }

    #[test]
    fn unknown_symbols_and_codes_fail() {
        assert_eq!(
            DispositionCode::from_symbol("Archived"),
            Err(DispositionError::Unmapped("Archived".to_string()))
        );
        assert_eq!(DispositionCode::new(22), Err(DispositionError::OutOfRange(22)));
        assert_eq!(DispositionCode::from_symbol("7"), Err(DispositionError::OutOfRange(7)));
    }

    #[test]
    fn event_kind_parses_labels() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("Renewed".parse::<EventKind>().is_err());
        assert!(EventKind::Revoked.requires_revocation());
        assert!(!EventKind::Unrevoked.requires_revocation());
    }
}
