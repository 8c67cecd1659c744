// crates/certsync-core/src/core/violation.rs
// ============================================================================
// Module: Field Violations
// Description: Structured description of a single violated input constraint.
// Purpose: Let validators report every problem in one response.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Validators collect [`FieldViolation`] values instead of returning on the
//! first failure, so a caller can fix every problem in one round trip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Violations
// ============================================================================

/// Problem detected on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ViolationProblem {
    /// Required field absent, null, or blank.
    Missing,
    /// Value longer than the allowed maximum.
    TooLong {
        /// Maximum length in characters.
        #[serde(rename = "maxLength")]
        max_length: usize,
    },
    /// Value had the wrong JSON type.
    InvalidType {
        /// Expected type description.
        expected: String,
    },
    /// Value had the right type but an unacceptable content.
    InvalidValue {
        /// Human-readable detail.
        detail: String,
    },
    /// List exceeded the allowed number of items.
    TooMany {
        /// Maximum number of items.
        #[serde(rename = "maxItems")]
        max_items: usize,
    },
}

/// A violated constraint on a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Field path (for example `serialNumber` or `sans[1].Value`).
    pub field: String,
    /// Problem detected.
    #[serde(flatten)]
    pub problem: ViolationProblem,
}

impl FieldViolation {
    /// Builds a missing-field violation.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: ViolationProblem::Missing,
        }
    }

    /// Builds a too-long violation.
    #[must_use]
    pub fn too_long(field: impl Into<String>, max_length: usize) -> Self {
        Self {
            field: field.into(),
            problem: ViolationProblem::TooLong {
                max_length,
            },
        }
    }

    /// Builds an invalid-type violation.
    #[must_use]
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        Self {
            field: field.into(),
            problem: ViolationProblem::InvalidType {
                expected: expected.to_string(),
            },
        }
    }

    /// Builds an invalid-value violation.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: ViolationProblem::InvalidValue {
                detail: detail.into(),
            },
        }
    }

    /// Builds a too-many-items violation.
    #[must_use]
    pub fn too_many(field: impl Into<String>, max_items: usize) -> Self {
        Self {
            field: field.into(),
            problem: ViolationProblem::TooMany {
                max_items,
            },
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            ViolationProblem::Missing => write!(f, "{}: missing", self.field),
            ViolationProblem::TooLong {
                max_length,
            } => write!(f, "{}: longer than {max_length}", self.field),
            ViolationProblem::InvalidType {
                expected,
            } => write!(f, "{}: expected {expected}", self.field),
            ViolationProblem::InvalidValue {
                detail,
            } => write!(f, "{}: {detail}", self.field),
            ViolationProblem::TooMany {
                max_items,
            } => write!(f, "{}: more than {max_items} items", self.field),
        }
    }
}
