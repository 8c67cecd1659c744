// crates/certsync-core/src/runtime/dedup.rs
// ============================================================================
// Module: SAN and Attribute Deduplication
// Description: Filters SAN candidates and prepares subject attributes for storage.
// Purpose: Keep SAN entries unique per certificate across repeated deliveries.
// Dependencies: crate::core::hashing
// ============================================================================

//! ## Overview
//! SAN entries carry a uniqueness invariant per (record, type, value), so the
//! planner removes candidates that already exist and candidates repeated
//! inside the same payload. Subject attributes are not deduplicated; they are
//! filtered to non-empty values and paired with a content digest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::hashing::hash_str;
use crate::core::payload::SanEntry;
use crate::core::payload::SubjectAttributeEntry;
use crate::core::record::PreparedAttribute;

// ============================================================================
// SECTION: SAN Planning
// ============================================================================

/// Key identifying a stored SAN entry within one record.
pub type SanKey = (String, String);

/// Returns the (type, value) key for a SAN entry.
#[must_use]
pub fn san_key(entry: &SanEntry) -> SanKey {
    (entry.san_type.clone(), entry.value.clone())
}

/// Returns the SAN candidates that must be inserted, in input order.
///
/// # Invariants
/// - Blank candidates are dropped.
/// - Candidates whose key is in `existing` are dropped.
/// - Only the first occurrence of a key within `candidates` is kept.
#[must_use]
pub fn plan_san_inserts(existing: &BTreeSet<SanKey>, candidates: &[SanEntry]) -> Vec<SanEntry> {
    let mut seen: BTreeSet<SanKey> = BTreeSet::new();
    candidates
        .iter()
        .filter(|candidate| !candidate.is_blank())
        .filter(|candidate| {
            let key = san_key(candidate);
            !existing.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

// ============================================================================
// SECTION: Attribute Preparation
// ============================================================================

/// Filters blank attributes and attaches a digest of each value.
#[must_use]
pub fn prepare_attributes(candidates: &[SubjectAttributeEntry]) -> Vec<PreparedAttribute> {
    candidates
        .iter()
        .filter(|candidate| {
            !candidate.attribute_type.trim().is_empty()
                && !candidate.attribute_value.trim().is_empty()
        })
        .map(|candidate| PreparedAttribute {
            attribute_type: candidate.attribute_type.clone(),
            attribute_value: candidate.attribute_value.clone(),
            value_hash: hash_str(&candidate.attribute_value),
        })
        .collect()
}
