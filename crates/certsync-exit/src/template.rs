// crates/certsync-exit/src/template.rs
// ============================================================================
// Module: Template Name Resolution
// Description: Memoized template OID to display-name lookups.
// Purpose: Resolve template names once per OID for the process lifetime.
// Dependencies: certsync-core
// ============================================================================

//! ## Overview
//! The naming service behind [`TemplateNameResolver`] may be slow or briefly
//! unreachable. [`CachedTemplateResolver`] remembers successful lookups by OID
//! and never caches failures, so a transient outage does not pin the fallback
//! name for the rest of the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use certsync_core::TemplateLookupError;
use certsync_core::TemplateNameResolver;

// ============================================================================
// SECTION: Static Resolver
// ============================================================================

/// Resolver backed by a fixed OID table from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateResolver {
    /// Template display names keyed by OID.
    names: BTreeMap<String, String>,
}

impl StaticTemplateResolver {
    /// Creates a resolver from an OID table.
    #[must_use]
    pub fn new(names: BTreeMap<String, String>) -> Self {
        let names = names
            .into_iter()
            .map(|(oid, name)| (oid.trim().to_string(), name.trim().to_string()))
            .collect();
        Self {
            names,
        }
    }
}

impl TemplateNameResolver for StaticTemplateResolver {
    fn resolve_template_name(&self, oid: &str) -> Result<String, TemplateLookupError> {
        self.names
            .get(oid.trim())
            .cloned()
            .ok_or_else(|| TemplateLookupError::NotFound(oid.trim().to_string()))
    }
}

// ============================================================================
// SECTION: Cached Resolver
// ============================================================================

/// Memoizing wrapper around a template resolver.
///
/// # Invariants
/// - Only successful lookups are cached.
pub struct CachedTemplateResolver<R> {
    /// Underlying naming service.
    inner: R,
    /// Successful lookups keyed by OID.
    cache: Mutex<BTreeMap<String, String>>,
}

impl<R: TemplateNameResolver> CachedTemplateResolver<R> {
    /// Wraps a resolver with an empty cache.
    #[must_use]
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the number of cached OIDs.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }
}

impl<R: TemplateNameResolver> TemplateNameResolver for CachedTemplateResolver<R> {
    fn resolve_template_name(&self, oid: &str) -> Result<String, TemplateLookupError> {
        let key = oid.trim();
        if let Ok(cache) = self.cache.lock()
            && let Some(name) = cache.get(key)
        {
            return Ok(name.clone());
        }
        let name = self.inner.resolve_template_name(key)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.to_string(), name.clone());
        }
        Ok(name)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
