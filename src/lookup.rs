//! Read-only lookup collaborators: frequency statistics, schema property
//! types, reverse geocoding.
//!
//! These services live outside the crate; only their interface boundary is
//! defined here. The statistics cache is process-wide and never invalidated
//! within a run's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::AttrValue;
use crate::{Error, Result};

// ============================================================================
// Frequency statistics
// ============================================================================

/// One observed (value, occurrence count) bucket for an attribute.
pub type StatsBucket = (AttrValue, u64);

/// Frequency-statistics lookup keyed by attribute name.
///
/// Implementations typically front a remote stats endpoint; `TableStats`
/// below is the in-memory variant used for embedding and tests.
pub trait StatsSource {
    /// Value/count buckets observed for the attribute, or an error if the
    /// service is unreachable. An attribute with no observations returns an
    /// empty vector, not an error.
    fn property_counts(&self, attribute: &str) -> Result<Vec<StatsBucket>>;
}

/// Caching wrapper around a [`StatsSource`].
///
/// Every miss goes through one explicit `fetch_or_load`; errors surface on
/// the typed channel and are NOT cached, so a flaky source can recover.
pub struct StatsCache<S> {
    source: S,
    cache: RwLock<HashMap<String, Arc<Vec<StatsBucket>>>>,
}

impl<S: StatsSource> StatsCache<S> {
    pub fn new(source: S) -> Self {
        Self { source, cache: RwLock::new(HashMap::new()) }
    }

    /// Cached buckets for the attribute, fetching from the source on miss.
    pub fn fetch_or_load(&self, attribute: &str) -> Result<Arc<Vec<StatsBucket>>> {
        if let Some(hit) = self.cache.read().get(attribute) {
            return Ok(Arc::clone(hit));
        }
        let buckets = Arc::new(self.source.property_counts(attribute)?);
        self.cache
            .write()
            .insert(attribute.to_owned(), Arc::clone(&buckets));
        Ok(buckets)
    }
}

/// In-memory statistics table.
pub struct TableStats {
    counts: HashMap<String, Vec<StatsBucket>>,
}

impl TableStats {
    pub fn new() -> Self {
        Self { counts: HashMap::new() }
    }

    pub fn insert(&mut self, attribute: impl Into<String>, buckets: Vec<StatsBucket>) {
        self.counts.insert(attribute.into(), buckets);
    }
}

impl Default for TableStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for TableStats {
    fn property_counts(&self, attribute: &str) -> Result<Vec<StatsBucket>> {
        Ok(self.counts.get(attribute).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Schema property types
// ============================================================================

/// Maps attribute name → owning entity type, extracted from a
/// JSON-LD-shaped schema document.
pub struct PropertyTypeRegistry {
    types: HashMap<String, String>,
    namespace: String,
}

impl PropertyTypeRegistry {
    pub fn from_map(types: HashMap<String, String>) -> Self {
        Self { types, namespace: String::new() }
    }

    /// Extract `@id` → `domainIncludes` pairs from a schema `@graph`,
    /// stripping the namespace prefix from both sides. Entries without a
    /// `rangeIncludes` are classes, not properties, and are skipped.
    pub fn from_schema(schema: &serde_json::Value, namespace: &str) -> Result<Self> {
        let graph = schema
            .get("@graph")
            .and_then(|g| g.as_array())
            .ok_or_else(|| Error::MalformedTemplate("schema document missing @graph".into()))?;

        let mut types = HashMap::new();
        for entry in graph {
            if entry.get(format!("{namespace}rangeIncludes")).is_none() {
                continue;
            }
            let id = entry.get("@id").and_then(|v| v.as_str());
            let domain = entry
                .get(format!("{namespace}domainIncludes"))
                .and_then(|d| d.get("@id"))
                .and_then(|v| v.as_str());
            if let (Some(id), Some(domain)) = (id, domain) {
                types.insert(
                    id.replace(namespace, ""),
                    domain.replace(namespace, ""),
                );
            }
        }
        Ok(Self { types, namespace: namespace.to_owned() })
    }

    pub fn owner_type(&self, attribute: &str) -> Option<&str> {
        self.types.get(attribute).map(String::as_str)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

// ============================================================================
// Reverse geocoding
// ============================================================================

/// Address component fields returned by a reverse geocode lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressFields {
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub road: Option<String>,
    pub house_number: Option<String>,
}

/// Reverse lookup keyed by (lat, lon).
///
/// Consumed by the fake-address collaborator, which is out of scope here;
/// the boundary is kept so alternative generators can be plugged in.
pub trait GeocodeLookup {
    fn reverse(&self, lat: f64, lon: f64) -> Result<AddressFields>;
}
