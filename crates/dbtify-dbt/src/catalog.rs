//! Catalog index of dbt models and sources
//!
//! Maps a lookup key and entry kind to the Jinja reference that replaces a
//! literal table name:
//! - models are keyed by name and render as `{{ ref('<name>') }}`
//! - sources are keyed by `<source_group>.<name>` and render as
//!   `{{ source('<source_group>', '<name>') }}`
//!
//! An index is immutable once built. Refreshing the catalog builds a new one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use crate::manifest::Manifest;

/// A model definition as supplied by the catalog collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            database: None,
        }
    }
}

/// A source table definition as supplied by the catalog collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDef {
    /// dbt source name (the group the table is declared under)
    pub source_group: String,
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl SourceDef {
    pub fn new(source_group: impl Into<String>, name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            source_group: source_group.into(),
            name: name.into(),
            schema: schema.into(),
            database: None,
        }
    }

    /// Lookup key: `<source_group>.<name>`
    pub fn lookup_key(&self) -> String {
        format!("{}.{}", self.source_group, self.name)
    }
}

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Model,
    Source,
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Source => write!(f, "source"),
        }
    }
}

/// One registered entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub lookup_key: String,
    pub kind: CatalogKind,
    pub rendered_ref: String,
}

/// Render a model reference
pub fn render_ref(name: &str) -> String {
    format!("{{{{ ref('{}') }}}}", name)
}

/// Render a source reference
pub fn render_source(source_group: &str, name: &str) -> String {
    format!("{{{{ source('{}', '{}') }}}}", source_group, name)
}

/// Immutable lookup table from `(lookup_key, kind)` to rendered reference
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    /// Entries in registration order, duplicates dropped
    entries: Vec<CatalogEntry>,

    models: HashMap<String, usize>,

    sources: HashMap<String, usize>,

    /// Hex SHA-256 over `entries`, fixed at build time
    fingerprint: String,
}

impl CatalogIndex {
    /// Build an index from model and source definitions
    ///
    /// When a `(key, kind)` pair appears more than once the first definition
    /// wins.
    pub fn build(models: &[ModelDef], sources: &[SourceDef]) -> Self {
        let mut index = Self {
            entries: Vec::new(),
            models: HashMap::new(),
            sources: HashMap::new(),
            fingerprint: String::new(),
        };

        for model in models {
            index.register(CatalogKind::Model, model.name.clone(), render_ref(&model.name));
        }

        for source in sources {
            index.register(
                CatalogKind::Source,
                source.lookup_key(),
                render_source(&source.source_group, &source.name),
            );
        }

        index.fingerprint = fingerprint_entries(&index.entries);

        tracing::debug!(
            models = index.models.len(),
            sources = index.sources.len(),
            "built catalog index"
        );

        index
    }

    /// Build an index from a parsed dbt manifest
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self::build(&manifest.model_defs(), &manifest.source_defs())
    }

    fn register(&mut self, kind: CatalogKind, lookup_key: String, rendered_ref: String) {
        let position = self.entries.len();
        let table = match kind {
            CatalogKind::Model => &mut self.models,
            CatalogKind::Source => &mut self.sources,
        };

        if table.contains_key(&lookup_key) {
            tracing::debug!(key = %lookup_key, %kind, "ignoring duplicate catalog entry");
            return;
        }

        table.insert(lookup_key.clone(), position);
        self.entries.push(CatalogEntry {
            lookup_key,
            kind,
            rendered_ref,
        });
    }

    /// Look up the rendered reference for a key of the given kind
    pub fn lookup(&self, key: &str, kind: CatalogKind) -> Option<&str> {
        let table = match kind {
            CatalogKind::Model => &self.models,
            CatalogKind::Source => &self.sources,
        };

        table
            .get(key)
            .map(|&position| self.entries[position].rendered_ref.as_str())
    }

    /// Number of registered entries across both kinds
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// SHA-256 over the registered entries, hex encoded
    ///
    /// Two indexes with the same entries in the same order share a
    /// fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint_entries(entries: &[CatalogEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.kind.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.lookup_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.rendered_ref.as_bytes());
        hasher.update([0xffu8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_index() -> CatalogIndex {
        CatalogIndex::build(
            &[
                ModelDef::new("bq_views_fsdfsdf", "bq_views"),
                ModelDef::new("dataset_id_gerg", "dataset_id"),
            ],
            &[SourceDef::new("raw", "payments", "raw_data")],
        )
    }

    #[test]
    fn rendering() {
        assert_eq!(render_ref("orders"), "{{ ref('orders') }}");
        assert_eq!(render_source("raw", "payments"), "{{ source('raw', 'payments') }}");
    }

    #[test]
    fn lookup_models_and_sources() {
        let index = sample_index();

        assert_eq!(
            index.lookup("bq_views_fsdfsdf", CatalogKind::Model),
            Some("{{ ref('bq_views_fsdfsdf') }}")
        );
        assert_eq!(
            index.lookup("raw.payments", CatalogKind::Source),
            Some("{{ source('raw', 'payments') }}")
        );
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn lookup_is_kind_scoped() {
        let index = sample_index();
        assert_eq!(index.lookup("raw.payments", CatalogKind::Model), None);
        assert_eq!(index.lookup("dataset_id_gerg", CatalogKind::Source), None);
        assert_eq!(index.lookup("missing", CatalogKind::Model), None);
    }

    #[test]
    fn empty_catalog() {
        let index = CatalogIndex::build(&[], &[]);
        assert!(index.is_empty());
        assert_eq!(index.lookup("anything", CatalogKind::Model), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let index = CatalogIndex::build(
            &[],
            &[
                SourceDef::new("shop.raw", "orders", "first_schema"),
                SourceDef::new("shop", "raw.orders", "second_schema"),
            ],
        );
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.lookup("shop.raw.orders", CatalogKind::Source),
            Some("{{ source('shop.raw', 'orders') }}")
        );
    }

    #[test]
    fn first_duplicate_model_wins() {
        let index = CatalogIndex::build(
            &[
                ModelDef::new("orders", "marts"),
                ModelDef::new("customers", "marts"),
                ModelDef::new("orders", "staging"),
            ],
            &[],
        );

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("orders", CatalogKind::Model), Some("{{ ref('orders') }}"));
        let keys: Vec<&str> = index.entries().map(|e| e.lookup_key.as_str()).collect();
        assert_eq!(keys, vec!["orders", "customers"]);

        // the shadowed definition leaves no trace in the snapshot
        let deduplicated = CatalogIndex::build(
            &[ModelDef::new("orders", "marts"), ModelDef::new("customers", "marts")],
            &[],
        );
        assert_eq!(index.fingerprint(), deduplicated.fingerprint());
    }

    #[test]
    fn same_key_across_kinds_is_kept() {
        let index = CatalogIndex::build(
            &[ModelDef::new("raw.orders", "raw")],
            &[SourceDef::new("raw", "orders", "raw")],
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("raw.orders", CatalogKind::Model), Some("{{ ref('raw.orders') }}"));
        assert_eq!(
            index.lookup("raw.orders", CatalogKind::Source),
            Some("{{ source('raw', 'orders') }}")
        );
    }

    #[test]
    fn entries_keep_registration_order() {
        let index = sample_index();
        let keys: Vec<&str> = index.entries().map(|e| e.lookup_key.as_str()).collect();
        assert_eq!(keys, vec!["bq_views_fsdfsdf", "dataset_id_gerg", "raw.payments"]);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample_index();
        let b = sample_index();
        let c = CatalogIndex::build(&[ModelDef::new("other", "s")], &[]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn empty_index_fingerprint_is_digest_of_nothing() {
        let index = CatalogIndex::build(&[], &[]);
        assert_eq!(
            index.fingerprint(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(index.clone().fingerprint(), index.fingerprint());
    }
}
