//! dbt catalog handling
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts)
//! - Building the model/source lookup index
//! - Publishing index snapshots for concurrent readers

pub mod manifest;
pub mod catalog;
pub mod handle;

pub use manifest::{Manifest, ManifestNode, ManifestSource, ManifestMetadata, ManifestError};
pub use catalog::{CatalogIndex, CatalogEntry, CatalogKind, ModelDef, SourceDef, render_ref, render_source};
pub use handle::CatalogHandle;
