//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json to extract the models and sources the
//! catalog index is built from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::catalog::{ModelDef, SourceDef};

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Model, test, seed and snapshot nodes
    #[serde(default)]
    pub nodes: HashMap<String, ManifestNode>,

    /// Source definitions
    #[serde(default)]
    pub sources: HashMap<String, ManifestSource>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Get all model nodes, ordered by unique_id
    pub fn models(&self) -> Vec<(&str, &ManifestNode)> {
        let mut models: Vec<(&str, &ManifestNode)> = self
            .nodes
            .iter()
            .filter(|(id, node)| id.starts_with("model.") || node.resource_type == "model")
            .map(|(id, node)| (id.as_str(), node))
            .collect();
        models.sort_by(|a, b| a.0.cmp(b.0));
        models
    }

    /// Get all sources, ordered by unique_id
    pub fn ordered_sources(&self) -> Vec<(&str, &ManifestSource)> {
        let mut sources: Vec<(&str, &ManifestSource)> = self
            .sources
            .iter()
            .filter(|(id, _)| id.starts_with("source."))
            .map(|(id, source)| (id.as_str(), source))
            .collect();
        sources.sort_by(|a, b| a.0.cmp(b.0));
        sources
    }

    /// Model definitions for the catalog index
    ///
    /// Node maps are unordered in JSON, so definitions come out sorted by
    /// unique_id to keep first-match-wins deterministic.
    pub fn model_defs(&self) -> Vec<ModelDef> {
        self.models()
            .into_iter()
            .map(|(_, node)| ModelDef {
                name: node.name.clone(),
                schema: node.schema.clone().unwrap_or_default(),
                database: node.database.clone(),
            })
            .collect()
    }

    /// Source definitions for the catalog index
    pub fn source_defs(&self) -> Vec<SourceDef> {
        self.ordered_sources()
            .into_iter()
            .map(|(_, source)| SourceDef {
                source_group: source.source_name.clone(),
                name: source.name.clone(),
                schema: source.schema.clone(),
                database: source.database.clone(),
            })
            .collect()
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Node name (e.g., "users")
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    #[serde(default)]
    pub resource_type: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    #[serde(default)]
    pub schema: Option<String>,
}

/// A source in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    /// Source name (e.g., "raw")
    pub source_name: String,

    /// Table name (e.g., "users")
    pub name: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    pub schema: String,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
