//! Rewrite request and result values

use serde::{Deserialize, Serialize};

/// Kind of warehouse object the rewritten model materializes as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    #[default]
    #[serde(alias = "TABLE")]
    Table,

    #[serde(alias = "VIEW")]
    View,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TABLE" => Ok(Self::Table),
            "VIEW" => Ok(Self::View),
            other => Err(format!("unknown object type '{}', expected TABLE or VIEW", other)),
        }
    }
}

/// A single SQL string to convert into a dbt model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRequest {
    /// Raw SQL as written against warehouse tables
    pub sql: String,

    /// Materialization of the resulting object
    pub object_type: ObjectType,

    /// Alias written into the config header
    pub object_name: String,
}

impl RewriteRequest {
    pub fn new(sql: impl Into<String>, object_type: ObjectType, object_name: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            object_type,
            object_name: object_name.into(),
        }
    }
}

/// Which resolution step produced a substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    /// `schema.table` matched model `schema_table`
    ComposedModel,

    /// Table segment matched a model name
    BareModel,

    /// Full identifier matched a source
    Source,

    /// No catalog entry, text left as written
    Unresolved,
}

impl ResolutionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComposedModel => "composed_model",
            Self::BareModel => "bare_model",
            Self::Source => "source",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for ResolutionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome for one matched table reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Clause keyword exactly as written (`FROM`, `join`, ...)
    pub clause: String,

    /// Table identifier with any backtick quoting removed
    pub identifier: String,

    pub rule: ResolutionRule,

    /// Substituted reference, absent when unresolved
    pub rendered_ref: Option<String>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.rule != ResolutionRule::Unresolved
    }
}

/// Rewritten SQL plus a record of every reference that was considered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteResult {
    pub rewritten_sql: String,

    /// One entry per matched reference, in input order
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl RewriteResult {
    /// References that were left untouched
    pub fn unresolved(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.iter().filter(|r| !r.is_resolved())
    }
}
