//! Multi-level submission documents
//!
//! A submission carries a project id, an optional timestamp, and any number
//! of `level*` / `*_level` entries, each holding one query to convert:
//!
//! ```json
//! {
//!   "project_id": "kossip-helpers",
//!   "level1": { "dataset_id": "bq_views", "object_name": "fsdfsdf",
//!               "object_type": "VIEW", "query": "SELECT * FROM public.customers" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use crate::request::{ObjectType, RewriteRequest};

/// One query entry of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelData {
    pub dataset_id: String,
    pub object_name: String,
    pub object_type: ObjectType,
    pub query: String,
}

impl LevelData {
    /// Build the rewrite request for this level
    pub fn to_request(&self) -> RewriteRequest {
        RewriteRequest::new(self.query.clone(), self.object_type, self.object_name.clone())
    }
}

/// A submission document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Level entries keyed by their field name
    #[serde(flatten)]
    pub levels: BTreeMap<String, LevelData>,
}

impl Submission {
    /// Parse a submission document
    ///
    /// Accepts either the bare document or the `{ "timestamp", "data" }`
    /// envelope written by the submission log.
    pub fn from_json(json: &str) -> Result<Self, SubmissionError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SubmissionError::ParseError(e.to_string()))?;

        Self::from_value(value)
    }

    /// Parse one document or a whole submission log
    ///
    /// A JSON array is read as a log, one document or envelope per element;
    /// anything else is a single document.
    pub fn all_from_json(json: &str) -> Result<Vec<Self>, SubmissionError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SubmissionError::ParseError(e.to_string()))?;

        match value {
            serde_json::Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            other => Ok(vec![Self::from_value(other)?]),
        }
    }

    fn from_value(mut value: serde_json::Value) -> Result<Self, SubmissionError> {
        // `{ "timestamp", "data" }` envelope written by the submission log
        let is_envelope = value.get("project_id").is_none()
            && value.get("data").map_or(false, |d| d.is_object());
        if is_envelope {
            let received = value.get("timestamp").and_then(|t| t.as_str()).map(str::to_string);
            let data = value["data"].take();
            let mut submission = Self::from_value(data)?;
            if submission.timestamp.is_none() {
                submission.timestamp = received;
            }
            return Ok(submission);
        }

        if value.get("project_id").is_none() {
            return Err(SubmissionError::MissingProjectId);
        }

        serde_json::from_value(value).map_err(|e| SubmissionError::ParseError(e.to_string()))
    }

    /// Load a submission from file
    pub fn from_file(path: &Path) -> Result<Self, SubmissionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SubmissionError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Load every submission from a document or log file
    pub fn all_from_file(path: &Path) -> Result<Vec<Self>, SubmissionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SubmissionError::IoError(path.display().to_string(), e.to_string()))?;

        Self::all_from_json(&contents)
    }

    /// Levels in display order (`level2` before `level10`, custom levels last)
    pub fn ordered_levels(&self) -> Vec<(&str, &LevelData)> {
        let mut levels: Vec<(&str, &LevelData)> = self
            .levels
            .iter()
            .map(|(name, data)| (name.as_str(), data))
            .collect();
        levels.sort_by(|(a, _), (b, _)| compare_level_names(a, b));
        levels
    }
}

fn level_number(name: &str) -> Option<u64> {
    name.strip_prefix("level")?.parse().ok()
}

/// Numbered levels sort numerically and come before named ones
fn compare_level_names(a: &str, b: &str) -> Ordering {
    match (level_number(a), level_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Submission parsing errors
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Failed to read submission file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse submission JSON: {0}")]
    ParseError(String),

    #[error("Missing project_id in submission")]
    MissingProjectId,
}
