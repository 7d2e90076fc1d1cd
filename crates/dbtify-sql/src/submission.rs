//! Submission conversion
//!
//! Rewrites every level of a submission against one catalog snapshot.

use dbtify_core::{ObjectType, Submission};
use dbtify_dbt::CatalogIndex;
use serde::Serialize;
use crate::rewriter::ReferenceRewriter;

/// One converted level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelRewrite {
    pub level: String,
    pub dataset_id: String,
    pub object_name: String,
    pub object_type: ObjectType,

    /// Query as submitted
    pub sql: String,

    /// dbt model text
    pub rewritten: String,

    /// Table identifiers that had no catalog entry
    pub unresolved: Vec<String>,
}

/// All converted levels of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRewrite {
    pub project_id: String,
    pub levels: Vec<LevelRewrite>,
}

impl SubmissionRewrite {
    /// Total unresolved references across levels
    pub fn unresolved_count(&self) -> usize {
        self.levels.iter().map(|l| l.unresolved.len()).sum()
    }
}

/// Rewrite each level's query using its own object name as the alias
pub fn rewrite_submission(index: &CatalogIndex, submission: &Submission) -> SubmissionRewrite {
    let levels = submission
        .ordered_levels()
        .into_iter()
        .map(|(level, data)| {
            let result = ReferenceRewriter::rewrite(index, &data.to_request());
            LevelRewrite {
                level: level.to_string(),
                dataset_id: data.dataset_id.clone(),
                object_name: data.object_name.clone(),
                object_type: data.object_type,
                sql: data.query.clone(),
                unresolved: result.unresolved().map(|r| r.identifier.clone()).collect(),
                rewritten: result.rewritten_sql,
            }
        })
        .collect();

    SubmissionRewrite {
        project_id: submission.project_id.clone(),
        levels,
    }
}
