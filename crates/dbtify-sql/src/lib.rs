//! SQL to dbt model conversion
//!
//! This crate handles:
//! - Matching `FROM` / `JOIN` table references in raw SQL
//! - Resolving them to dbt `ref()` / `source()` calls through a catalog index
//! - Adding the `config()` header
//! - Converting whole multi-level submissions

pub mod rewriter;
pub mod submission;

pub use rewriter::ReferenceRewriter;
pub use submission::{rewrite_submission, LevelRewrite, SubmissionRewrite};
