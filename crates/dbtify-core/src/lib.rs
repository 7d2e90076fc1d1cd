//! dbtify Core
//!
//! Shared value types for converting raw warehouse SQL into dbt models:
//! configuration, rewrite requests and results, submission documents,
//! and the error taxonomy.

pub mod config;
pub mod error;
pub mod request;
pub mod submission;

pub use config::{Config, ConfigError};
pub use error::RewriteError;
pub use request::{ObjectType, RewriteRequest, RewriteResult, Resolution, ResolutionRule};
pub use submission::{LevelData, Submission, SubmissionError};
