//! Error taxonomy for rewrite calls
//!
//! An unmatched table reference is not an error: the rewriter passes it
//! through verbatim. The only failure of a rewrite is a missing catalog.

/// Errors surfaced to the caller of a rewrite
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl RewriteError {
    /// The index was never published
    pub fn not_loaded() -> Self {
        Self::CatalogUnavailable("no catalog snapshot has been published".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message() {
        let err = RewriteError::not_loaded();
        assert_eq!(
            err.to_string(),
            "Catalog unavailable: no catalog snapshot has been published"
        );
    }
}
