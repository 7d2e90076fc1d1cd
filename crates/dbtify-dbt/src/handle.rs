//! Published catalog snapshot
//!
//! Readers take an `Arc` to the current index and release the lock
//! immediately. A refresh builds a complete new index before swapping it in,
//! so a rewrite never observes a partially built catalog.

use dbtify_core::RewriteError;
use std::path::Path;
use std::sync::{Arc, RwLock};
use crate::catalog::CatalogIndex;
use crate::manifest::{Manifest, ManifestError};

/// Holder of the currently published catalog index
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Option<Arc<CatalogIndex>>>,
}

impl CatalogHandle {
    /// Create a handle with nothing published yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that already serves `index`
    pub fn with_index(index: CatalogIndex) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(index))),
        }
    }

    /// Replace the published snapshot
    pub fn publish(&self, index: CatalogIndex) -> Arc<CatalogIndex> {
        let index = Arc::new(index);
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Some(Arc::clone(&index));
        }

        tracing::info!(
            entries = index.len(),
            fingerprint = %index.fingerprint(),
            "published catalog snapshot"
        );

        index
    }

    /// Current snapshot, or `CatalogUnavailable` if none was published
    pub fn snapshot(&self) -> Result<Arc<CatalogIndex>, RewriteError> {
        let current = self
            .current
            .read()
            .map_err(|_| RewriteError::CatalogUnavailable("catalog lock poisoned".to_string()))?;

        current.as_ref().map(Arc::clone).ok_or_else(RewriteError::not_loaded)
    }

    /// Whether a snapshot has been published
    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Rebuild from a manifest file and publish if the catalog changed
    ///
    /// Returns `true` when a new snapshot was published. On error the
    /// previous snapshot stays in place.
    pub fn refresh_from_manifest(&self, path: &Path) -> Result<bool, ManifestError> {
        let manifest = match Manifest::from_file(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "catalog refresh failed");
                return Err(e);
            }
        };

        let index = CatalogIndex::from_manifest(&manifest);

        if let Ok(existing) = self.snapshot() {
            if existing.fingerprint() == index.fingerprint() {
                tracing::debug!(path = %path.display(), "catalog unchanged, keeping snapshot");
                return Ok(false);
            }
        }

        self.publish(index);
        Ok(true)
    }
}
