//! In-memory catalog provider for offline runs and tests

use crate::domain::VersionCatalog;
use crate::error::RegistryError;
use crate::registry::CatalogProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves fixed catalogs; unknown packages are not found
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    catalogs: HashMap<String, VersionCatalog>,
    failures: HashMap<String, RegistryError>,
    calls: AtomicUsize,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a catalog under its own name
    pub fn with_catalog(mut self, catalog: VersionCatalog) -> Self {
        self.catalogs.insert(catalog.name.clone(), catalog);
        self
    }

    /// Fail every lookup of a package with the given error
    pub fn with_failure(mut self, package: impl Into<String>, error: RegistryError) -> Self {
        self.failures.insert(package.into(), error);
        self
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for InMemoryProvider {
    fn registry_name(&self) -> &str {
        "memory"
    }

    async fn fetch_catalog(&self, package: &str) -> Result<VersionCatalog, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.get(package) {
            return Err(error.clone());
        }
        self.catalogs
            .get(package)
            .cloned()
            .ok_or_else(|| RegistryError::package_not_found(package, self.registry_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_catalogs_and_counts_calls() {
        let provider = InMemoryProvider::new()
            .with_catalog(VersionCatalog::from_version_strings("a", ["1.0.0"]));
        assert_eq!(provider.fetch_catalog("a").await.unwrap().versions().len(), 1);
        assert!(provider.fetch_catalog("b").await.unwrap_err().is_not_found());
        assert_eq!(provider.calls(), 2);
    }
}
