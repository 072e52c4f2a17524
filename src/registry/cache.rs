//! Per-run catalog cache
//!
//! Shared by every manifest of a run so a package is fetched at most once.
//! Catalogs and not-found answers are cached; transient failures are not,
//! so a later lookup of the same package tries again.

use crate::domain::VersionCatalog;
use crate::error::RegistryError;
use crate::registry::CatalogProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Slot = Arc<OnceCell<Result<VersionCatalog, RegistryError>>>;

/// Caching wrapper around another provider
pub struct CachedProvider {
    inner: Arc<dyn CatalogProvider>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CachedProvider {
    /// Wrap a provider
    pub fn new(inner: Arc<dyn CatalogProvider>) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CatalogProvider for CachedProvider {
    fn registry_name(&self) -> &str {
        self.inner.registry_name()
    }

    async fn fetch_catalog(&self, package: &str) -> Result<VersionCatalog, RegistryError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(package.to_string()).or_default().clone()
        };

        let cached = slot
            .get_or_try_init(|| async {
                match self.inner.fetch_catalog(package).await {
                    Ok(catalog) => Ok(Ok(catalog)),
                    Err(e) if e.is_not_found() => Ok(Err(e)),
                    Err(e) => Err(e),
                }
            })
            .await?;
        cached.clone()
    }
}
