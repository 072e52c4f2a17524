//! Registry access for version catalogs
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - npm registry adapter
//! - Per-run caching wrapper
//! - In-memory provider for offline use and tests

mod cache;
mod client;
mod memory;
mod npm;

pub use cache::CachedProvider;
pub use client::HttpClient;
pub use memory::InMemoryProvider;
pub use npm::{NpmRegistry, NPM_REGISTRY_URL};

use crate::domain::VersionCatalog;
use crate::error::RegistryError;
use async_trait::async_trait;

/// Source of version catalogs
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Get the registry name
    fn registry_name(&self) -> &str;

    /// Fetch the catalog of a package
    async fn fetch_catalog(&self, package: &str) -> Result<VersionCatalog, RegistryError>;
}
