//! npm registry adapter
//!
//! Fetches the full package document (packument) from an npm-compatible
//! registry and turns it into a version catalog.
//! API endpoint: {registry}/{package}, scoped names as `@scope%2fname`

use crate::domain::{PublishedVersion, VersionCatalog};
use crate::error::RegistryError;
use crate::registry::{CatalogProvider, HttpClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Public npm registry base URL
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm registry adapter
pub struct NpmRegistry {
    client: HttpClient,
    base_url: String,
}

/// npm package document
#[derive(Debug, Deserialize)]
struct Packument {
    /// Tag to version string
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    /// Per-version manifests
    #[serde(default)]
    versions: HashMap<String, VersionManifest>,
    /// Publish times, plus `created` and `modified`
    #[serde(default)]
    time: HashMap<String, String>,
}

/// The part of a version manifest the catalog needs
#[derive(Debug, Default, Deserialize)]
struct VersionManifest {
    /// Deprecation message, or occasionally a boolean
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

impl VersionManifest {
    fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            Some(serde_json::Value::String(message)) => !message.is_empty(),
            Some(serde_json::Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

impl NpmRegistry {
    /// Create an adapter for the public registry
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: NPM_REGISTRY_URL.to_string(),
        }
    }

    /// Use a different registry, e.g. from `.npmrc`
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package.replacen('/', "%2f", 1))
    }
}

/// Convert a packument into a catalog; unparsable versions are dropped
fn into_catalog(package: &str, packument: Packument) -> VersionCatalog {
    let versions = packument
        .versions
        .iter()
        .filter_map(|(raw, manifest)| {
            let version = Version::parse(raw).ok()?;
            let mut published = PublishedVersion::new(version).with_deprecated(manifest.is_deprecated());
            if let Some(at) = packument
                .time
                .get(raw)
                .and_then(|t| t.parse::<DateTime<Utc>>().ok())
            {
                published = published.with_published_at(at);
            }
            Some(published)
        })
        .collect();

    let tags: BTreeMap<String, Version> = packument
        .dist_tags
        .iter()
        .filter_map(|(tag, raw)| Some((tag.clone(), Version::parse(raw).ok()?)))
        .collect();

    VersionCatalog::new(package, versions, tags)
}

#[async_trait]
impl CatalogProvider for NpmRegistry {
    fn registry_name(&self) -> &str {
        "npm"
    }

    async fn fetch_catalog(&self, package: &str) -> Result<VersionCatalog, RegistryError> {
        let url = self.build_url(package);
        debug!("fetching {}", url);
        let packument: Packument = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;
        Ok(into_catalog(package, packument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> NpmRegistry {
        NpmRegistry::new(HttpClient::new().unwrap())
    }

    #[test]
    fn test_registry_name() {
        assert_eq!(adapter().registry_name(), "npm");
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            adapter().build_url("lodash"),
            "https://registry.npmjs.org/lodash"
        );
    }

    #[test]
    fn test_build_url_scoped_package() {
        assert_eq!(
            adapter().build_url("@types/node"),
            "https://registry.npmjs.org/@types%2fnode"
        );
    }

    #[test]
    fn test_custom_registry_url() {
        let adapter = adapter().with_registry_url("https://npm.example.com/");
        assert_eq!(adapter.build_url("left-pad"), "https://npm.example.com/left-pad");
    }

    #[test]
    fn test_packument_into_catalog() {
        let json = r#"{
            "name": "demo",
            "dist-tags": { "latest": "1.1.0", "next": "2.0.0-beta.1" },
            "versions": {
                "1.0.0": {},
                "1.1.0": { "deprecated": "use 1.1.1" },
                "1.1.1": { "deprecated": "" },
                "2.0.0-beta.1": { "deprecated": false },
                "not-semver": {}
            },
            "time": {
                "created": "2020-01-01T00:00:00.000Z",
                "1.0.0": "2020-01-01T00:00:00.000Z",
                "1.1.0": "2021-06-15T12:30:00.000Z"
            }
        }"#;
        let packument: Packument = serde_json::from_str(json).unwrap();
        let catalog = into_catalog("demo", packument);

        assert_eq!(catalog.versions().len(), 4);
        assert_eq!(catalog.tag("latest").unwrap().version, Version::new(1, 1, 0));
        assert!(catalog.tag("latest").unwrap().deprecated);
        assert!(catalog.tag("latest").unwrap().published_at.is_some());
        assert!(!catalog.get(&Version::new(1, 1, 1)).unwrap().deprecated);
        assert!(catalog.get(&Version::new(1, 1, 1)).unwrap().published_at.is_none());
        assert!(catalog.tag("next").unwrap().is_prerelease());
    }

    #[test]
    fn test_empty_packument() {
        let packument: Packument = serde_json::from_str(r#"{"name": "unpublished"}"#).unwrap();
        assert!(into_catalog("unpublished", packument).is_empty());
    }
}
