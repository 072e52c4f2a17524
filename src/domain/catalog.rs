//! Version catalog of a registry package
//!
//! A catalog holds every published version of one package together with
//! its distribution tags, deprecation flags and publish times. It is built
//! once per lookup and never mutated afterwards.

use chrono::{DateTime, Utc};
use semver::Version;
use std::collections::BTreeMap;

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    /// Parsed version
    pub version: Version,
    /// When this version was published, if the registry reports it
    pub published_at: Option<DateTime<Utc>>,
    /// Whether the version is flagged deprecated
    pub deprecated: bool,
}

impl PublishedVersion {
    /// Create a new published version with no metadata
    pub fn new(version: Version) -> Self {
        Self {
            version,
            published_at: None,
            deprecated: false,
        }
    }

    /// Set the publish time
    pub fn with_published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Mark the version deprecated
    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Returns true if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

/// All published versions and tags of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCatalog {
    /// Package name the catalog was fetched for
    pub name: String,
    /// Versions in ascending semantic precedence
    versions: Vec<PublishedVersion>,
    /// Distribution tag to version
    tags: BTreeMap<String, Version>,
}

impl VersionCatalog {
    /// Create a catalog; versions are sorted by precedence and deduplicated
    pub fn new(
        name: impl Into<String>,
        mut versions: Vec<PublishedVersion>,
        tags: BTreeMap<String, Version>,
    ) -> Self {
        versions.sort_by(|a, b| a.version.cmp_precedence(&b.version));
        versions.dedup_by(|a, b| a.version == b.version);
        Self {
            name: name.into(),
            versions,
            tags,
        }
    }

    /// Create an empty catalog
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), BTreeMap::new())
    }

    /// Build a catalog from version strings, ignoring any that fail to parse
    pub fn from_version_strings<'a>(
        name: impl Into<String>,
        versions: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let versions = versions
            .into_iter()
            .filter_map(|v| Version::parse(v).ok())
            .map(PublishedVersion::new)
            .collect();
        Self::new(name, versions, BTreeMap::new())
    }

    /// Add or replace a distribution tag
    pub fn with_tag(mut self, tag: impl Into<String>, version: Version) -> Self {
        self.tags.insert(tag.into(), version);
        self
    }

    /// Returns true if no versions are published
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Versions in ascending precedence
    pub fn versions(&self) -> &[PublishedVersion] {
        &self.versions
    }

    /// Tag map
    pub fn tags(&self) -> &BTreeMap<String, Version> {
        &self.tags
    }

    /// Resolve a tag to a published version
    pub fn tag(&self, tag: &str) -> Option<&PublishedVersion> {
        let version = self.tags.get(tag)?;
        self.get(version)
    }

    /// Look up a published version
    pub fn get(&self, version: &Version) -> Option<&PublishedVersion> {
        self.versions.iter().find(|v| &v.version == version)
    }
}
