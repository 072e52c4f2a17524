//! Dependency information structures

use super::DepSection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one dependency entry within a manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyKey {
    /// Section the entry lives in
    pub section: DepSection,
    /// Package name as declared (the key in the section object)
    pub name: String,
}

impl DependencyKey {
    /// Creates a new key
    pub fn new(section: DepSection, name: impl Into<String>) -> Self {
        Self {
            section,
            name: name.into(),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section.json_key(), self.name)
    }
}

/// A declared dependency: name, section and the raw specifier string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name
    pub name: String,
    /// Section this dependency is declared in
    pub section: DepSection,
    /// Declared specifier, exactly as written
    pub specifier: String,
}

impl Dependency {
    /// Creates a new dependency
    pub fn new(
        name: impl Into<String>,
        section: DepSection,
        specifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            section,
            specifier: specifier.into(),
        }
    }

    /// Creates a new production dependency
    pub fn production(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self::new(name, DepSection::Prod, specifier)
    }

    /// Creates a new development dependency
    pub fn development(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self::new(name, DepSection::Dev, specifier)
    }

    /// Creates a new peer dependency
    pub fn peer(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self::new(name, DepSection::Peer, specifier)
    }

    /// Returns the key identifying this entry
    pub fn key(&self) -> DependencyKey {
        DependencyKey::new(self.section, self.name.clone())
    }

    /// Returns true if this is a peer dependency
    pub fn is_peer(&self) -> bool {
        self.section == DepSection::Peer
    }

    /// Registry package the entry refers to
    ///
    /// Override and resolution keys may carry a parent path (`**/lodash`,
    /// `webpack/@babel/core`) or a version selector (`foo@1.x`); both are
    /// stripped. Other sections use the key as is.
    pub fn package_name(&self) -> &str {
        match self.section {
            DepSection::Overrides | DepSection::Resolutions => override_package_name(&self.name),
            _ => &self.name,
        }
    }
}

fn override_package_name(key: &str) -> &str {
    let mut start = key.rfind('/').map_or(0, |i| i + 1);
    if start > 0 {
        let head = &key[..start - 1];
        let scope_start = head.rfind('/').map_or(0, |i| i + 1);
        if head[scope_start..].starts_with('@') {
            start = scope_start;
        }
    }
    let name = &key[start..];
    let search_from = usize::from(name.starts_with('@'));
    match name[search_from..].find('@') {
        Some(at) => &name[..at + search_from],
        None => name,
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.specifier, self.section.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Dependency::production("a", "^1").section, DepSection::Prod);
        assert_eq!(Dependency::development("a", "^1").section, DepSection::Dev);
        assert!(Dependency::peer("a", "^1").is_peer());
    }

    #[test]
    fn test_key_display() {
        let dep = Dependency::development("jest", "^29.0.0");
        assert_eq!(dep.key().to_string(), "devDependencies.jest");
    }

    #[test]
    fn test_dependency_display() {
        let dep = Dependency::production("lodash", "^4.17.21");
        assert_eq!(dep.to_string(), "lodash@^4.17.21 (prod)");
    }

    #[test]
    fn test_package_name_of_override_keys() {
        let name = |key: &str| Dependency::new(key, DepSection::Resolutions, "1.0.0").package_name().to_string();
        assert_eq!(name("lodash"), "lodash");
        assert_eq!(name("**/lodash"), "lodash");
        assert_eq!(name("@scope/pkg"), "@scope/pkg");
        assert_eq!(name("webpack/@babel/core"), "@babel/core");
        assert_eq!(name("foo@1.x"), "foo");
        assert_eq!(name("@scope/pkg@^2"), "@scope/pkg");
    }

    #[test]
    fn test_package_name_of_regular_entry() {
        let dep = Dependency::production("left/pad", "^1.0.0");
        assert_eq!(dep.package_name(), "left/pad");
    }

    #[test]
    fn test_key_ordering_groups_by_section() {
        let mut keys = vec![
            DependencyKey::new(DepSection::Dev, "a"),
            DependencyKey::new(DepSection::Prod, "z"),
            DependencyKey::new(DepSection::Prod, "b"),
        ];
        keys.sort();
        assert_eq!(keys[0], DependencyKey::new(DepSection::Prod, "b"));
        assert_eq!(keys[2], DependencyKey::new(DepSection::Dev, "a"));
    }
}
