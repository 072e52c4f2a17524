//! Dependency sections of a package.json manifest

use serde::{Deserialize, Serialize};
use std::fmt;

/// A recognised dependency section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepSection {
    /// `dependencies`
    Prod,
    /// `devDependencies`
    Dev,
    /// `peerDependencies`
    Peer,
    /// `optionalDependencies`
    Optional,
    /// `overrides` (npm)
    Overrides,
    /// `resolutions` (yarn)
    Resolutions,
}

impl DepSection {
    /// Returns all sections in manifest scan order
    pub fn all() -> &'static [DepSection] {
        &[
            DepSection::Prod,
            DepSection::Dev,
            DepSection::Peer,
            DepSection::Optional,
            DepSection::Overrides,
            DepSection::Resolutions,
        ]
    }

    /// Returns the JSON key of this section in package.json
    pub fn json_key(&self) -> &'static str {
        match self {
            DepSection::Prod => "dependencies",
            DepSection::Dev => "devDependencies",
            DepSection::Peer => "peerDependencies",
            DepSection::Optional => "optionalDependencies",
            DepSection::Overrides => "overrides",
            DepSection::Resolutions => "resolutions",
        }
    }

    /// Parses a CLI section name; `overrides` selects both override sections
    pub fn from_cli_name(name: &str) -> Option<&'static [DepSection]> {
        match name.trim().to_ascii_lowercase().as_str() {
            "prod" | "dependencies" => Some(&[DepSection::Prod]),
            "dev" | "devdependencies" => Some(&[DepSection::Dev]),
            "peer" | "peerdependencies" => Some(&[DepSection::Peer]),
            "optional" | "optionaldependencies" => Some(&[DepSection::Optional]),
            "overrides" | "resolutions" => Some(&[DepSection::Overrides, DepSection::Resolutions]),
            _ => None,
        }
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            DepSection::Prod => "prod",
            DepSection::Dev => "dev",
            DepSection::Peer => "peer",
            DepSection::Optional => "optional",
            DepSection::Overrides => "overrides",
            DepSection::Resolutions => "resolutions",
        }
    }
}

impl fmt::Display for DepSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.json_key())
    }
}
