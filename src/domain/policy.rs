//! Target policies selecting the upgrade target version

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Rule selecting which published version counts as the upgrade target
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetPolicy {
    /// Version the `latest` tag points to, else the highest stable version
    #[default]
    Latest,
    /// Highest version including prereleases, ties broken by publish time
    Newest,
    /// Highest version by semantic precedence
    Greatest,
    /// Highest version within the current major
    Minor,
    /// Highest version within the current major.minor
    Patch,
    /// Widen the current range only when it does not reach `latest`
    Semver,
    /// Version an explicit distribution tag points to
    Tag(String),
}

impl TargetPolicy {
    /// Whether prerelease versions are candidates under this policy
    pub fn allows_prerelease(&self) -> bool {
        matches!(self, TargetPolicy::Newest | TargetPolicy::Tag(_))
    }
}

impl FromStr for TargetPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let policy = match s {
            "latest" => TargetPolicy::Latest,
            "newest" => TargetPolicy::Newest,
            "greatest" => TargetPolicy::Greatest,
            "minor" => TargetPolicy::Minor,
            "patch" => TargetPolicy::Patch,
            "semver" => TargetPolicy::Semver,
            _ => match s.strip_prefix('@') {
                Some(tag) if !tag.is_empty() && !tag.contains(char::is_whitespace) => {
                    TargetPolicy::Tag(tag.to_string())
                }
                _ => {
                    return Err(ConfigError::InvalidPolicy {
                        value: s.to_string(),
                    })
                }
            },
        };
        Ok(policy)
    }
}

impl fmt::Display for TargetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPolicy::Latest => write!(f, "latest"),
            TargetPolicy::Newest => write!(f, "newest"),
            TargetPolicy::Greatest => write!(f, "greatest"),
            TargetPolicy::Minor => write!(f, "minor"),
            TargetPolicy::Patch => write!(f, "patch"),
            TargetPolicy::Semver => write!(f, "semver"),
            TargetPolicy::Tag(tag) => write!(f, "@{}", tag),
        }
    }
}
