//! Name-based rules: filter/reject patterns and per-dependency policies
//!
//! Patterns accept three forms:
//! - an exact package name (`lodash`)
//! - a `*` glob (`@types/*`, `eslint-*`)
//! - a regular expression between slashes (`/^react(-dom)?$/`)

use crate::domain::{DepSection, Dependency, TargetPolicy};
use crate::error::ConfigError;
use regex::Regex;

/// A package name pattern
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Glob(Regex),
    Regex(Regex),
}

impl NamePattern {
    /// Parse a pattern
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidPattern {
                value: value.to_string(),
                message: "pattern is empty".to_string(),
            });
        }

        if let Some(body) = value
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|body| !body.is_empty())
        {
            let regex = Regex::new(body).map_err(|e| ConfigError::InvalidPattern {
                value: value.to_string(),
                message: e.to_string(),
            })?;
            return Ok(NamePattern::Regex(regex));
        }

        if value.contains('*') {
            let escaped: Vec<String> = value.split('*').map(regex::escape).collect();
            let regex = Regex::new(&format!("^{}$", escaped.join(".*"))).map_err(|e| {
                ConfigError::InvalidPattern {
                    value: value.to_string(),
                    message: e.to_string(),
                }
            })?;
            return Ok(NamePattern::Glob(regex));
        }

        Ok(NamePattern::Exact(value.to_string()))
    }

    /// Check a package name against the pattern
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(exact) => exact == name,
            NamePattern::Glob(regex) | NamePattern::Regex(regex) => regex.is_match(name),
        }
    }
}

/// Which dependencies take part in a run
#[derive(Debug, Clone, Default)]
pub struct DependencyFilter {
    /// If non-empty, only names matching one of these are processed
    pub filter: Vec<NamePattern>,
    /// Names matching any of these are never processed
    pub reject: Vec<NamePattern>,
    /// Sections to process (empty means all)
    pub sections: Vec<DepSection>,
}

impl DependencyFilter {
    /// Create a filter that processes everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set include patterns
    pub fn with_filter(mut self, filter: Vec<NamePattern>) -> Self {
        self.filter = filter;
        self
    }

    /// Set exclude patterns
    pub fn with_reject(mut self, reject: Vec<NamePattern>) -> Self {
        self.reject = reject;
        self
    }

    /// Set sections to process
    pub fn with_sections(mut self, sections: Vec<DepSection>) -> Self {
        self.sections = sections;
        self
    }

    /// Check if a section should be processed
    pub fn should_process_section(&self, section: DepSection) -> bool {
        self.sections.is_empty() || self.sections.contains(&section)
    }

    /// Check if a package should be processed based on filter and reject patterns
    pub fn should_process_package(&self, name: &str) -> bool {
        if !self.filter.is_empty() && !self.filter.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.reject.iter().any(|p| p.matches(name))
    }

    /// Check a dependency against both section and name rules
    pub fn should_process(&self, dependency: &Dependency) -> bool {
        self.should_process_section(dependency.section)
            && self.should_process_package(&dependency.name)
    }
}

/// Global target policy plus per-dependency overrides
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    /// Policy used when no rule matches
    pub default: TargetPolicy,
    /// Overrides, first match wins
    pub rules: Vec<(NamePattern, TargetPolicy)>,
}

impl PolicyConfig {
    /// Create a config with a single global policy
    pub fn new(default: TargetPolicy) -> Self {
        Self {
            default,
            rules: Vec::new(),
        }
    }

    /// Add an override
    pub fn with_rule(mut self, pattern: NamePattern, policy: TargetPolicy) -> Self {
        self.rules.push((pattern, policy));
        self
    }

    /// Parse a `<pattern>=<policy>` rule
    pub fn parse_rule(value: &str) -> Result<(NamePattern, TargetPolicy), ConfigError> {
        let (pattern, policy) = value
            .rsplit_once('=')
            .filter(|(pattern, policy)| !pattern.trim().is_empty() && !policy.trim().is_empty())
            .ok_or_else(|| ConfigError::InvalidTargetRule {
                value: value.to_string(),
            })?;
        Ok((NamePattern::parse(pattern)?, policy.parse::<TargetPolicy>()?))
    }

    /// Policy that applies to a package
    pub fn policy_for(&self, name: &str) -> &TargetPolicy {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map(|(_, policy)| policy)
            .unwrap_or(&self.default)
    }
}
