//! Upgrade decision types

use super::{DepSection, DependencyKey};
use semver::Version;
use std::fmt;

/// Why a dependency was passed through without consulting the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// git, URL, file, link or workspace reference
    NonRegistry,
    /// Declared as a distribution tag (`latest`, `next`)
    TagReference,
    /// Any-version range (`*`, `x`, empty)
    Wildcard,
    /// Excluded by --filter/--reject or section selection
    Filtered,
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassthroughReason::NonRegistry => write!(f, "non-registry reference"),
            PassthroughReason::TagReference => write!(f, "tag reference"),
            PassthroughReason::Wildcard => write!(f, "wildcard"),
            PassthroughReason::Filtered => write!(f, "filtered"),
        }
    }
}

/// Outcome of evaluating one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionStatus {
    /// A newer specifier was rendered
    Upgrade,
    /// The current specifier already reaches the target
    Unchanged,
    /// Never resolved against the registry
    Passthrough(PassthroughReason),
    /// Package unknown to the registry, or no versions published
    NotFound,
    /// Versions exist but none passed the candidate filters
    NoCandidate(String),
    /// The declared specifier could not be parsed
    Invalid(String),
    /// Registry lookup failed
    FetchFailed(String),
}

impl DecisionStatus {
    /// Non-fatal per-dependency errors that are reported with the run
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            DecisionStatus::NotFound | DecisionStatus::Invalid(_) | DecisionStatus::FetchFailed(_)
        )
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Upgrade => write!(f, "upgrade"),
            DecisionStatus::Unchanged => write!(f, "unchanged"),
            DecisionStatus::Passthrough(reason) => write!(f, "{}", reason),
            DecisionStatus::NotFound => write!(f, "not found"),
            DecisionStatus::NoCandidate(msg) => write!(f, "no candidate: {}", msg),
            DecisionStatus::Invalid(msg) => write!(f, "invalid: {}", msg),
            DecisionStatus::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
        }
    }
}

/// The upgrade decision for one dependency entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeDecision {
    /// Package name as declared
    pub name: String,
    /// Section the entry lives in
    pub section: DepSection,
    /// Declared specifier
    pub from: String,
    /// Proposed specifier; equals `from` unless status is Upgrade
    pub to: String,
    /// Target version selected by the policy, when one was selected
    pub to_version: Option<Version>,
    /// Outcome
    pub status: DecisionStatus,
}

impl UpgradeDecision {
    /// Creates an upgrade decision
    pub fn upgrade(
        name: impl Into<String>,
        section: DepSection,
        from: impl Into<String>,
        to: impl Into<String>,
        to_version: Version,
    ) -> Self {
        Self {
            name: name.into(),
            section,
            from: from.into(),
            to: to.into(),
            to_version: Some(to_version),
            status: DecisionStatus::Upgrade,
        }
    }

    /// Creates a decision that leaves the specifier as declared
    pub fn keep(
        name: impl Into<String>,
        section: DepSection,
        from: impl Into<String>,
        status: DecisionStatus,
    ) -> Self {
        let from = from.into();
        Self {
            name: name.into(),
            section,
            to: from.clone(),
            from,
            to_version: None,
            status,
        }
    }

    /// Creates an unchanged decision that records the target it already reaches
    pub fn unchanged(
        name: impl Into<String>,
        section: DepSection,
        from: impl Into<String>,
        target: Option<Version>,
    ) -> Self {
        let mut decision = Self::keep(name, section, from, DecisionStatus::Unchanged);
        decision.to_version = target;
        decision
    }

    /// Returns the key of the dependency entry
    pub fn key(&self) -> DependencyKey {
        DependencyKey::new(self.section, self.name.clone())
    }

    /// True when the decision proposes no change
    pub fn is_unchanged(&self) -> bool {
        self.status != DecisionStatus::Upgrade
    }

    /// True when the decision proposes a new specifier
    pub fn is_upgrade(&self) -> bool {
        self.status == DecisionStatus::Upgrade
    }
}

impl fmt::Display for UpgradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_upgrade() {
            write!(f, "{} {} → {}", self.name, self.from, self.to)
        } else {
            write!(f, "{} {} ({})", self.name, self.from, self.status)
        }
    }
}
