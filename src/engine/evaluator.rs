//! Target policy evaluator
//!
//! Maps a declared specifier, a version catalog and a target policy to a
//! single upgrade decision. The evaluator never proposes a version that is
//! lower than what the declared specifier already permits.

use super::CandidateFilter;
use crate::domain::{
    DecisionStatus, Dependency, PassthroughReason, PublishedVersion, TargetPolicy,
    UpgradeDecision, VersionCatalog,
};
use crate::specifier::{render, RangeStyle, RegistrySpecifier, RenderMode, Specifier};
use semver::Version;
use std::cmp::Ordering;
use tracing::debug;

/// Evaluates dependencies against catalogs
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    candidates: CandidateFilter,
}

impl Evaluator {
    /// Create an evaluator with the given candidate filter
    pub fn new(candidates: CandidateFilter) -> Self {
        Self { candidates }
    }

    /// Decision for specifiers that are never resolved against a catalog
    pub fn resolve_offline(dependency: &Dependency, spec: &Specifier) -> Option<UpgradeDecision> {
        let reason = match spec {
            Specifier::NonRegistry { .. } => PassthroughReason::NonRegistry,
            Specifier::Tag { .. } => PassthroughReason::TagReference,
            Specifier::Exact(registry) | Specifier::Range(registry) => {
                if !registry.range.is_any() {
                    return None;
                }
                PassthroughReason::Wildcard
            }
        };
        Some(keep(dependency, DecisionStatus::Passthrough(reason)))
    }

    /// Parse the declared specifier and evaluate it
    pub fn evaluate_dependency(
        &self,
        dependency: &Dependency,
        catalog: &VersionCatalog,
        policy: &TargetPolicy,
    ) -> UpgradeDecision {
        match Specifier::parse(&dependency.specifier) {
            Ok(spec) => self.evaluate(dependency, &spec, catalog, policy),
            Err(e) => keep(dependency, DecisionStatus::Invalid(e.to_string())),
        }
    }

    /// Evaluate a parsed specifier against a catalog under a policy
    pub fn evaluate(
        &self,
        dependency: &Dependency,
        spec: &Specifier,
        catalog: &VersionCatalog,
        policy: &TargetPolicy,
    ) -> UpgradeDecision {
        if let Some(decision) = Self::resolve_offline(dependency, spec) {
            return decision;
        }
        let Some(registry) = spec.registry() else {
            return keep(
                dependency,
                DecisionStatus::Passthrough(PassthroughReason::NonRegistry),
            );
        };

        if catalog.is_empty() {
            return keep(dependency, DecisionStatus::NotFound);
        }

        let target = match self.select_target(registry, catalog, policy, dependency.is_peer()) {
            Some(target) => target.version.clone(),
            None => {
                return keep(
                    dependency,
                    DecisionStatus::NoCandidate(format!("no version matches policy {}", policy)),
                )
            }
        };

        let resolved = self.highest_satisfying(registry, catalog, policy);
        let decision = decide(dependency, registry, target, resolved, policy);
        debug!("{}: {} ({})", dependency.key(), decision, policy);
        decision
    }

    /// Select the target version for a policy
    fn select_target<'a>(
        &self,
        spec: &RegistrySpecifier,
        catalog: &'a VersionCatalog,
        policy: &TargetPolicy,
        peer: bool,
    ) -> Option<&'a PublishedVersion> {
        // Peer ranges are a compatibility contract: only versions inside them are targets
        let in_scope = |v: &PublishedVersion| !peer || spec.range.satisfies(&v.version);

        if let TargetPolicy::Tag(tag) = policy {
            return catalog
                .tag(tag)
                .filter(|v| self.candidates.accepts(v) && in_scope(v));
        }

        let allows_prerelease = policy.allows_prerelease();
        let pool = catalog
            .versions()
            .iter()
            .filter(|v| self.candidates.is_candidate(v, allows_prerelease) && in_scope(v));

        match policy {
            TargetPolicy::Greatest => pool.last(),
            TargetPolicy::Newest => pool.max_by(|a, b| {
                a.version
                    .cmp_precedence(&b.version)
                    .then_with(|| a.published_at.cmp(&b.published_at))
            }),
            TargetPolicy::Latest | TargetPolicy::Semver => {
                let pool: Vec<&PublishedVersion> = pool.collect();
                match catalog.tag("latest") {
                    Some(latest) if pool.iter().any(|v| v.version == latest.version) => {
                        Some(latest)
                    }
                    // Tagged version filtered out: stay at or below it
                    Some(latest) => pool.into_iter().rev().find(|v| {
                        v.version.cmp_precedence(&latest.version) != Ordering::Greater
                    }),
                    None => pool.into_iter().rev().find(|v| !v.is_prerelease()),
                }
            }
            TargetPolicy::Minor => {
                let reference = reference_version(spec, catalog);
                pool.filter(|v| v.version.major == reference.major).last()
            }
            TargetPolicy::Patch => {
                let reference = reference_version(spec, catalog);
                pool.filter(|v| {
                    v.version.major == reference.major && v.version.minor == reference.minor
                })
                .last()
            }
            TargetPolicy::Tag(_) => None,
        }
    }
}

impl Evaluator {
    /// Highest candidate the declared range already resolves to
    fn highest_satisfying(
        &self,
        spec: &RegistrySpecifier,
        catalog: &VersionCatalog,
        policy: &TargetPolicy,
    ) -> Option<Version> {
        let allows_prerelease = policy.allows_prerelease();
        catalog
            .versions()
            .iter()
            .rev()
            .find(|v| {
                self.candidates.is_candidate(v, allows_prerelease)
                    && spec.range.satisfies(&v.version)
            })
            .map(|v| v.version.clone())
    }
}

/// Version `minor` and `patch` stay anchored on
///
/// Ranges without a lower bound (`<2.0.0`) anchor on the highest published
/// version they permit.
fn reference_version(spec: &RegistrySpecifier, catalog: &VersionCatalog) -> Version {
    if spec.range.has_lower_bound() {
        return spec.range.floor();
    }
    catalog
        .versions()
        .iter()
        .rev()
        .find(|v| spec.range.satisfies(&v.version))
        .map(|v| v.version.clone())
        .unwrap_or_else(|| spec.range.reference_version())
}

/// Turn a selected target into a decision, never regressing
///
/// An unchanged decision reports `resolved`, the highest version the
/// declared range already allows, and falls back to the target.
fn decide(
    dependency: &Dependency,
    spec: &RegistrySpecifier,
    target: Version,
    resolved: Option<Version>,
    policy: &TargetPolicy,
) -> UpgradeDecision {
    let range = &spec.range;
    let unchanged = || {
        UpgradeDecision::unchanged(
            &dependency.name,
            dependency.section,
            &dependency.specifier,
            resolved.clone().or_else(|| Some(target.clone())),
        )
    };

    // Peer ranges are never narrowed: a target inside the range keeps it
    if range.is_at_least(&target) || (dependency.is_peer() && range.satisfies(&target)) {
        return unchanged();
    }

    let mode = if *policy == TargetPolicy::Semver {
        if range.satisfies(&target) {
            return unchanged();
        }
        RenderMode::Widen
    } else {
        if range.style() == RangeStyle::Bounded && range.satisfies(&target) {
            return unchanged();
        }
        RenderMode::Replace
    };

    let rendered = render(spec, &target, mode);
    if rendered == spec.raw {
        return unchanged();
    }
    UpgradeDecision::upgrade(
        &dependency.name,
        dependency.section,
        &dependency.specifier,
        rendered,
        target,
    )
}

fn keep(dependency: &Dependency, status: DecisionStatus) -> UpgradeDecision {
    UpgradeDecision::keep(
        &dependency.name,
        dependency.section,
        &dependency.specifier,
        status,
    )
}
