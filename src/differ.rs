//! Manifest differ
//!
//! Runs the evaluator over every dependency entry of one manifest:
//! - Offline passthrough for filtered entries, references, tags and wildcards
//! - Parallel catalog lookups bounded by a semaphore, one per unique package
//! - Per-dependency errors recorded on the decision, never aborting the manifest
//! - Decisions applied to a new document, the original left untouched

use crate::context::RunContext;
use crate::domain::{
    DecisionStatus, Dependency, DependencyKey, PassthroughReason, UpgradeDecision, VersionCatalog,
};
use crate::engine::Evaluator;
use crate::error::{ManifestError, RegistryError};
use crate::manifest::ManifestDocument;
use crate::registry::CatalogProvider;
use crate::specifier::Specifier;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

type Lookups = HashMap<String, Result<VersionCatalog, RegistryError>>;

/// Decisions for every dependency entry of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    decisions: BTreeMap<DependencyKey, UpgradeDecision>,
}

impl ManifestDiff {
    /// Build a diff from decisions
    pub fn from_decisions(decisions: impl IntoIterator<Item = UpgradeDecision>) -> Self {
        Self {
            decisions: decisions.into_iter().map(|d| (d.key(), d)).collect(),
        }
    }

    /// All decisions, keyed by entry
    pub fn decisions(&self) -> &BTreeMap<DependencyKey, UpgradeDecision> {
        &self.decisions
    }

    /// Decision for one entry
    pub fn get(&self, key: &DependencyKey) -> Option<&UpgradeDecision> {
        self.decisions.get(key)
    }

    /// Decisions proposing a new specifier
    pub fn upgrades(&self) -> impl Iterator<Item = &UpgradeDecision> {
        self.decisions.values().filter(|d| d.is_upgrade())
    }

    /// True if any upgrade was proposed
    pub fn has_upgrades(&self) -> bool {
        self.upgrades().next().is_some()
    }

    /// Consume into decisions, in section then name order
    pub fn into_decisions(self) -> Vec<UpgradeDecision> {
        self.decisions.into_values().collect()
    }

    /// New document with every upgrade applied
    pub fn apply(&self, document: &ManifestDocument) -> Result<ManifestDocument, ManifestError> {
        apply_decisions(document, self.upgrades())
    }
}

/// New document with the given upgrades applied; other decisions are ignored
pub fn apply_decisions<'a>(
    document: &ManifestDocument,
    decisions: impl IntoIterator<Item = &'a UpgradeDecision>,
) -> Result<ManifestDocument, ManifestError> {
    let updates: BTreeMap<DependencyKey, String> = decisions
        .into_iter()
        .filter(|d| d.is_upgrade())
        .map(|d| (d.key(), d.to.clone()))
        .collect();
    document.with_updates(&updates)
}

/// An entry that needs a catalog
struct Pending {
    dependency: Dependency,
    specifier: Specifier,
    lookup: String,
}

/// Compute decisions for every entry of a manifest
///
/// Fails only when every catalog lookup failed for a reason other than a
/// missing package; otherwise lookup failures are recorded per dependency.
pub async fn diff(
    document: &ManifestDocument,
    ctx: &RunContext,
    provider: Arc<dyn CatalogProvider>,
) -> Result<ManifestDiff, RegistryError> {
    let mut decisions = Vec::with_capacity(document.dependencies().len());
    let mut pending = Vec::new();

    for dependency in document.dependencies() {
        if !ctx.filter.should_process(dependency) {
            decisions.push(keep(
                dependency,
                DecisionStatus::Passthrough(PassthroughReason::Filtered),
            ));
            continue;
        }
        let specifier = match Specifier::parse(&dependency.specifier) {
            Ok(specifier) => specifier,
            Err(e) => {
                warn!("{}: {}", dependency.key(), e);
                decisions.push(keep(dependency, DecisionStatus::Invalid(e.to_string())));
                continue;
            }
        };
        if let Some(decision) = Evaluator::resolve_offline(dependency, &specifier) {
            decisions.push(decision);
            continue;
        }
        let lookup = specifier.lookup_name(dependency.package_name()).to_string();
        pending.push(Pending {
            dependency: dependency.clone(),
            specifier,
            lookup,
        });
    }

    let mut names: Vec<String> = pending.iter().map(|p| p.lookup.clone()).collect();
    names.sort();
    names.dedup();
    let lookups = fetch_all(&names, provider, ctx.concurrency).await;

    if !lookups.is_empty()
        && lookups
            .values()
            .all(|r| matches!(r, Err(e) if !e.is_not_found()))
    {
        if let Some(Err(e)) = names.first().and_then(|n| lookups.get(n)) {
            return Err(e.clone());
        }
    }

    let evaluator = ctx.evaluator();
    for item in pending {
        let dependency = &item.dependency;
        let decision = match lookups.get(&item.lookup) {
            Some(Ok(catalog)) => {
                let policy = ctx.policies.policy_for(dependency.package_name());
                evaluator.evaluate(dependency, &item.specifier, catalog, policy)
            }
            Some(Err(e)) if e.is_not_found() => keep(dependency, DecisionStatus::NotFound),
            Some(Err(e)) => {
                warn!("{}: {}", dependency.key(), e);
                keep(dependency, DecisionStatus::FetchFailed(e.to_string()))
            }
            None => keep(
                dependency,
                DecisionStatus::FetchFailed("lookup did not complete".to_string()),
            ),
        };
        decisions.push(decision);
    }

    debug!(
        "{}: {} decision(s), {} lookup(s)",
        document.path().display(),
        decisions.len(),
        names.len()
    );
    Ok(ManifestDiff::from_decisions(decisions))
}

/// Fetch catalogs concurrently with a bounded number of in-flight requests
async fn fetch_all(
    names: &[String],
    provider: Arc<dyn CatalogProvider>,
    concurrency: usize,
) -> Lookups {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for name in names {
        let name = name.clone();
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => provider.fetch_catalog(&name).await,
                Err(_) => Err(RegistryError::network_error(
                    &name,
                    provider.registry_name(),
                    "lookup cancelled",
                )),
            };
            (name, result)
        });
    }

    let mut lookups = HashMap::with_capacity(names.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, result)) => {
                lookups.insert(name, result);
            }
            Err(e) => warn!("catalog lookup task failed: {}", e),
        }
    }
    lookups
}

fn keep(dependency: &Dependency, status: DecisionStatus) -> UpgradeDecision {
    UpgradeDecision::keep(
        &dependency.name,
        dependency.section,
        &dependency.specifier,
        status,
    )
}
