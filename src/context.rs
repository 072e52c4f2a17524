//! Immutable run configuration
//!
//! A `RunContext` is built once from CLI arguments and project settings and
//! passed by reference to the differ, the aggregator and doctor mode.

use crate::engine::{CandidateFilter, DependencyFilter, Evaluator, PolicyConfig};
use crate::registry::NPM_REGISTRY_URL;
use std::time::Duration;
use tokio::time::Instant;

/// Default concurrency limit for registry requests
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Configuration shared by every component of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Target policy, globally and per dependency
    pub policies: PolicyConfig,
    /// Which entries are evaluated at all
    pub filter: DependencyFilter,
    /// Which published versions may be targets
    pub candidates: CandidateFilter,
    /// Registry base URL
    pub registry_url: String,
    /// Maximum number of concurrent catalog lookups
    pub concurrency: usize,
    /// Global run timeout
    pub timeout: Option<Duration>,
    /// Point in time the global timeout expires
    pub deadline: Option<Instant>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl RunContext {
    /// Create a context with default filters
    pub fn new(policies: PolicyConfig) -> Self {
        Self {
            policies,
            filter: DependencyFilter::new(),
            candidates: CandidateFilter::new(),
            registry_url: NPM_REGISTRY_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
            deadline: None,
        }
    }

    /// Set the dependency filter
    pub fn with_filter(mut self, filter: DependencyFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the candidate filter
    pub fn with_candidates(mut self, candidates: CandidateFilter) -> Self {
        self.candidates = candidates;
        self
    }

    /// Set the registry base URL
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    /// Set the lookup concurrency limit (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the global timeout; the deadline starts counting now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Evaluator configured with this context's candidate filter
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.candidates.clone())
    }

    /// True once the global deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
