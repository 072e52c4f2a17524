//! Run result summary types
//!
//! Provides structures for tracking decisions at manifest and run level,
//! plus the outcome of a doctor session.

use super::UpgradeDecision;
use crate::error::ProcessError;
use std::path::PathBuf;

/// Why a batch of upgrades was rejected by doctor mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvidence {
    /// Names of the smallest batch observed to fail
    pub batch: Vec<String>,
    /// The failing install or test run
    pub failure: ProcessError,
}

/// An upgrade rejected by doctor mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The rejected decision
    pub decision: UpgradeDecision,
    /// Failure attribution
    pub evidence: FailureEvidence,
}

/// Outcome of a completed doctor session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorReport {
    /// Upgrades installed and verified, in commit order
    pub confirmed: Vec<UpgradeDecision>,
    /// Upgrades rolled back
    pub rejected: Vec<Rejection>,
    /// Deepest bisection level that ran a verification
    pub rounds: usize,
    /// Number of install + test cycles run on candidate batches
    pub verifications: usize,
}

/// Result for a single manifest file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReport {
    /// Path to the manifest file
    pub path: PathBuf,
    /// Decisions for every dependency entry, in section then name order
    pub decisions: Vec<UpgradeDecision>,
    /// Whether the manifest file was rewritten
    pub written: bool,
    /// Doctor outcome, when doctor mode ran on this manifest
    pub doctor: Option<DoctorReport>,
    /// Manifest-level error (read, parse, workspace discovery)
    pub error: Option<String>,
}

impl ManifestReport {
    /// Creates a report for a manifest
    pub fn new(path: impl Into<PathBuf>, decisions: Vec<UpgradeDecision>) -> Self {
        Self {
            path: path.into(),
            decisions,
            written: false,
            doctor: None,
            error: None,
        }
    }

    /// Creates a report for a manifest that could not be processed
    pub fn failed(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            decisions: Vec::new(),
            written: false,
            doctor: None,
            error: Some(error.into()),
        }
    }

    /// Returns all upgrade decisions
    pub fn upgrades(&self) -> impl Iterator<Item = &UpgradeDecision> {
        self.decisions.iter().filter(|d| d.is_upgrade())
    }

    /// Returns decisions carrying a per-dependency error
    pub fn warnings(&self) -> impl Iterator<Item = &UpgradeDecision> {
        self.decisions.iter().filter(|d| d.status.is_error())
    }

    /// Returns the number of upgrades
    pub fn upgrade_count(&self) -> usize {
        self.upgrades().count()
    }

    /// Returns true if any upgrade was proposed
    pub fn has_upgrades(&self) -> bool {
        self.upgrade_count() > 0
    }

    /// Number of non-fatal errors for this manifest
    pub fn error_count(&self) -> usize {
        self.warnings().count() + usize::from(self.error.is_some())
    }
}

/// Overall summary of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Results for each manifest, in discovery order
    pub manifests: Vec<ManifestReport>,
    /// Whether upgrades were only reported, not written
    pub dry_run: bool,
}

impl RunSummary {
    /// Creates a new RunSummary
    pub fn new(dry_run: bool) -> Self {
        Self {
            manifests: Vec::new(),
            dry_run,
        }
    }

    /// Adds a manifest report
    pub fn add_manifest(&mut self, manifest: ManifestReport) {
        self.manifests.push(manifest);
    }

    /// Returns the total number of upgrades
    pub fn total_upgrades(&self) -> usize {
        self.manifests.iter().map(|m| m.upgrade_count()).sum()
    }

    /// Returns the total number of non-fatal errors
    pub fn total_errors(&self) -> usize {
        self.manifests.iter().map(|m| m.error_count()).sum()
    }

    /// Returns the total number of dependencies evaluated
    pub fn total_dependencies(&self) -> usize {
        self.manifests.iter().map(|m| m.decisions.len()).sum()
    }

    /// Returns true if any non-fatal error occurred
    pub fn has_errors(&self) -> bool {
        self.total_errors() > 0
    }

    /// Upgrades that were proposed but not written to disk
    pub fn pending_upgrades(&self) -> usize {
        self.manifests
            .iter()
            .filter(|m| !m.written && m.doctor.is_none())
            .map(|m| m.upgrade_count())
            .sum()
    }

    /// Manifests that were rewritten
    pub fn written_manifests(&self) -> impl Iterator<Item = &ManifestReport> {
        self.manifests.iter().filter(|m| m.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DecisionStatus, DepSection};
    use semver::Version;

    fn upgrade(name: &str) -> UpgradeDecision {
        UpgradeDecision::upgrade(name, DepSection::Prod, "^1.0.0", "^2.0.0", Version::new(2, 0, 0))
    }

    fn not_found(name: &str) -> UpgradeDecision {
        UpgradeDecision::keep(name, DepSection::Prod, "^1.0.0", DecisionStatus::NotFound)
    }

    #[test]
    fn test_manifest_report_counts() {
        let report = ManifestReport::new("package.json", vec![upgrade("a"), not_found("b")]);
        assert_eq!(report.upgrade_count(), 1);
        assert_eq!(report.error_count(), 1);
        assert!(report.has_upgrades());
    }

    #[test]
    fn test_failed_manifest_counts_as_error() {
        let report = ManifestReport::failed("pkg/package.json", "invalid JSON");
        assert_eq!(report.error_count(), 1);
        assert!(!report.has_upgrades());
    }

    #[test]
    fn test_run_summary_totals() {
        let mut summary = RunSummary::new(true);
        summary.add_manifest(ManifestReport::new("a/package.json", vec![upgrade("x")]));
        let mut written = ManifestReport::new("b/package.json", vec![upgrade("y"), upgrade("z")]);
        written.written = true;
        summary.add_manifest(written);

        assert_eq!(summary.total_upgrades(), 3);
        assert_eq!(summary.pending_upgrades(), 1);
        assert_eq!(summary.written_manifests().count(), 1);
        assert!(!summary.has_errors());
    }
}
