//! Doctor session: verify upgrades with install + test, bisecting failures
//!
//! States: Init → Snapshot → SelectBatch → Install → Test → {Commit | Revert}
//! → ... → Done | Fatal. All pending upgrades are first tried together; a
//! failing batch is reverted and split in halves until the failures are
//! isolated. When the left half of a failing batch passes, the right half is
//! known to fail on the new base and is split without being re-tested.

use super::{ensure_clean, Installer, Snapshot, Verifier, WorkingTree};
use crate::differ::apply_decisions;
use crate::domain::{DoctorReport, FailureEvidence, Rejection, UpgradeDecision};
use crate::error::{DoctorError, ProcessError};
use crate::manifest::{write_manifest, ManifestDocument};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Verification controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorState {
    Init,
    Snapshot,
    SelectBatch,
    Install,
    Test,
    Commit,
    Revert,
    Done,
    Fatal,
}

impl fmt::Display for DoctorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DoctorState::Init => "INIT",
            DoctorState::Snapshot => "SNAPSHOT",
            DoctorState::SelectBatch => "SELECT_BATCH",
            DoctorState::Install => "INSTALL",
            DoctorState::Test => "TEST",
            DoctorState::Commit => "COMMIT",
            DoctorState::Revert => "REVERT",
            DoctorState::Done => "DONE",
            DoctorState::Fatal => "FATAL",
        };
        write!(f, "{}", name)
    }
}

/// External collaborators of a session
#[derive(Clone)]
pub struct DoctorTools {
    pub installer: Arc<dyn Installer>,
    pub verifier: Arc<dyn Verifier>,
    pub working_tree: Arc<dyn WorkingTree>,
}

type Step<'a> = Pin<Box<dyn Future<Output = Result<bool, DoctorError>> + Send + 'a>>;

/// One doctor run over one manifest
pub struct DoctorSession {
    /// Manifest as it was before the session
    document: ManifestDocument,
    /// Lock files restored together with the manifest
    lock_paths: Vec<PathBuf>,
    tools: DoctorTools,
    state: DoctorState,
    /// Working tree was found clean
    preflight_passed: bool,
    /// Last confirmed-safe state
    snapshot: Option<Snapshot>,
    confirmed: Vec<UpgradeDecision>,
    rejected: Vec<Rejection>,
    rounds: usize,
    verifications: usize,
    /// Installed packages may not match the manifest after a revert
    needs_reinstall: bool,
}

impl DoctorSession {
    /// Create a session for a manifest
    pub fn new(document: ManifestDocument, lock_paths: Vec<PathBuf>, tools: DoctorTools) -> Self {
        Self {
            document,
            lock_paths,
            tools,
            state: DoctorState::Init,
            preflight_passed: false,
            snapshot: None,
            confirmed: Vec::new(),
            rejected: Vec::new(),
            rounds: 0,
            verifications: 0,
            needs_reinstall: false,
        }
    }

    /// Current state
    pub fn state(&self) -> DoctorState {
        self.state
    }

    /// Check that rollback can be trusted: the working tree must be clean
    pub async fn preflight(&mut self) -> Result<(), DoctorError> {
        let dir = self.dir().to_path_buf();
        match ensure_clean(self.tools.working_tree.as_ref(), &dir).await {
            Ok(()) => {
                self.preflight_passed = true;
                Ok(())
            }
            Err(e) => Err(self.fatal(e)),
        }
    }

    /// Skip the working tree check; the caller already found the tree clean
    ///
    /// Used when several sessions run over one tree: changes committed by an
    /// earlier session must not count as dirty for the next one.
    pub fn assume_clean(&mut self) {
        self.preflight_passed = true;
    }

    /// Verify the upgrade decisions and keep the ones that pass
    ///
    /// Non-upgrade decisions are ignored. On timeout the manifest and lock
    /// files are restored to the last committed state.
    pub async fn run(
        &mut self,
        decisions: Vec<UpgradeDecision>,
        deadline: Option<Instant>,
    ) -> Result<DoctorReport, DoctorError> {
        if !self.preflight_passed {
            self.preflight().await?;
        }
        let candidates: Vec<UpgradeDecision> =
            decisions.into_iter().filter(|d| d.is_upgrade()).collect();

        let outcome = match deadline {
            Some(deadline) => {
                let raced = tokio::time::timeout_at(deadline, self.drive(candidates)).await;
                match raced {
                    Ok(result) => result,
                    Err(_) => Err(self.abort_on_timeout()),
                }
            }
            None => self.drive(candidates).await,
        };

        match outcome {
            Ok(()) => {
                self.transition(DoctorState::Done);
                info!(
                    "doctor: {} confirmed, {} rejected in {} verification(s)",
                    self.confirmed.len(),
                    self.rejected.len(),
                    self.verifications
                );
                Ok(self.report())
            }
            Err(e) => Err(self.fatal(e)),
        }
    }

    /// Outcome so far
    pub fn report(&self) -> DoctorReport {
        DoctorReport {
            confirmed: self.confirmed.clone(),
            rejected: self.rejected.clone(),
            rounds: self.rounds,
            verifications: self.verifications,
        }
    }

    async fn drive(&mut self, candidates: Vec<UpgradeDecision>) -> Result<(), DoctorError> {
        self.transition(DoctorState::Snapshot);
        self.snapshot = Some(self.capture()?);
        if candidates.is_empty() {
            return Ok(());
        }

        self.baseline().await?;
        // Baseline install may normalise the lock file
        self.snapshot = Some(self.capture()?);

        self.bisect(candidates, 1, None).await?;

        if self.needs_reinstall {
            self.transition(DoctorState::Install);
            let dir = self.dir().to_path_buf();
            self.tools.installer.install(&dir).await.map_err(|e| {
                DoctorError::restore(
                    self.document.path(),
                    format!("restored state does not install: {}", e),
                )
            })?;
            self.needs_reinstall = false;
        }
        Ok(())
    }

    async fn baseline(&mut self) -> Result<(), DoctorError> {
        info!("doctor: verifying {} before upgrading", self.document.path().display());
        let dir = self.dir().to_path_buf();
        self.transition(DoctorState::Install);
        self.tools
            .installer
            .install(&dir)
            .await
            .map_err(|source| DoctorError::BaselineFailed { source })?;
        self.transition(DoctorState::Test);
        self.tools
            .verifier
            .verify(&dir)
            .await
            .map_err(|source| DoctorError::BaselineFailed { source })
    }

    /// Try a batch; resolves to true when the whole batch passed at once
    fn bisect(
        &mut self,
        batch: Vec<UpgradeDecision>,
        depth: usize,
        known_failure: Option<FailureEvidence>,
    ) -> Step<'_> {
        Box::pin(async move {
            if batch.is_empty() {
                return Ok(true);
            }
            self.transition(DoctorState::SelectBatch);
            debug!(
                "doctor: depth {} batch [{}]{}",
                depth,
                names(&batch).join(", "),
                if known_failure.is_some() { " (known to fail)" } else { "" }
            );

            let evidence = match known_failure {
                Some(evidence) => evidence,
                None => match self.trial(&batch, depth).await? {
                    None => {
                        self.commit(batch)?;
                        return Ok(true);
                    }
                    Some(failure) => {
                        self.revert()?;
                        FailureEvidence {
                            batch: names(&batch),
                            failure,
                        }
                    }
                },
            };

            if batch.len() == 1 {
                for decision in batch {
                    warn!("doctor: rejecting {}", decision);
                    self.rejected.push(Rejection {
                        decision,
                        evidence: evidence.clone(),
                    });
                }
                return Ok(false);
            }

            let mut left = batch;
            let right = left.split_off(left.len().div_ceil(2));
            let left_passed = self.bisect(left, depth + 1, None).await?;
            let right_known = left_passed.then_some(evidence);
            self.bisect(right, depth + 1, right_known).await?;
            Ok(false)
        })
    }

    /// Write confirmed + batch, install and test; returns the failure, if any
    async fn trial(
        &mut self,
        batch: &[UpgradeDecision],
        depth: usize,
    ) -> Result<Option<ProcessError>, DoctorError> {
        self.rounds = self.rounds.max(depth);
        self.verifications += 1;

        let trial = apply_decisions(&self.document, self.confirmed.iter().chain(batch))?;
        write_manifest(self.document.path(), trial.text())?;

        let dir = self.dir().to_path_buf();
        self.transition(DoctorState::Install);
        if let Err(failure) = self.tools.installer.install(&dir).await {
            return Ok(Some(failure));
        }
        self.transition(DoctorState::Test);
        Ok(self.tools.verifier.verify(&dir).await.err())
    }

    fn commit(&mut self, batch: Vec<UpgradeDecision>) -> Result<(), DoctorError> {
        self.transition(DoctorState::Commit);
        info!("doctor: confirmed [{}]", names(&batch).join(", "));
        self.confirmed.extend(batch);
        self.snapshot = Some(self.capture()?);
        self.needs_reinstall = false;
        Ok(())
    }

    fn revert(&mut self) -> Result<(), DoctorError> {
        self.transition(DoctorState::Revert);
        self.snapshot
            .as_ref()
            .ok_or_else(|| DoctorError::restore(self.document.path(), "no snapshot taken"))?
            .restore()?;
        self.needs_reinstall = true;
        Ok(())
    }

    fn abort_on_timeout(&mut self) -> DoctorError {
        self.transition(DoctorState::Revert);
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.restore() {
                return e;
            }
        }
        warn!(
            "doctor: timed out, {} restored to the last confirmed state; reinstall to resync packages",
            self.document.path().display()
        );
        DoctorError::Timeout {
            confirmed: self.confirmed.len(),
        }
    }

    fn capture(&self) -> Result<Snapshot, DoctorError> {
        Snapshot::capture(
            std::iter::once(self.document.path()).chain(self.lock_paths.iter().map(PathBuf::as_path)),
        )
    }

    fn dir(&self) -> &Path {
        self.document.dir()
    }

    fn fatal(&mut self, error: DoctorError) -> DoctorError {
        self.transition(DoctorState::Fatal);
        error
    }

    fn transition(&mut self, next: DoctorState) {
        debug!("doctor: {} -> {}", self.state, next);
        self.state = next;
    }
}

fn names(batch: &[UpgradeDecision]) -> Vec<String> {
    batch.iter().map(|d| d.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DepSection;
    use crate::error::ProcessStage;
    use async_trait::async_trait;
    use semver::Version;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
  "name": "app",
  "dependencies": {
    "a": "^1.0.0",
    "b": "^1.0.0",
    "c": "^1.0.0"
  }
}
"#;

    /// Fails whenever package.json contains any of the given texts
    #[derive(Default)]
    struct FailWhen {
        needles: Vec<String>,
        stage: Option<ProcessStage>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FailWhen {
        fn new(stage: ProcessStage, needles: &[&str]) -> Self {
            Self {
                needles: needles.iter().map(|n| n.to_string()).collect(),
                stage: Some(stage),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn check(&self, dir: &Path) -> Result<(), ProcessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = fs::read_to_string(dir.join("package.json")).unwrap();
            if self.needles.iter().any(|n| content.contains(n.as_str())) {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                return Err(ProcessError {
                    stage: self.stage.unwrap_or(ProcessStage::Test),
                    command: "fake".to_string(),
                    exit_code: Some(1),
                    output: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Installer for FailWhen {
        async fn install(&self, dir: &Path) -> Result<(), ProcessError> {
            self.check(dir).await
        }
    }

    #[async_trait]
    impl Verifier for FailWhen {
        async fn verify(&self, dir: &Path) -> Result<(), ProcessError> {
            self.check(dir).await
        }
    }

    struct FixedTree(Vec<String>);

    #[async_trait]
    impl WorkingTree for FixedTree {
        async fn changes(&self, _dir: &Path) -> Result<Vec<String>, DoctorError> {
            Ok(self.0.clone())
        }
    }

    struct Fixture {
        dir: TempDir,
        installer: Arc<FailWhen>,
        verifier: Arc<FailWhen>,
    }

    impl Fixture {
        fn new(installer: FailWhen, verifier: FailWhen) -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("package.json"), MANIFEST).unwrap();
            Self {
                dir,
                installer: Arc::new(installer),
                verifier: Arc::new(verifier),
            }
        }

        fn session(&self, changes: &[&str]) -> DoctorSession {
            let document = ManifestDocument::load(&self.dir.path().join("package.json")).unwrap();
            let tools = DoctorTools {
                installer: self.installer.clone(),
                verifier: self.verifier.clone(),
                working_tree: Arc::new(FixedTree(
                    changes.iter().map(|c| c.to_string()).collect(),
                )),
            };
            DoctorSession::new(
                document,
                vec![self.dir.path().join("package-lock.json")],
                tools,
            )
        }

        fn manifest(&self) -> String {
            fs::read_to_string(self.dir.path().join("package.json")).unwrap()
        }
    }

    fn upgrades(names: &[&str]) -> Vec<UpgradeDecision> {
        names
            .iter()
            .map(|name| {
                UpgradeDecision::upgrade(*name, DepSection::Prod, "^1.0.0", "^2.0.0", Version::new(2, 0, 0))
            })
            .collect()
    }

    fn confirmed_names(report: &DoctorReport) -> Vec<&str> {
        report.confirmed.iter().map(|d| d.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_isolates_single_breaking_upgrade() {
        let fixture = Fixture::new(
            FailWhen::default(),
            FailWhen::new(ProcessStage::Test, &[r#""b": "^2.0.0""#]),
        );
        let mut session = fixture.session(&[]);
        let report = session.run(upgrades(&["a", "b", "c"]), None).await.unwrap();

        assert_eq!(session.state(), DoctorState::Done);
        assert_eq!(confirmed_names(&report), vec!["a", "c"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].decision.name, "b");
        assert_eq!(report.rejected[0].evidence.failure.output, "boom");
        // ceil(log2 3) + 1
        assert!(report.rounds <= 3);
        // ABC, AB, A, C
        assert_eq!(report.verifications, 4);

        let manifest = fixture.manifest();
        assert!(manifest.contains(r#""a": "^2.0.0""#));
        assert!(manifest.contains(r#""b": "^1.0.0""#));
        assert!(manifest.contains(r#""c": "^2.0.0""#));
    }

    #[tokio::test]
    async fn test_all_passing_upgrades_take_one_round() {
        let fixture = Fixture::new(FailWhen::default(), FailWhen::default());
        let mut session = fixture.session(&[]);
        let report = session.run(upgrades(&["a", "b", "c"]), None).await.unwrap();

        assert_eq!(confirmed_names(&report), vec!["a", "b", "c"]);
        assert!(report.rejected.is_empty());
        assert_eq!(report.rounds, 1);
        assert_eq!(report.verifications, 1);
        // baseline + one trial
        assert_eq!(fixture.installer.calls(), 2);
        assert_eq!(fixture.verifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_every_upgrade_failing() {
        let fixture = Fixture::new(
            FailWhen::default(),
            FailWhen::new(ProcessStage::Test, &["^2.0.0"]),
        );
        let mut session = fixture.session(&[]);
        let report = session.run(upgrades(&["a", "b", "c"]), None).await.unwrap();

        assert!(report.confirmed.is_empty());
        assert_eq!(report.rejected.len(), 3);
        assert_eq!(fixture.manifest(), MANIFEST);
        // baseline, trials, final reinstall after the last revert
        assert_eq!(fixture.installer.calls(), 1 + report.verifications + 1);
    }

    #[tokio::test]
    async fn test_install_failure_is_attributed_to_batch() {
        let fixture = Fixture::new(
            FailWhen::new(ProcessStage::Install, &[r#""c": "^2.0.0""#]),
            FailWhen::default(),
        );
        let mut session = fixture.session(&[]);
        let report = session.run(upgrades(&["a", "b", "c"]), None).await.unwrap();

        assert_eq!(confirmed_names(&report), vec!["a", "b"]);
        assert_eq!(report.rejected[0].decision.name, "c");
        assert_eq!(report.rejected[0].evidence.failure.stage, ProcessStage::Install);
    }

    #[tokio::test]
    async fn test_interaction_failure_reports_failing_batch() {
        // a and b only fail together
        #[derive(Default)]
        struct Pair(AtomicUsize);

        #[async_trait]
        impl Verifier for Pair {
            async fn verify(&self, dir: &Path) -> Result<(), ProcessError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                let content = fs::read_to_string(dir.join("package.json")).unwrap();
                if content.contains(r#""a": "^2.0.0""#) && content.contains(r#""b": "^2.0.0""#) {
                    return Err(ProcessError {
                        stage: ProcessStage::Test,
                        command: "fake".to_string(),
                        exit_code: Some(1),
                        output: String::new(),
                    });
                }
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), MANIFEST).unwrap();
        let document = ManifestDocument::load(&dir.path().join("package.json")).unwrap();
        let tools = DoctorTools {
            installer: Arc::new(FailWhen::default()),
            verifier: Arc::new(Pair::default()),
            working_tree: Arc::new(FixedTree(Vec::new())),
        };
        let mut session = DoctorSession::new(document, Vec::new(), tools);
        let report = session.run(upgrades(&["a", "b"]), None).await.unwrap();

        assert_eq!(confirmed_names(&report), vec!["a"]);
        assert_eq!(report.rejected[0].decision.name, "b");
        assert_eq!(report.rejected[0].evidence.batch, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_dirty_tree_is_fatal_before_any_mutation() {
        let fixture = Fixture::new(FailWhen::default(), FailWhen::default());
        let mut session = fixture.session(&["M package.json"]);
        let err = session.run(upgrades(&["a"]), None).await.unwrap_err();

        assert!(matches!(err, DoctorError::DirtyState { .. }));
        assert_eq!(session.state(), DoctorState::Fatal);
        assert_eq!(fixture.installer.calls(), 0);
        assert_eq!(fixture.verifier.calls(), 0);
        assert_eq!(fixture.manifest(), MANIFEST);
    }

    #[tokio::test]
    async fn test_assume_clean_skips_working_tree_check() {
        let fixture = Fixture::new(FailWhen::default(), FailWhen::default());
        let mut session = fixture.session(&["M nested/package.json"]);
        session.assume_clean();
        let report = session.run(upgrades(&["a"]), None).await.unwrap();

        assert_eq!(confirmed_names(&report), vec!["a"]);
        assert_eq!(session.state(), DoctorState::Done);
    }

    #[tokio::test]
    async fn test_failing_baseline_is_fatal() {
        let fixture = Fixture::new(
            FailWhen::default(),
            FailWhen::new(ProcessStage::Test, &["app"]),
        );
        let mut session = fixture.session(&[]);
        let err = session.run(upgrades(&["a"]), None).await.unwrap_err();

        assert!(matches!(err, DoctorError::BaselineFailed { .. }));
        assert_eq!(session.state(), DoctorState::Fatal);
        assert_eq!(fixture.manifest(), MANIFEST);
    }

    #[tokio::test]
    async fn test_no_candidates_skips_verification() {
        let fixture = Fixture::new(FailWhen::default(), FailWhen::default());
        let mut session = fixture.session(&[]);
        let report = session.run(Vec::new(), None).await.unwrap();

        assert_eq!(report, DoctorReport::default());
        assert_eq!(fixture.installer.calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout_reverts_uncommitted_batch() {
        let mut verifier = FailWhen::new(ProcessStage::Test, &["^2.0.0"]);
        verifier.delay = Some(Duration::from_secs(30));
        let fixture = Fixture::new(FailWhen::default(), verifier);
        let mut session = fixture.session(&[]);

        let deadline = Instant::now() + Duration::from_millis(300);
        let err = session
            .run(upgrades(&["a", "b"]), Some(deadline))
            .await
            .unwrap_err();

        assert!(matches!(err, DoctorError::Timeout { confirmed: 0 }));
        assert_eq!(session.state(), DoctorState::Fatal);
        assert_eq!(fixture.manifest(), MANIFEST);
    }
}
