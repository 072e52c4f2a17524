//! Workspace and deep-scan aggregator
//!
//! This module coordinates a run: discover → load → diff → write or verify.
//! - One shared catalog cache for every manifest of the run
//! - A manifest that cannot be discovered or read is reported for that manifest only
//! - Doctor mode resolves every manifest's commands and checks the working
//!   tree once before any lookup, then runs manifests one after another
//! - Optional package manager install after upgrades, confirmed by a `DecisionProvider`

use crate::context::RunContext;
use crate::differ::{self, ManifestDiff};
use crate::doctor::{
    ensure_clean, DoctorCommands, DoctorSession, DoctorTools, GitWorkingTree, Installer,
    ShellCommand, WorkingTree,
};
use crate::domain::{ManifestReport, RunSummary};
use crate::error::{AppError, DoctorError, ProcessError};
use crate::manifest::{discover, project_dir, ManifestDocument, ManifestWriter, Scope};
use crate::package_manager::PackageManager;
use crate::progress::Progress;
use crate::prompt::{DecisionProvider, FixedDecision};
use crate::registry::{CachedProvider, CatalogProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What a run does with the decisions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Report only
    #[default]
    Check,
    /// Write upgrades to the manifests
    Upgrade,
    /// Write only upgrades that pass install + test
    Doctor(DoctorOptions),
}

/// Command overrides for doctor mode
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DoctorOptions {
    pub install: Option<String>,
    pub test: Option<String>,
}

/// A discovered manifest, ready to process or already failed
enum Job {
    Ready {
        document: ManifestDocument,
        session: Option<DoctorSession>,
    },
    Failed(ManifestReport),
}

/// Runs the differ (and optionally doctor mode) over every discovered manifest
pub struct Aggregator {
    ctx: RunContext,
    provider: Arc<dyn CatalogProvider>,
    scope: Scope,
    mode: RunMode,
    decisions: Arc<dyn DecisionProvider>,
    doctor_tools: Option<DoctorTools>,
    installer: Option<Arc<dyn Installer>>,
    show_progress: bool,
}

impl Aggregator {
    /// Create an aggregator; catalogs are cached for the lifetime of the aggregator
    pub fn new(ctx: RunContext, provider: Arc<dyn CatalogProvider>) -> Self {
        Self {
            ctx,
            provider: Arc::new(CachedProvider::new(provider)),
            scope: Scope::Single,
            mode: RunMode::Check,
            decisions: Arc::new(FixedDecision(false)),
            doctor_tools: None,
            installer: None,
            show_progress: false,
        }
    }

    /// Set which manifests are covered
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set what the run does with decisions
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the source of confirmations
    pub fn with_decisions(mut self, decisions: Arc<dyn DecisionProvider>) -> Self {
        self.decisions = decisions;
        self
    }

    /// Use these tools in doctor mode instead of shell commands
    pub fn with_doctor_tools(mut self, tools: DoctorTools) -> Self {
        self.doctor_tools = Some(tools);
        self
    }

    /// Use this installer after upgrades instead of the package manager
    pub fn with_installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Show spinners on stderr
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The run configuration
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Process every manifest under `root`
    pub async fn run(&self, root: &Path) -> Result<RunSummary, AppError> {
        let mut progress = Progress::new(self.show_progress);
        let mut summary = RunSummary::new(self.mode == RunMode::Check);

        progress.spinner("Discovering manifests...");
        let discovery = discover(root, self.scope);
        progress.finish_and_clear();
        let discovery = discovery?;

        for (path, error) in discovery.errors {
            warn!("{}", error);
            summary.add_manifest(ManifestReport::failed(path, error.to_string()));
        }

        let jobs = self.prepare(&discovery.manifests, root).await?;

        progress.start(jobs.len() as u64, "Checking manifests");
        for job in jobs {
            if self.ctx.is_expired() {
                progress.finish_and_clear();
                return Err(self.timeout());
            }
            match job {
                Job::Failed(report) => summary.add_manifest(report),
                Job::Ready { document, session } => {
                    progress.set_message(&format!("Checking {}", document.path().display()));
                    match self.process(document, session, &progress).await {
                        Ok(report) => summary.add_manifest(report),
                        Err(e) => {
                            progress.finish_and_clear();
                            return Err(e);
                        }
                    }
                }
            }
            progress.inc();
        }
        progress.finish_and_clear();

        Ok(summary)
    }

    /// Load every manifest and, in doctor mode, check its preconditions
    ///
    /// Nothing is fetched or changed here. A manifest that cannot be loaded
    /// or has no test command is reported on its own; the run only fails
    /// when no manifest can be verified at all or the working tree is dirty.
    async fn prepare(&self, paths: &[PathBuf], root: &Path) -> Result<Vec<Job>, AppError> {
        let mut jobs = Vec::with_capacity(paths.len());
        let mut first_missing = None;

        for path in paths {
            info!("loading {}", path.display());
            let document = match ManifestDocument::load(path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("{}", e);
                    jobs.push(Job::Failed(ManifestReport::failed(path, e.to_string())));
                    continue;
                }
            };

            let session = match &self.mode {
                RunMode::Doctor(options) => match self.doctor_session(&document, options) {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!("{}", e);
                        jobs.push(Job::Failed(ManifestReport::failed(path, e.to_string())));
                        first_missing.get_or_insert(e);
                        continue;
                    }
                },
                _ => None,
            };
            jobs.push(Job::Ready { document, session });
        }

        if matches!(self.mode, RunMode::Doctor(_)) {
            let verifiable = jobs
                .iter()
                .any(|job| matches!(job, Job::Ready { session: Some(_), .. }));
            if !verifiable {
                if let Some(e) = first_missing {
                    return Err(e.into());
                }
                return Ok(jobs);
            }

            // Checked once: later sessions see earlier commits as changes
            ensure_clean(self.working_tree().as_ref(), &project_dir(root)).await?;
            for job in &mut jobs {
                if let Job::Ready {
                    session: Some(session),
                    ..
                } = job
                {
                    session.assume_clean();
                }
            }
        }

        Ok(jobs)
    }

    async fn process(
        &self,
        document: ManifestDocument,
        session: Option<DoctorSession>,
        progress: &Progress,
    ) -> Result<ManifestReport, AppError> {
        let path = document.path().to_path_buf();
        info!("checking {}", path.display());

        let diff = self.diff(&document).await?;
        let mut report = ManifestReport::new(&path, Vec::new());

        match (&self.mode, session) {
            (RunMode::Doctor(_), Some(mut session)) => {
                progress.set_message(&format!("Verifying upgrades of {}", path.display()));
                let candidates = diff.upgrades().cloned().collect();
                let doctor = session.run(candidates, self.ctx.deadline).await?;
                report.written = !doctor.confirmed.is_empty();
                report.doctor = Some(doctor);
            }
            (RunMode::Upgrade, _) if diff.has_upgrades() => {
                match diff
                    .apply(&document)
                    .and_then(|updated| ManifestWriter::new(false).write(&updated))
                {
                    Ok(written) => report.written = written,
                    Err(e) => {
                        warn!("{}", e);
                        report.error = Some(e.to_string());
                    }
                }
            }
            _ => {}
        }

        report.decisions = diff.into_decisions();
        Ok(report)
    }

    async fn diff(&self, document: &ManifestDocument) -> Result<ManifestDiff, AppError> {
        let lookup = differ::diff(document, &self.ctx, Arc::clone(&self.provider));
        let diff = match self.ctx.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, lookup)
                .await
                .map_err(|_| self.timeout())??,
            None => lookup.await?,
        };
        Ok(diff)
    }

    fn timeout(&self) -> AppError {
        AppError::Timeout {
            after: self.ctx.timeout.unwrap_or_default(),
        }
    }

    /// Session for one manifest; its commands must resolve even when
    /// injected tools run them
    fn doctor_session(
        &self,
        document: &ManifestDocument,
        options: &DoctorOptions,
    ) -> Result<DoctorSession, DoctorError> {
        let package_manager = PackageManager::detect(document.dir());
        let commands = DoctorCommands::resolve(
            document,
            package_manager,
            options.install.as_deref(),
            options.test.as_deref(),
        )?;
        let tools = match &self.doctor_tools {
            Some(tools) => tools.clone(),
            None => commands.tools(),
        };
        Ok(DoctorSession::new(
            document.clone(),
            package_manager.lock_paths(document.dir()),
            tools,
        ))
    }

    fn working_tree(&self) -> Arc<dyn WorkingTree> {
        match &self.doctor_tools {
            Some(tools) => Arc::clone(&tools.working_tree),
            None => Arc::new(GitWorkingTree),
        }
    }

    /// Offer to run the package manager after upgrades were written
    ///
    /// Returns whether an install ran. Doctor mode installs as part of its
    /// own protocol and never asks.
    pub async fn install_after_upgrade(
        &self,
        summary: &RunSummary,
        root: &Path,
    ) -> Result<bool, ProcessError> {
        if self.mode != RunMode::Upgrade || summary.written_manifests().next().is_none() {
            return Ok(false);
        }

        let dir = project_dir(root);
        let package_manager = PackageManager::detect(&dir);
        let installer: Arc<dyn Installer> = match &self.installer {
            Some(installer) => Arc::clone(installer),
            None => Arc::new(ShellCommand::install(package_manager.install_command())),
        };

        let question = format!("Run `{}` now?", package_manager.install_command());
        if !self.decisions.confirm(&question, true) {
            return Ok(false);
        }
        info!("installing in {}", dir.display());
        installer.install(&dir).await?;
        Ok(true)
    }
}
