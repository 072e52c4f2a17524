//! CLI argument parsing module for depdoctor

use crate::aggregator::{DoctorOptions, RunMode};
use crate::context::{RunContext, DEFAULT_CONCURRENCY};
use crate::domain::{DepSection, TargetPolicy};
use crate::engine::{CandidateFilter, DependencyFilter, NamePattern, PolicyConfig};
use crate::error::ConfigError;
use crate::manifest::{parse_duration, ProjectSettings, Scope};
use crate::prompt::{DecisionProvider, FixedDecision, TerminalPrompt};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Parse a release age such as `12h`, `10d`, `2w` or `1m`
fn parse_age(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| ConfigError::InvalidDuration { value: s.to_string() }.to_string())
}

/// Parse a target policy name or `@tag`
fn parse_policy(s: &str) -> Result<TargetPolicy, String> {
    s.parse::<TargetPolicy>().map_err(|e| e.to_string())
}

/// When to run the package manager after upgrades were written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InstallMode {
    /// Install without asking
    Always,
    /// Never install
    #[default]
    Never,
    /// Ask on the terminal
    Prompt,
}

/// Upgrade package.json dependencies, optionally verifying each upgrade
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depdoctor",
    version,
    about = "Upgrade package.json dependencies and keep only the ones that pass your tests"
)]
pub struct CliArgs {
    /// Project directory or package.json path (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // Target selection
    /// Target policy: latest, newest, greatest, minor, patch, semver or @<tag>
    #[arg(short, long, default_value = "latest", value_parser = parse_policy)]
    pub target: TargetPolicy,

    /// Per-dependency target, as <pattern>=<policy> (can be specified multiple times)
    #[arg(long = "target-for", value_name = "PATTERN=POLICY", action = ArgAction::Append)]
    pub target_for: Vec<String>,

    // Modes
    /// Write upgrades to package.json (default only reports them)
    #[arg(short, long)]
    pub upgrade: bool,

    /// Verify upgrades with install + test and write only the ones that pass
    #[arg(long)]
    pub doctor: bool,

    /// Install command used in doctor mode (default: <package manager> install)
    #[arg(long, value_name = "COMMAND", requires = "doctor")]
    pub doctor_install: Option<String>,

    /// Test command used in doctor mode (default: <package manager> test)
    #[arg(long, value_name = "COMMAND", requires = "doctor")]
    pub doctor_test: Option<String>,

    // Scope
    /// Also process every workspace package
    #[arg(short, long, conflicts_with = "deep")]
    pub workspaces: bool,

    /// Recursively process every package.json below the project
    #[arg(long)]
    pub deep: bool,

    // Package filters
    /// Only process packages matching these patterns (name, glob or /regex/)
    #[arg(short, long, value_delimiter = ',', action = ArgAction::Append)]
    pub filter: Vec<String>,

    /// Never process packages matching these patterns (name, glob or /regex/)
    #[arg(short = 'x', long, value_delimiter = ',', action = ArgAction::Append)]
    pub reject: Vec<String>,

    /// Sections to process: prod, dev, peer, optional, overrides (default: all)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub dep: Vec<String>,

    // Candidate filters
    /// Consider prerelease versions under every target policy
    #[arg(long)]
    pub pre: bool,

    /// Consider deprecated versions
    #[arg(long)]
    pub deprecated: bool,

    /// Only upgrade to versions released at least this long ago (e.g., 12h, 10d, 2w, 1m)
    #[arg(long, value_parser = parse_age)]
    pub age: Option<Duration>,

    // Registry
    /// Registry base URL (default: .npmrc registry or the public npm registry)
    #[arg(long)]
    pub registry: Option<String>,

    /// Maximum number of concurrent registry requests
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    // Install option
    /// Run the package manager after upgrading: always, never or prompt
    #[arg(
        long,
        value_enum,
        default_value = "never",
        num_args = 0..=1,
        default_missing_value = "always"
    )]
    pub install: InstallMode,

    /// Exit code policy: 1 fails on errors only, 2 also fails when upgrades are pending
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub error_level: u8,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Manifests covered by the run
    pub fn scope(&self) -> Scope {
        if self.deep {
            Scope::Deep
        } else if self.workspaces {
            Scope::Workspaces
        } else {
            Scope::Single
        }
    }

    /// What the run does with decisions
    pub fn mode(&self) -> RunMode {
        if self.doctor {
            RunMode::Doctor(DoctorOptions {
                install: self.doctor_install.clone(),
                test: self.doctor_test.clone(),
            })
        } else if self.upgrade {
            RunMode::Upgrade
        } else {
            RunMode::Check
        }
    }

    /// Source of the post-upgrade install confirmation
    pub fn decisions(&self) -> Arc<dyn DecisionProvider> {
        match self.install {
            InstallMode::Always => Arc::new(FixedDecision(true)),
            InstallMode::Never => Arc::new(FixedDecision(false)),
            InstallMode::Prompt => Arc::new(TerminalPrompt),
        }
    }

    /// Global target policy plus `--target-for` overrides
    pub fn policies(&self) -> Result<PolicyConfig, ConfigError> {
        self.target_for.iter().try_fold(
            PolicyConfig::new(self.target.clone()),
            |config, rule| {
                let (pattern, policy) = PolicyConfig::parse_rule(rule)?;
                Ok(config.with_rule(pattern, policy))
            },
        )
    }

    /// Name and section filters
    pub fn dependency_filter(&self) -> Result<DependencyFilter, ConfigError> {
        let patterns = |values: &[String]| -> Result<Vec<NamePattern>, ConfigError> {
            values.iter().map(|v| NamePattern::parse(v)).collect()
        };

        let mut sections = Vec::new();
        for name in &self.dep {
            let matched = DepSection::from_cli_name(&name.trim().to_lowercase()).ok_or_else(|| {
                ConfigError::InvalidSection {
                    value: name.clone(),
                }
            })?;
            for section in matched {
                if !sections.contains(section) {
                    sections.push(*section);
                }
            }
        }

        Ok(DependencyFilter::new()
            .with_filter(patterns(&self.filter)?)
            .with_reject(patterns(&self.reject)?)
            .with_sections(sections))
    }

    /// Candidate filters; `--age` wins over the project setting
    pub fn candidate_filter(&self, settings: &ProjectSettings) -> CandidateFilter {
        let filter = CandidateFilter::new()
            .with_prerelease(self.pre)
            .with_deprecated(self.deprecated);
        match self.age.or(settings.minimum_release_age) {
            Some(age) => filter.with_min_age(age),
            None => filter,
        }
    }

    /// Build the run configuration, merging the project settings
    pub fn run_context(&self, settings: &ProjectSettings) -> Result<RunContext, ConfigError> {
        let mut ctx = RunContext::new(self.policies()?)
            .with_filter(self.dependency_filter()?)
            .with_candidates(self.candidate_filter(settings))
            .with_concurrency(self.concurrency);

        if let Some(url) = self.registry.as_ref().or(settings.registry.as_ref()) {
            ctx = ctx.with_registry_url(url.trim_end_matches('/'));
        }
        if let Some(seconds) = self.timeout {
            ctx = ctx.with_timeout(Duration::from_secs(seconds));
        }
        Ok(ctx)
    }

    /// Reject option combinations the parser cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.json && self.install == InstallMode::Prompt {
            return Err(ConfigError::ConflictingOptions {
                message: "--install prompt cannot be combined with --json".to_string(),
            });
        }
        if self.timeout == Some(0) {
            return Err(ConfigError::ConflictingOptions {
                message: "--timeout must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["depdoctor"]);
        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.target, TargetPolicy::Latest);
        assert!(args.target_for.is_empty());
        assert!(!args.upgrade);
        assert!(!args.doctor);
        assert!(!args.workspaces);
        assert!(!args.deep);
        assert!(args.filter.is_empty());
        assert!(args.reject.is_empty());
        assert!(args.dep.is_empty());
        assert!(!args.pre);
        assert!(args.age.is_none());
        assert_eq!(args.concurrency, DEFAULT_CONCURRENCY);
        assert!(args.timeout.is_none());
        assert_eq!(args.install, InstallMode::Never);
        assert_eq!(args.error_level, 1);
        assert!(!args.json);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert_eq!(args.scope(), Scope::Single);
        assert_eq!(args.mode(), RunMode::Check);
    }

    #[test]
    fn test_path_argument() {
        let args = CliArgs::parse_from(["depdoctor", "/some/path"]);
        assert_eq!(args.path, PathBuf::from("/some/path"));
    }

    #[test]
    fn test_target_flags() {
        let args = CliArgs::parse_from(["depdoctor", "-t", "minor"]);
        assert_eq!(args.target, TargetPolicy::Minor);

        let args = CliArgs::parse_from(["depdoctor", "--target", "@next"]);
        assert_eq!(args.target, TargetPolicy::Tag("next".to_string()));

        assert!(CliArgs::try_parse_from(["depdoctor", "-t", "biggest"]).is_err());
    }

    #[test]
    fn test_target_for_rules() {
        let args = CliArgs::parse_from([
            "depdoctor",
            "-t",
            "minor",
            "--target-for",
            "react=patch",
            "--target-for",
            "@types/*=latest",
        ]);
        let policies = args.policies().unwrap();
        assert_eq!(policies.policy_for("react"), &TargetPolicy::Patch);
        assert_eq!(policies.policy_for("@types/node"), &TargetPolicy::Latest);
        assert_eq!(policies.policy_for("lodash"), &TargetPolicy::Minor);

        let args = CliArgs::parse_from(["depdoctor", "--target-for", "react"]);
        assert!(matches!(
            args.policies(),
            Err(ConfigError::InvalidTargetRule { .. })
        ));
    }

    #[test]
    fn test_modes() {
        let args = CliArgs::parse_from(["depdoctor", "-u"]);
        assert_eq!(args.mode(), RunMode::Upgrade);

        let args = CliArgs::parse_from([
            "depdoctor",
            "--doctor",
            "--doctor-test",
            "npm run test:unit",
        ]);
        assert_eq!(
            args.mode(),
            RunMode::Doctor(DoctorOptions {
                install: None,
                test: Some("npm run test:unit".to_string()),
            })
        );
    }

    #[test]
    fn test_doctor_commands_require_doctor() {
        assert!(CliArgs::try_parse_from(["depdoctor", "--doctor-test", "npm test"]).is_err());
    }

    #[test]
    fn test_scope_flags() {
        assert_eq!(
            CliArgs::parse_from(["depdoctor", "-w"]).scope(),
            Scope::Workspaces
        );
        assert_eq!(
            CliArgs::parse_from(["depdoctor", "--deep"]).scope(),
            Scope::Deep
        );
        assert!(CliArgs::try_parse_from(["depdoctor", "-w", "--deep"]).is_err());
    }

    #[test]
    fn test_filter_and_reject() {
        let args = CliArgs::parse_from([
            "depdoctor",
            "-f",
            "react,react-dom",
            "-x",
            "/^@internal//",
            "--dep",
            "prod,dev",
        ]);
        assert_eq!(args.filter, vec!["react", "react-dom"]);
        let filter = args.dependency_filter().unwrap();
        assert!(filter.should_process_package("react-dom"));
        assert!(!filter.should_process_package("lodash"));
        assert_eq!(filter.sections, vec![DepSection::Prod, DepSection::Dev]);

        let reject = CliArgs::parse_from(["depdoctor", "-x", "/^@internal//"])
            .dependency_filter()
            .unwrap();
        assert!(!reject.should_process_package("@internal/ui"));
        assert!(reject.should_process_package("@external/ui"));
    }

    #[test]
    fn test_dep_overrides_includes_resolutions() {
        let filter = CliArgs::parse_from(["depdoctor", "--dep", "overrides"])
            .dependency_filter()
            .unwrap();
        assert_eq!(
            filter.sections,
            vec![DepSection::Overrides, DepSection::Resolutions]
        );
    }

    #[test]
    fn test_invalid_dep_section() {
        let args = CliArgs::parse_from(["depdoctor", "--dep", "build"]);
        assert!(matches!(
            args.dependency_filter(),
            Err(ConfigError::InvalidSection { .. })
        ));
    }

    #[test]
    fn test_age_flag() {
        let args = CliArgs::parse_from(["depdoctor", "--age", "2w"]);
        assert_eq!(args.age, Some(Duration::from_secs(14 * 24 * 60 * 60)));

        assert!(CliArgs::try_parse_from(["depdoctor", "--age", "soon"]).is_err());
    }

    #[test]
    fn test_age_overrides_project_setting() {
        let settings = ProjectSettings {
            registry: None,
            minimum_release_age: Some(Duration::from_secs(60)),
        };

        let args = CliArgs::parse_from(["depdoctor"]);
        assert_eq!(
            args.candidate_filter(&settings).min_age,
            Some(Duration::from_secs(60))
        );

        let args = CliArgs::parse_from(["depdoctor", "--age", "1d", "--pre"]);
        let filter = args.candidate_filter(&settings);
        assert_eq!(filter.min_age, Some(Duration::from_secs(24 * 60 * 60)));
        assert!(filter.include_prerelease);
    }

    #[test]
    fn test_run_context_registry() {
        let settings = ProjectSettings {
            registry: Some("https://npm.internal.example".to_string()),
            minimum_release_age: None,
        };

        let ctx = CliArgs::parse_from(["depdoctor", "--concurrency", "0"])
            .run_context(&settings)
            .unwrap();
        assert_eq!(ctx.registry_url, "https://npm.internal.example");
        assert_eq!(ctx.concurrency, 1);
        assert!(ctx.deadline.is_none());

        let ctx = CliArgs::parse_from([
            "depdoctor",
            "--registry",
            "https://registry.example/",
            "--timeout",
            "30",
        ])
        .run_context(&settings)
        .unwrap();
        assert_eq!(ctx.registry_url, "https://registry.example");
        assert_eq!(ctx.timeout, Some(Duration::from_secs(30)));
        assert!(ctx.deadline.is_some());
    }

    #[test]
    fn test_install_flag() {
        assert_eq!(
            CliArgs::parse_from(["depdoctor", "--install"]).install,
            InstallMode::Always
        );
        assert_eq!(
            CliArgs::parse_from(["depdoctor", "--install", "prompt"]).install,
            InstallMode::Prompt
        );
        assert!(!CliArgs::parse_from(["depdoctor", "--install", "never"])
            .decisions()
            .confirm("install?", true));
    }

    #[test]
    fn test_error_level_range() {
        assert_eq!(
            CliArgs::parse_from(["depdoctor", "--error-level", "2"]).error_level,
            2
        );
        assert!(CliArgs::try_parse_from(["depdoctor", "--error-level", "3"]).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(CliArgs::parse_from(["depdoctor"]).validate().is_ok());
        assert!(CliArgs::parse_from(["depdoctor", "--json", "--install", "prompt"])
            .validate()
            .is_err());
        assert!(CliArgs::parse_from(["depdoctor", "--timeout", "0"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_quiet_flags() {
        assert!(CliArgs::parse_from(["depdoctor", "-q"]).quiet);
        assert!(CliArgs::parse_from(["depdoctor", "--quiet"]).quiet);
    }
}
