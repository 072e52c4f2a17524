//! JSON output formatter for machine processing
//!
//! This module provides:
//! - JSON serialization of run summaries
//! - Per-manifest upgrades, warnings and doctor results

use crate::domain::{DoctorReport, ManifestReport, RunSummary, UpgradeDecision};
use crate::output::{OutputFormatter, Verbosity};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Verbosity level affects detail in output
    verbosity: Verbosity,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// JSON representation of the full run
#[derive(Serialize)]
struct JsonOutput {
    /// Whether upgrades were only reported
    dry_run: bool,
    /// Summary statistics
    summary: JsonSummary,
    /// Per-manifest results
    manifests: Vec<JsonManifest>,
}

/// JSON representation of summary statistics
#[derive(Serialize)]
struct JsonSummary {
    dependencies: usize,
    upgrades: usize,
    errors: usize,
}

/// JSON representation of a manifest report
#[derive(Serialize)]
struct JsonManifest {
    /// Path to the manifest file
    path: String,
    /// Whether the file was rewritten
    written: bool,
    upgrades: Vec<JsonDecision>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<JsonDecision>,
    /// Unchanged and passed-through entries (only in verbose mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unchanged: Vec<JsonDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doctor: Option<JsonDoctor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// JSON representation of one decision
#[derive(Serialize)]
struct JsonDecision {
    name: String,
    section: &'static str,
    from: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    status: String,
}

impl From<&UpgradeDecision> for JsonDecision {
    fn from(decision: &UpgradeDecision) -> Self {
        Self {
            name: decision.name.clone(),
            section: decision.section.json_key(),
            from: decision.from.clone(),
            to: decision.to.clone(),
            version: decision.to_version.as_ref().map(|v| v.to_string()),
            status: decision.status.to_string(),
        }
    }
}

#[derive(Serialize)]
struct JsonDoctor {
    confirmed: Vec<JsonDecision>,
    rejected: Vec<JsonRejection>,
    rounds: usize,
    verifications: usize,
}

#[derive(Serialize)]
struct JsonRejection {
    #[serde(flatten)]
    decision: JsonDecision,
    /// Batch whose install or test run failed
    batch: Vec<String>,
    stage: String,
    command: String,
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

impl JsonFormatter {
    fn doctor_to_json(&self, doctor: &DoctorReport) -> JsonDoctor {
        JsonDoctor {
            confirmed: doctor.confirmed.iter().map(JsonDecision::from).collect(),
            rejected: doctor
                .rejected
                .iter()
                .map(|rejection| {
                    let failure = &rejection.evidence.failure;
                    JsonRejection {
                        decision: JsonDecision::from(&rejection.decision),
                        batch: rejection.evidence.batch.clone(),
                        stage: failure.stage.to_string(),
                        command: failure.command.clone(),
                        exit_code: failure.exit_code,
                        output: (self.verbosity == Verbosity::Verbose)
                            .then(|| failure.output.clone()),
                    }
                })
                .collect(),
            rounds: doctor.rounds,
            verifications: doctor.verifications,
        }
    }

    /// Convert a manifest report to its JSON representation
    fn manifest_to_json(&self, manifest: &ManifestReport) -> JsonManifest {
        let unchanged = if self.verbosity == Verbosity::Verbose {
            manifest
                .decisions
                .iter()
                .filter(|d| !d.is_upgrade() && !d.status.is_error())
                .map(JsonDecision::from)
                .collect()
        } else {
            Vec::new()
        };

        JsonManifest {
            path: manifest.path.display().to_string(),
            written: manifest.written,
            upgrades: manifest.upgrades().map(JsonDecision::from).collect(),
            warnings: manifest.warnings().map(JsonDecision::from).collect(),
            unchanged,
            doctor: manifest.doctor.as_ref().map(|d| self.doctor_to_json(d)),
            error: manifest.error.clone(),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = JsonOutput {
            dry_run: summary.dry_run,
            summary: JsonSummary {
                dependencies: summary.total_dependencies(),
                upgrades: summary.total_upgrades(),
                errors: summary.total_errors(),
            },
            manifests: summary
                .manifests
                .iter()
                .map(|m| self.manifest_to_json(m))
                .collect(),
        };

        let json = serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)?;
        Ok(())
    }

    fn format_manifest(
        &self,
        manifest: &ManifestReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let output = self.manifest_to_json(manifest);
        let json = serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DecisionStatus, DepSection, FailureEvidence, PassthroughReason, Rejection,
    };
    use crate::error::{ProcessError, ProcessStage};
    use semver::Version;

    fn create_summary() -> RunSummary {
        let mut summary = RunSummary::new(true);
        summary.add_manifest(ManifestReport::new(
            "package.json",
            vec![
                UpgradeDecision::upgrade(
                    "lodash",
                    DepSection::Prod,
                    "^4.17.20",
                    "^4.17.21",
                    Version::new(4, 17, 21),
                ),
                UpgradeDecision::keep(
                    "ghost",
                    DepSection::Dev,
                    "^1.0.0",
                    DecisionStatus::NotFound,
                ),
                UpgradeDecision::keep(
                    "next",
                    DepSection::Prod,
                    "canary",
                    DecisionStatus::Passthrough(PassthroughReason::TagReference),
                ),
            ],
        ));
        summary
    }

    fn parse(formatter: &JsonFormatter, summary: &RunSummary) -> serde_json::Value {
        let mut output = Vec::new();
        formatter.format(summary, &mut output).unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn test_format_json() {
        let parsed = parse(&JsonFormatter::new(Verbosity::Normal), &create_summary());

        assert_eq!(parsed["dry_run"], true);
        assert_eq!(parsed["summary"]["dependencies"], 3);
        assert_eq!(parsed["summary"]["upgrades"], 1);
        assert_eq!(parsed["summary"]["errors"], 1);

        let manifest = &parsed["manifests"][0];
        assert_eq!(manifest["path"], "package.json");
        assert_eq!(manifest["written"], false);
        assert_eq!(manifest["upgrades"][0]["name"], "lodash");
        assert_eq!(manifest["upgrades"][0]["section"], "dependencies");
        assert_eq!(manifest["upgrades"][0]["to"], "^4.17.21");
        assert_eq!(manifest["upgrades"][0]["version"], "4.17.21");
        assert_eq!(manifest["warnings"][0]["status"], "not found");
        assert!(manifest["unchanged"].is_null());
        assert!(manifest["doctor"].is_null());
    }

    #[test]
    fn test_format_json_verbose() {
        let parsed = parse(&JsonFormatter::new(Verbosity::Verbose), &create_summary());
        let unchanged = &parsed["manifests"][0]["unchanged"];
        assert_eq!(unchanged[0]["name"], "next");
        assert_eq!(unchanged[0]["status"], "tag reference");
    }

    #[test]
    fn test_format_json_doctor() {
        let b = UpgradeDecision::upgrade("b", DepSection::Prod, "^1.0.0", "^2.0.0", Version::new(2, 0, 0));
        let mut report = ManifestReport::new("package.json", vec![b.clone()]);
        report.doctor = Some(DoctorReport {
            confirmed: Vec::new(),
            rejected: vec![Rejection {
                decision: b,
                evidence: FailureEvidence {
                    batch: vec!["b".to_string()],
                    failure: ProcessError {
                        stage: ProcessStage::Install,
                        command: "npm install".to_string(),
                        exit_code: Some(1),
                        output: "ERESOLVE".to_string(),
                    },
                },
            }],
            rounds: 1,
            verifications: 1,
        });

        let mut output = Vec::new();
        JsonFormatter::new(Verbosity::Normal)
            .format_manifest(&report, &mut output)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();

        let rejected = &parsed["doctor"]["rejected"][0];
        assert_eq!(rejected["name"], "b");
        assert_eq!(rejected["stage"], "install");
        assert_eq!(rejected["batch"][0], "b");
        assert_eq!(rejected["exit_code"], 1);
        assert!(rejected["output"].is_null());
    }

    #[test]
    fn test_format_json_manifest_error() {
        let mut summary = RunSummary::new(false);
        summary.add_manifest(ManifestReport::failed("a/package.json", "boom"));
        let parsed = parse(&JsonFormatter::new(Verbosity::Normal), &summary);
        assert_eq!(parsed["manifests"][0]["error"], "boom");
        assert_eq!(parsed["summary"]["errors"], 1);
    }
}
