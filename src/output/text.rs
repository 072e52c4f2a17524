//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Upgrade lines with the semantic change type (major/minor/patch)
//! - Per-dependency warnings (unknown package, invalid specifier, failed lookup)
//! - Doctor results: confirmed and rejected upgrades with failure evidence
//! - Summary with a change type breakdown

use crate::domain::{DepSection, DoctorReport, ManifestReport, RunSummary, UpgradeDecision};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Lines of captured output shown for a rejected upgrade in verbose mode
const EVIDENCE_LINES: usize = 20;

/// Semantic version change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChangeType {
    /// Major version change (breaking)
    Major,
    /// Minor version change (features)
    Minor,
    /// Patch version change (fixes)
    Patch,
    /// Unknown or unparseable
    Unknown,
}

impl VersionChangeType {
    /// Determine the change type between two specifiers or versions
    ///
    /// Range operators are ignored, so `^1.2.0` → `^2.0.0` is a major change.
    pub fn from_versions(old: &str, new: &str) -> Self {
        let parse = |v: &str| -> Option<(u64, u64)> {
            let v = v
                .trim_start_matches(|c: char| matches!(c, '^' | '~' | '>' | '<' | '=' | 'v' | ' '));
            let v = v.split_whitespace().next()?;
            let mut parts = v.split(['.', '-', '+']);
            let major = parts.next()?.parse().ok()?;
            let minor = match parts.next() {
                Some(minor) => minor.parse().unwrap_or(0),
                None => 0,
            };
            Some((major, minor))
        };

        match (parse(old), parse(new)) {
            (Some((old_major, old_minor)), Some((new_major, new_minor))) => {
                if new_major != old_major {
                    VersionChangeType::Major
                } else if new_minor != old_minor {
                    VersionChangeType::Minor
                } else {
                    VersionChangeType::Patch
                }
            }
            _ => VersionChangeType::Unknown,
        }
    }

    /// Change type of an upgrade decision
    pub fn of(decision: &UpgradeDecision) -> Self {
        match &decision.to_version {
            Some(version) => Self::from_versions(&decision.from, &version.to_string()),
            None => Self::from_versions(&decision.from, &decision.to),
        }
    }

    /// Get the display label with color
    pub fn colored_label(&self) -> String {
        match self {
            VersionChangeType::Major => "major".red().bold().to_string(),
            VersionChangeType::Minor => "minor".yellow().to_string(),
            VersionChangeType::Patch => "patch".green().to_string(),
            VersionChangeType::Unknown => "?".dimmed().to_string(),
        }
    }

    /// Get the plain label
    pub fn label(&self) -> &'static str {
        match self {
            VersionChangeType::Major => "major",
            VersionChangeType::Minor => "minor",
            VersionChangeType::Patch => "patch",
            VersionChangeType::Unknown => "?",
        }
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn dimmed(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn section_marker(&self, section: DepSection) -> String {
        match section {
            DepSection::Prod => String::new(),
            other => format!(" {}", self.dimmed(&format!("({})", other.label()))),
        }
    }

    fn max_name_length<'a>(decisions: impl Iterator<Item = &'a UpgradeDecision>) -> usize {
        decisions.map(|d| d.name.len()).max().unwrap_or(0).max(20)
    }

    fn format_upgrade_line(
        &self,
        decision: &UpgradeDecision,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let change = VersionChangeType::of(decision);
        let section = self.section_marker(decision.section);
        if self.color {
            writeln!(
                writer,
                "  {:width$} {} {} {} [{}]{}",
                decision.name,
                decision.from.dimmed(),
                "→".dimmed(),
                decision.to.bright_white().bold(),
                change.colored_label(),
                section,
                width = width
            )
        } else {
            writeln!(
                writer,
                "  {:width$} {} -> {} [{}]{}",
                decision.name,
                decision.from,
                decision.to,
                change.label(),
                section,
                width = width
            )
        }
    }

    fn format_status_line(
        &self,
        decision: &UpgradeDecision,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let status = format!("({})", decision.status);
        if self.color && decision.status.is_error() {
            writeln!(
                writer,
                "  {} {:width$} {} {}",
                "⚠".yellow(),
                decision.name,
                decision.from.dimmed(),
                status.yellow(),
                width = width.saturating_sub(2)
            )
        } else if self.color {
            writeln!(
                writer,
                "  {} {} {}",
                format!("{:width$}", decision.name, width = width).dimmed(),
                decision.from.dimmed(),
                status.dimmed()
            )
        } else {
            writeln!(
                writer,
                "  {:width$} {} {}",
                decision.name,
                decision.from,
                status,
                width = width
            )
        }
    }

    fn format_doctor(&self, doctor: &DoctorReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let headline = format!(
            "Doctor: {} confirmed, {} rejected ({} verification(s), depth {})",
            doctor.confirmed.len(),
            doctor.rejected.len(),
            doctor.verifications,
            doctor.rounds
        );
        if self.color {
            writeln!(writer, "  {}", headline.cyan())?;
        } else {
            writeln!(writer, "  {}", headline)?;
        }

        for rejection in &doctor.rejected {
            let decision = &rejection.decision;
            let evidence = &rejection.evidence;
            let line = format!(
                "{} {} → {}: {} (batch: {})",
                decision.name,
                decision.from,
                decision.to,
                evidence.failure,
                evidence.batch.join(", ")
            );
            if self.color {
                writeln!(writer, "  {} {}", "✗".red(), line)?;
            } else {
                writeln!(writer, "  x {}", line)?;
            }

            if self.verbosity == Verbosity::Verbose {
                let lines: Vec<&str> = evidence.failure.output.lines().collect();
                let start = lines.len().saturating_sub(EVIDENCE_LINES);
                for output in &lines[start..] {
                    writeln!(writer, "      {}", self.dimmed(output))?;
                }
            }
        }
        Ok(())
    }

    fn format_summary(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let upgrades = summary.total_upgrades();
        let errors = summary.total_errors();
        let verb = if summary.dry_run { "available" } else { "applied" };

        if self.verbosity == Verbosity::Quiet {
            if upgrades == 0 {
                writeln!(writer, "{}", self.dimmed("All dependencies match their targets"))?;
            } else {
                writeln!(writer, "{} upgrade(s) {}", upgrades, verb)?;
            }
            return Ok(());
        }

        let (mut major, mut minor, mut patch, mut unknown) = (0, 0, 0, 0);
        for decision in summary.manifests.iter().flat_map(|m| m.upgrades()) {
            match VersionChangeType::of(decision) {
                VersionChangeType::Major => major += 1,
                VersionChangeType::Minor => minor += 1,
                VersionChangeType::Patch => patch += 1,
                VersionChangeType::Unknown => unknown += 1,
            }
        }

        if self.color {
            writeln!(writer, "{}:", "Summary".bold())?;
        } else {
            writeln!(writer, "Summary:")?;
        }

        if upgrades > 0 {
            let mut parts = Vec::new();
            for (count, label) in [(major, "major"), (minor, "minor"), (patch, "patch"), (unknown, "other")] {
                if count > 0 {
                    parts.push(format!("{} {}", count, label));
                }
            }
            let count = if self.color {
                upgrades.to_string().green().to_string()
            } else {
                upgrades.to_string()
            };
            writeln!(writer, "  {} upgrade(s) {} ({})", count, verb, parts.join(", "))?;
        } else {
            writeln!(writer, "  {}", self.dimmed("All dependencies match their targets"))?;
        }

        if errors > 0 {
            let line = format!("{} error(s)", errors);
            if self.color {
                writeln!(writer, "  {}", line.yellow())?;
            } else {
                writeln!(writer, "  {}", line)?;
            }
        }

        if summary.dry_run && upgrades > 0 {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                self.dimmed("Run with -u to upgrade package.json, or --doctor to verify each upgrade")
            )?;
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet {
            for manifest in &summary.manifests {
                self.format_manifest(manifest, writer)?;
            }
        }
        self.format_summary(summary, writer)
    }

    fn format_manifest(
        &self,
        manifest: &ManifestReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let upgrades: Vec<_> = manifest.upgrades().collect();
        let warnings: Vec<_> = manifest.warnings().collect();
        let others: Vec<_> = if self.verbosity == Verbosity::Verbose {
            manifest
                .decisions
                .iter()
                .filter(|d| !d.is_upgrade() && !d.status.is_error())
                .collect()
        } else {
            Vec::new()
        };

        if upgrades.is_empty()
            && warnings.is_empty()
            && others.is_empty()
            && manifest.error.is_none()
            && manifest.doctor.is_none()
        {
            return Ok(());
        }

        let path = manifest.path.display().to_string();
        let counts = format!(
            "{} upgrade(s), {} warning(s)",
            upgrades.len(),
            warnings.len()
        );
        if self.color {
            writeln!(writer, "{} {}", path.bold(), counts.dimmed())?;
        } else {
            writeln!(writer, "{} {}", path, counts)?;
        }

        if let Some(error) = &manifest.error {
            if self.color {
                writeln!(writer, "  {} {}", "✗".red(), error)?;
            } else {
                writeln!(writer, "  x {}", error)?;
            }
        }

        let width = Self::max_name_length(manifest.decisions.iter());
        for decision in &upgrades {
            self.format_upgrade_line(decision, width, writer)?;
        }
        for decision in warnings.iter().chain(others.iter()) {
            self.format_status_line(decision, width, writer)?;
        }

        if let Some(doctor) = &manifest.doctor {
            self.format_doctor(doctor, writer)?;
        }

        writeln!(writer)?;
        Ok(())
    }
}
