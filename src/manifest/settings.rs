//! Project settings read from the package manager configuration
//!
//! Reads (in priority order, first hit wins per setting):
//! - .npmrc (`registry=`, `minimum-release-age=10d`)
//! - pnpm-workspace.yaml (`minimumReleaseAge: 14400`, value in minutes)
//! - package.json (`pnpm.settings.minimumReleaseAge`)
//!
//! CLI flags take precedence over everything read here.

use super::workspace::PnpmWorkspace;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Settings that influence catalog lookups and candidate selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSettings {
    /// Registry base URL
    pub registry: Option<String>,
    /// Minimum release age for candidate versions
    pub minimum_release_age: Option<Duration>,
}

impl ProjectSettings {
    /// Read settings from a project directory
    pub fn from_dir(dir: &Path) -> Self {
        let npmrc = read_npmrc(dir);

        let registry = npmrc
            .get("registry")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let minimum_release_age = npmrc
            .get("minimum-release-age")
            .and_then(|value| parse_duration(value))
            .or_else(|| {
                PnpmWorkspace::read(dir)?
                    .minimum_release_age
                    .and_then(|value| parse_workspace_age(&value))
            })
            .or_else(|| read_package_json_minimum_release_age(dir));

        Self {
            registry,
            minimum_release_age,
        }
    }
}

/// Parse a duration like `12h`, `10d`, `2w` or `1m` (30 days)
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let unit = s.chars().last()?;
    let seconds_per_unit = match unit {
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        'w' => 7 * 24 * 60 * 60,
        'm' => 30 * 24 * 60 * 60,
        _ => return None,
    };
    let count: u64 = s[..s.len() - unit.len_utf8()].parse().ok()?;
    count.checked_mul(seconds_per_unit).map(Duration::from_secs)
}

/// `minimumReleaseAge` in pnpm-workspace.yaml: minutes, or a duration string
fn parse_workspace_age(value: &str) -> Option<Duration> {
    match value.parse::<u64>() {
        Ok(minutes) => minutes.checked_mul(60).map(Duration::from_secs),
        Err(_) => parse_duration(value),
    }
}

/// Key/value pairs of `.npmrc`, comments skipped and quotes removed
fn read_npmrc(dir: &Path) -> HashMap<String, String> {
    let Ok(content) = std::fs::read_to_string(dir.join(".npmrc")) else {
        return HashMap::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// `pnpm.settings.minimumReleaseAge` in package.json
fn read_package_json_minimum_release_age(dir: &Path) -> Option<Duration> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&content).ok()?;
    let age = json.get("pnpm")?.get("settings")?.get("minimumReleaseAge")?;
    match age {
        serde_json::Value::String(s) => parse_duration(s),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|minutes| minutes.checked_mul(60))
            .map(Duration::from_secs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DAY: u64 = 86_400;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("12h"), Some(Duration::from_secs(12 * 3600)));
        assert_eq!(parse_duration("10d"), Some(Duration::from_secs(10 * DAY)));
        assert_eq!(parse_duration("2w"), Some(Duration::from_secs(14 * DAY)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(30 * DAY)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("d"), None);
    }

    #[test]
    fn test_npmrc_registry_and_age() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".npmrc"),
            "# company mirror\nregistry=https://npm.example.com/\nminimum-release-age=\"2w\"\n",
        )
        .unwrap();

        let settings = ProjectSettings::from_dir(dir.path());
        assert_eq!(settings.registry.as_deref(), Some("https://npm.example.com"));
        assert_eq!(settings.minimum_release_age, Some(Duration::from_secs(14 * DAY)));
    }

    #[test]
    fn test_workspace_yaml_age_in_minutes() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pnpm-workspace.yaml"),
            "packages: []\nminimumReleaseAge: 14400\n",
        )
        .unwrap();

        let settings = ProjectSettings::from_dir(dir.path());
        assert_eq!(settings.minimum_release_age, Some(Duration::from_secs(14400 * 60)));
    }

    #[test]
    fn test_package_json_pnpm_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"pnpm": {"settings": {"minimumReleaseAge": "10d"}}}"#,
        )
        .unwrap();

        let settings = ProjectSettings::from_dir(dir.path());
        assert_eq!(settings.minimum_release_age, Some(Duration::from_secs(10 * DAY)));
    }

    #[test]
    fn test_npmrc_takes_priority() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".npmrc"), "minimum-release-age=10d\n").unwrap();
        fs::write(
            dir.path().join("pnpm-workspace.yaml"),
            "minimumReleaseAge: 60\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"pnpm": {"settings": {"minimumReleaseAge": "2w"}}}"#,
        )
        .unwrap();

        let settings = ProjectSettings::from_dir(dir.path());
        assert_eq!(settings.minimum_release_age, Some(Duration::from_secs(10 * DAY)));
    }

    #[test]
    fn test_no_settings() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ProjectSettings::from_dir(dir.path()), ProjectSettings::default());
    }
}
