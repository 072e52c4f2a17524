//! Manifest discovery for single projects, workspaces and deep scans
//!
//! Features:
//! - Workspace globs from package.json `workspaces` (array or `{ "packages": [...] }`)
//! - Workspace globs from pnpm-workspace.yaml `packages`
//! - `*`, `**`, `name-*` segments and `!` exclusions
//! - Deep mode: every package.json below the root, skipping node_modules and dot dirs

use crate::error::ManifestError;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Which manifests a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Only the root manifest
    #[default]
    Single,
    /// Root manifest plus declared workspace packages
    Workspaces,
    /// Every package.json below the root
    Deep,
}

/// Manifests found for a run
#[derive(Debug, Default)]
pub struct Discovery {
    /// Manifest paths, root first
    pub manifests: Vec<PathBuf>,
    /// Manifests whose discovery failed
    pub errors: Vec<(PathBuf, ManifestError)>,
}

/// The parts of pnpm-workspace.yaml this tool reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PnpmWorkspace {
    /// `packages` globs
    pub packages: Vec<String>,
    /// Raw `minimumReleaseAge` value
    pub minimum_release_age: Option<String>,
}

impl PnpmWorkspace {
    /// Read pnpm-workspace.yaml from a directory
    pub fn read(dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(dir.join("pnpm-workspace.yaml")).ok()?;
        Some(Self::parse(&content))
    }

    /// Line-based reading of the two keys; other YAML content is ignored
    fn parse(content: &str) -> Self {
        let mut workspace = Self::default();
        let mut in_packages = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if in_packages {
                if let Some(item) = trimmed.strip_prefix('-') {
                    workspace.packages.push(unquote(item).to_string());
                    continue;
                }
                in_packages = false;
            }

            if let Some(rest) = trimmed.strip_prefix("packages:") {
                let rest = rest.trim();
                if let Some(inline) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    workspace.packages.extend(
                        inline
                            .split(',')
                            .map(unquote)
                            .filter(|p| !p.is_empty())
                            .map(str::to_string),
                    );
                } else {
                    in_packages = true;
                }
            } else if let Some(value) = trimmed.strip_prefix("minimumReleaseAge:") {
                workspace.minimum_release_age = Some(unquote(value).to_string());
            }
        }

        workspace
    }
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"').trim_matches('\'')
}

/// Find the manifests covered by a run rooted at `root`
///
/// `root` may be a project directory or a package.json path. A missing root
/// manifest is an error for the whole run; a missing workspace declaration
/// is recorded against the root manifest only.
pub fn discover(root: &Path, scope: Scope) -> Result<Discovery, ManifestError> {
    let dir = project_dir(root);
    let root_manifest = if root.is_dir() {
        root.join(MANIFEST_FILE)
    } else {
        root.to_path_buf()
    };

    if !root_manifest.is_file() {
        return Err(ManifestError::not_found(&root_manifest));
    }

    let mut discovery = Discovery::default();
    match scope {
        Scope::Single => discovery.manifests.push(root_manifest),
        Scope::Workspaces => match workspace_patterns(&dir, &root_manifest) {
            Some(patterns) => {
                discovery.manifests.push(root_manifest.clone());
                for member in expand_patterns(&dir, &patterns) {
                    let manifest = member.join(MANIFEST_FILE);
                    if manifest.is_file() && manifest != root_manifest {
                        discovery.manifests.push(manifest);
                    }
                }
            }
            None => discovery.errors.push((
                root_manifest.clone(),
                ManifestError::workspace_error(
                    &root_manifest,
                    "no workspaces declared in package.json or pnpm-workspace.yaml",
                ),
            )),
        },
        Scope::Deep => {
            discovery.manifests.push(root_manifest.clone());
            let mut found = Vec::new();
            walk(&dir, &mut found);
            found.sort();
            discovery
                .manifests
                .extend(found.into_iter().filter(|m| *m != root_manifest));
        }
    }

    debug!(
        "discovered {} manifest(s) under {}",
        discovery.manifests.len(),
        dir.display()
    );
    Ok(discovery)
}

/// Project directory of a run root given as a directory or a package.json path
pub fn project_dir(root: &Path) -> PathBuf {
    if root.is_dir() {
        return root.to_path_buf();
    }
    root.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Workspace globs declared by the root, `None` when nothing is declared
fn workspace_patterns(dir: &Path, root_manifest: &Path) -> Option<Vec<String>> {
    let from_package_json = fs::read_to_string(root_manifest)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|json| {
            let workspaces = json.get("workspaces")?;
            let list = workspaces
                .as_array()
                .or_else(|| workspaces.get("packages")?.as_array())?;
            Some(
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            )
        });

    from_package_json
        .or_else(|| PnpmWorkspace::read(dir).map(|w| w.packages))
        .filter(|patterns| !patterns.is_empty())
}

/// Expand workspace globs into member directories, applying `!` exclusions
fn expand_patterns(dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut included = BTreeSet::new();
    let mut excluded = BTreeSet::new();
    for pattern in patterns {
        let (negated, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern.as_str()),
        };
        let segments: Vec<&str> = pattern
            .trim_start_matches("./")
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        let mut matches = Vec::new();
        expand_segments(dir, &segments, &mut matches);
        if negated {
            excluded.extend(matches);
        } else {
            included.extend(matches);
        }
    }
    included.difference(&excluded).cloned().collect()
}

fn expand_segments(base: &Path, segments: &[&str], out: &mut Vec<PathBuf>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(base.to_path_buf());
        return;
    };

    match *first {
        "**" => {
            expand_segments(base, rest, out);
            for child in child_dirs(base) {
                expand_segments(&child, segments, out);
            }
        }
        segment if segment.contains('*') => {
            let escaped: Vec<String> = segment.split('*').map(regex::escape).collect();
            let Ok(matcher) = Regex::new(&format!("^{}$", escaped.join(".*"))) else {
                return;
            };
            for child in child_dirs(base) {
                let matched = child
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| matcher.is_match(name));
                if matched {
                    expand_segments(&child, rest, out);
                }
            }
        }
        segment => {
            let child = base.join(segment);
            if child.is_dir() {
                expand_segments(&child, rest, out);
            }
        }
    }
}

/// Subdirectories, skipping node_modules and dot directories
fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name != "node_modules" && !name.starts_with('.'))
        })
        .collect();
    dirs.sort();
    dirs
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
    for child in child_dirs(dir) {
        let manifest = child.join(MANIFEST_FILE);
        if manifest.is_file() {
            found.push(manifest);
        }
        walk(&child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_package(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relative(dir: &Path, discovery: &Discovery) -> Vec<String> {
        discovery
            .manifests
            .iter()
            .map(|p| p.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_single_scope() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "package.json", "{}");
        let discovery = discover(dir.path(), Scope::Single).unwrap();
        assert_eq!(relative(dir.path(), &discovery), vec!["package.json"]);
    }

    #[test]
    fn test_root_may_be_a_file() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "package.json", "{}");
        let discovery = discover(&dir.path().join("package.json"), Scope::Single).unwrap();
        assert_eq!(discovery.manifests.len(), 1);
    }

    #[test]
    fn test_missing_root_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover(dir.path(), Scope::Single),
            Err(ManifestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_package_json_workspaces() {
        let dir = TempDir::new().unwrap();
        write_package(
            dir.path(),
            "package.json",
            r#"{"workspaces": ["packages/*", "tools/cli", "!packages/legacy"]}"#,
        );
        write_package(dir.path(), "packages/a/package.json", "{}");
        write_package(dir.path(), "packages/b/package.json", "{}");
        write_package(dir.path(), "packages/legacy/package.json", "{}");
        write_package(dir.path(), "packages/no-manifest/README.md", "");
        write_package(dir.path(), "tools/cli/package.json", "{}");

        let discovery = discover(dir.path(), Scope::Workspaces).unwrap();
        assert_eq!(
            relative(dir.path(), &discovery),
            vec![
                "package.json",
                "packages/a/package.json",
                "packages/b/package.json",
                "tools/cli/package.json"
            ]
        );
        assert!(discovery.errors.is_empty());
    }

    #[test]
    fn test_yarn_object_workspaces() {
        let dir = TempDir::new().unwrap();
        write_package(
            dir.path(),
            "package.json",
            r#"{"workspaces": {"packages": ["apps/web-*"]}}"#,
        );
        write_package(dir.path(), "apps/web-admin/package.json", "{}");
        write_package(dir.path(), "apps/api/package.json", "{}");

        let discovery = discover(dir.path(), Scope::Workspaces).unwrap();
        assert_eq!(
            relative(dir.path(), &discovery),
            vec!["package.json", "apps/web-admin/package.json"]
        );
    }

    #[test]
    fn test_pnpm_workspace_yaml() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "package.json", "{}");
        write_package(
            dir.path(),
            "pnpm-workspace.yaml",
            "packages:\n  - 'packages/**'\n  - \"!**/test/**\"\nminimumReleaseAge: 1440\n",
        );
        write_package(dir.path(), "packages/a/package.json", "{}");
        write_package(dir.path(), "packages/group/b/package.json", "{}");
        write_package(dir.path(), "packages/a/node_modules/dep/package.json", "{}");

        let discovery = discover(dir.path(), Scope::Workspaces).unwrap();
        assert_eq!(
            relative(dir.path(), &discovery),
            vec![
                "package.json",
                "packages/a/package.json",
                "packages/group/b/package.json"
            ]
        );
    }

    #[test]
    fn test_missing_workspace_declaration_is_manifest_error() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "package.json", r#"{"name": "solo"}"#);

        let discovery = discover(dir.path(), Scope::Workspaces).unwrap();
        assert!(discovery.manifests.is_empty());
        assert_eq!(discovery.errors.len(), 1);
        assert!(matches!(
            discovery.errors[0].1,
            ManifestError::WorkspaceError { .. }
        ));
    }

    #[test]
    fn test_deep_scope_skips_node_modules_and_dot_dirs() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "package.json", "{}");
        write_package(dir.path(), "a/package.json", "{}");
        write_package(dir.path(), "a/nested/deeper/package.json", "{}");
        write_package(dir.path(), "node_modules/x/package.json", "{}");
        write_package(dir.path(), ".cache/y/package.json", "{}");

        let discovery = discover(dir.path(), Scope::Deep).unwrap();
        assert_eq!(
            relative(dir.path(), &discovery),
            vec![
                "package.json",
                "a/nested/deeper/package.json",
                "a/package.json"
            ]
        );
    }

    #[test]
    fn test_parse_pnpm_workspace() {
        let workspace = PnpmWorkspace::parse(
            "# monorepo\npackages:\n  - 'packages/*'\n  - apps/*\n\nminimumReleaseAge: \"10d\"\ncatalog:\n  react: ^18\n",
        );
        assert_eq!(workspace.packages, vec!["packages/*", "apps/*"]);
        assert_eq!(workspace.minimum_release_age.as_deref(), Some("10d"));
    }

    #[test]
    fn test_parse_inline_packages() {
        let workspace = PnpmWorkspace::parse("packages: ['a/*', \"b\"]\n");
        assert_eq!(workspace.packages, vec!["a/*", "b"]);
    }
}
