//! Package manager detection
//!
//! This module provides:
//! - Detection of the project's package manager from lock files
//! - Default install and test commands used by doctor mode and post-upgrade installs
//! - The lock files doctor snapshots must cover

use std::fmt;
use std::path::{Path, PathBuf};

/// A supported Node.js package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// Detect the package manager for a project directory
    ///
    /// Lock files are searched in the directory and then its ancestors, so a
    /// workspace member picks up the root's lock file. Defaults to npm.
    pub fn detect(dir: &Path) -> Self {
        dir.ancestors()
            .find_map(Self::detect_in)
            .unwrap_or_default()
    }

    /// Detect from lock files in exactly one directory
    fn detect_in(dir: &Path) -> Option<Self> {
        // Check for lockfiles in order of preference
        if dir.join("pnpm-lock.yaml").exists() {
            return Some(PackageManager::Pnpm);
        }
        if dir.join("yarn.lock").exists() {
            return Some(PackageManager::Yarn);
        }
        if dir.join("bun.lockb").exists() || dir.join("bun.lock").exists() {
            return Some(PackageManager::Bun);
        }
        if dir.join("package-lock.json").exists() || dir.join("npm-shrinkwrap.json").exists() {
            return Some(PackageManager::Npm);
        }
        None
    }

    /// Executable name
    pub fn name(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        }
    }

    /// Shell command installing dependencies
    pub fn install_command(&self) -> String {
        format!("{} install", self.name())
    }

    /// Shell command running the project's `test` script
    pub fn test_command(&self) -> String {
        match self {
            PackageManager::Bun => "bun run test".to_string(),
            _ => format!("{} test", self.name()),
        }
    }

    /// Lock file names this package manager may write
    pub fn lock_files(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            PackageManager::Yarn => &["yarn.lock"],
            PackageManager::Pnpm => &["pnpm-lock.yaml"],
            PackageManager::Bun => &["bun.lockb", "bun.lock"],
        }
    }

    /// Lock file paths for a project, in the nearest directory that has one
    ///
    /// Falls back to the project directory itself, where a first install
    /// would create them.
    pub fn lock_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let base = dir
            .ancestors()
            .find(|d| self.lock_files().iter().any(|f| d.join(f).exists()))
            .unwrap_or(dir);
        self.lock_files().iter().map(|f| base.join(f)).collect()
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_from_lock_files() {
        let cases = [
            ("pnpm-lock.yaml", PackageManager::Pnpm),
            ("yarn.lock", PackageManager::Yarn),
            ("bun.lockb", PackageManager::Bun),
            ("package-lock.json", PackageManager::Npm),
        ];
        for (lock, expected) in cases {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join(lock), "").unwrap();
            assert_eq!(PackageManager::detect(dir.path()), expected, "{}", lock);
        }
    }

    #[test]
    fn test_pnpm_preferred_over_npm() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package-lock.json"), "").unwrap();
        fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
    }

    #[test]
    fn test_workspace_member_uses_root_lock_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "").unwrap();
        let member = dir.path().join("packages/a");
        fs::create_dir_all(&member).unwrap();

        let pm = PackageManager::detect(&member);
        assert_eq!(pm, PackageManager::Yarn);
        assert_eq!(pm.lock_paths(&member), vec![dir.path().join("yarn.lock")]);
    }

    #[test]
    fn test_commands() {
        assert_eq!(PackageManager::Npm.install_command(), "npm install");
        assert_eq!(PackageManager::Pnpm.test_command(), "pnpm test");
        assert_eq!(PackageManager::Bun.test_command(), "bun run test");
        assert_eq!(PackageManager::Yarn.to_string(), "yarn");
    }

    #[test]
    fn test_lock_paths_default_to_project_dir() {
        let dir = TempDir::new().unwrap();
        let paths = PackageManager::Npm.lock_paths(dir.path());
        assert_eq!(paths[0], dir.path().join("package-lock.json"));
    }
}
