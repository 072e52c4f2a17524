//! Doctor mode: verify upgrades by installing and testing them
//!
//! This module provides:
//! - The verification session with its bisection over failing batches
//! - Installer and verifier shell commands
//! - Working tree inspection (rollback is only trusted on a clean tree)
//! - Snapshots of the manifest and lock files

mod process;
mod session;
mod snapshot;
mod working_tree;

pub use process::{Installer, ShellCommand, Verifier};
pub use session::{DoctorSession, DoctorState, DoctorTools};
pub use snapshot::Snapshot;
pub use working_tree::{ensure_clean, GitWorkingTree, WorkingTree};

use crate::error::DoctorError;
use crate::manifest::ManifestDocument;
use crate::package_manager::PackageManager;
use std::sync::Arc;

/// Placeholder `test` script written by `npm init`
const NPM_INIT_TEST_SCRIPT: &str = "echo \"Error: no test specified\" && exit 1";

/// Install and verification commands for one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCommands {
    pub install: String,
    pub test: String,
}

impl DoctorCommands {
    /// Resolve commands from explicit overrides or the package manager defaults
    ///
    /// Without an explicit test command the manifest must define a real
    /// `test` script.
    pub fn resolve(
        document: &ManifestDocument,
        package_manager: PackageManager,
        install: Option<&str>,
        test: Option<&str>,
    ) -> Result<Self, DoctorError> {
        let install = install
            .map(str::to_string)
            .unwrap_or_else(|| package_manager.install_command());

        let test = match test {
            Some(command) if !command.trim().is_empty() => command.to_string(),
            _ => match document.script("test") {
                Some(script) if !script.trim().is_empty() && script != NPM_INIT_TEST_SCRIPT => {
                    package_manager.test_command()
                }
                _ => {
                    return Err(DoctorError::MissingCommand {
                        path: document.path().to_path_buf(),
                    })
                }
            },
        };

        Ok(Self { install, test })
    }

    /// Shell-backed tools for these commands, inspecting a git working tree
    pub fn tools(&self) -> DoctorTools {
        DoctorTools {
            installer: Arc::new(ShellCommand::install(&self.install)),
            verifier: Arc::new(ShellCommand::test(&self.test)),
            working_tree: Arc::new(GitWorkingTree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> ManifestDocument {
        ManifestDocument::parse("/project/package.json", json).unwrap()
    }

    #[test]
    fn test_defaults_from_package_manager() {
        let doc = document(r#"{"scripts": {"test": "vitest run"}}"#);
        let commands = DoctorCommands::resolve(&doc, PackageManager::Pnpm, None, None).unwrap();
        assert_eq!(commands.install, "pnpm install");
        assert_eq!(commands.test, "pnpm test");
    }

    #[test]
    fn test_explicit_commands_win() {
        let doc = document("{}");
        let commands = DoctorCommands::resolve(
            &doc,
            PackageManager::Npm,
            Some("npm ci"),
            Some("npm run lint && npm test"),
        )
        .unwrap();
        assert_eq!(commands.install, "npm ci");
        assert_eq!(commands.test, "npm run lint && npm test");
    }

    #[test]
    fn test_missing_test_script() {
        let doc = document(r#"{"scripts": {"build": "tsc"}}"#);
        assert!(matches!(
            DoctorCommands::resolve(&doc, PackageManager::Npm, None, None),
            Err(DoctorError::MissingCommand { .. })
        ));
    }

    #[test]
    fn test_npm_init_placeholder_is_not_a_test() {
        let doc = document(
            r#"{"scripts": {"test": "echo \"Error: no test specified\" && exit 1"}}"#,
        );
        assert!(DoctorCommands::resolve(&doc, PackageManager::Npm, None, None).is_err());
    }
}
