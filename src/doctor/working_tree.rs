//! Version control working tree inspection

use crate::error::DoctorError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Reports uncommitted changes below a directory
#[async_trait]
pub trait WorkingTree: Send + Sync {
    /// Uncommitted changes, one entry per path; empty when clean
    async fn changes(&self, dir: &Path) -> Result<Vec<String>, DoctorError>;
}

/// Fail unless `dir` has no uncommitted changes
pub async fn ensure_clean(working_tree: &dyn WorkingTree, dir: &Path) -> Result<(), DoctorError> {
    let changes = working_tree.changes(dir).await?;
    if changes.is_empty() {
        Ok(())
    } else {
        Err(DoctorError::DirtyState {
            path: dir.to_path_buf(),
            changes,
        })
    }
}

/// git working tree, via `git status --porcelain`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitWorkingTree;

#[async_trait]
impl WorkingTree for GitWorkingTree {
    async fn changes(&self, dir: &Path) -> Result<Vec<String>, DoctorError> {
        let unavailable = |message: String| DoctorError::WorkingTreeUnavailable {
            path: dir.to_path_buf(),
            message,
        };

        let output = Command::new("git")
            .args(["status", "--porcelain", "--", "."])
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| unavailable(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
