//! Manifest file writing
//!
//! This module provides:
//! - ManifestWriter for persisting edited manifest documents
//! - Dry-run mode support (no actual file modifications)
//! - Raw read/write helpers shared with doctor snapshots

use super::ManifestDocument;
use crate::error::ManifestError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Writer for manifest documents
#[derive(Debug, Clone, Copy)]
pub struct ManifestWriter {
    /// Whether to run in dry-run mode (no file modifications)
    dry_run: bool,
}

impl ManifestWriter {
    /// Create a new ManifestWriter
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Create a ManifestWriter in dry-run mode
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    /// Check if this writer is in dry-run mode
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Write a document to its path
    ///
    /// Returns true when the file on disk was changed. Nothing is written in
    /// dry-run mode or when the file already holds the document's text.
    pub fn write(&self, document: &ManifestDocument) -> Result<bool, ManifestError> {
        let path = document.path();
        let current = read_manifest(path)?;
        if current == document.text() {
            return Ok(false);
        }
        if self.dry_run {
            debug!("dry run: not writing {}", path.display());
            return Ok(false);
        }
        write_manifest(path, document.text())?;
        debug!("wrote {}", path.display());
        Ok(true)
    }
}

/// Read a manifest file content safely
pub fn read_manifest(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))
}

/// Write content to a manifest file
pub fn write_manifest(path: &Path, content: &str) -> Result<(), ManifestError> {
    fs::write(path, content).map_err(|e| ManifestError::write_error(path, e))
}
