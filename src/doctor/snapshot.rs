//! Rollback snapshots of the manifest and lock files

use crate::error::DoctorError;
use std::fs;
use std::path::{Path, PathBuf};

/// File contents captured at a point in time; `None` records an absent file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    files: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl Snapshot {
    /// Capture the given files
    pub fn capture<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self, DoctorError> {
        let mut files = Vec::new();
        for path in paths {
            let content = match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(DoctorError::restore(
                        path,
                        format!("cannot snapshot: {}", e),
                    ))
                }
            };
            files.push((path.to_path_buf(), content));
        }
        Ok(Self { files })
    }

    /// Put every captured file back; files absent at capture time are removed
    pub fn restore(&self) -> Result<(), DoctorError> {
        for (path, content) in &self.files {
            let result = match content {
                Some(bytes) => fs::write(path, bytes),
                None => match fs::remove_file(path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            result.map_err(|e| DoctorError::restore(path, e.to_string()))?;
        }
        Ok(())
    }

    /// Captured content of a path
    pub fn content(&self, path: &Path) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, content)| content.as_deref())
    }
}
