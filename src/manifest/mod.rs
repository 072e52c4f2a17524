//! package.json manifests
//!
//! This module provides functionality to:
//! - Parse dependencies from package.json into a document model
//! - Edit dependency specifiers while preserving all other text
//! - Discover workspace and deep-scan manifests
//! - Read registry and release-age settings from the project

mod package_json;
mod settings;
mod workspace;
mod writer;

pub use package_json::ManifestDocument;
pub use settings::{parse_duration, ProjectSettings};
pub use workspace::{discover, project_dir, Discovery, PnpmWorkspace, Scope, MANIFEST_FILE};
pub use writer::{read_manifest, write_manifest, ManifestWriter};
