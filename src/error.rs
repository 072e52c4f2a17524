//! Application error types using thiserror
//!
//! Error hierarchy:
//! - SpecifierError: malformed version specifiers (per-dependency warning)
//! - ManifestError: package.json reading, parsing, editing and workspace discovery
//! - RegistryError: registry communication (not found, network, rate limit)
//! - ConfigError: invalid CLI or project configuration
//! - DoctorError: fatal conditions of the verify-by-bisection workflow
//! - AppError: run-level umbrella mapped to an exit code by the binary

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest file related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Package registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Doctor mode aborted
    #[error(transparent)]
    Doctor(#[from] DoctorError),

    /// Global run deadline exceeded
    #[error("run timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },
}

/// A declared version specifier could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecifierError {
    /// Malformed range or version
    #[error("invalid specifier '{raw}': {message}")]
    Parse { raw: String, message: String },
}

impl SpecifierError {
    /// Creates a new Parse error
    pub fn parse(raw: impl Into<String>, message: impl Into<String>) -> Self {
        SpecifierError::Parse {
            raw: raw.into(),
            message: message.into(),
        }
    }
}

/// Errors related to manifest file operations
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write manifest file
    #[error("failed to write manifest file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("failed to parse JSON in {path}: {message}")]
    JsonParseError { path: PathBuf, message: String },

    /// A dependency entry to be edited is not present in the document
    #[error("dependency '{name}' not found in {section} of {path}")]
    EntryNotFound {
        path: PathBuf,
        section: String,
        name: String,
    },

    /// Workspace declaration missing or unusable
    #[error("workspace discovery failed in {path}: {message}")]
    WorkspaceError { path: PathBuf, message: String },
}

impl ManifestError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new JsonParseError
    pub fn json_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::JsonParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new EntryNotFound error
    pub fn entry_not_found(
        path: impl Into<PathBuf>,
        section: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ManifestError::EntryNotFound {
            path: path.into(),
            section: section.into(),
            name: name.into(),
        }
    }

    /// Creates a new WorkspaceError
    pub fn workspace_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::WorkspaceError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors related to package registry communication
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new RateLimitExceeded error
    pub fn rate_limit_exceeded(registry: impl Into<String>) -> Self {
        RegistryError::RateLimitExceeded {
            registry: registry.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::InvalidResponse {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// True when the package simply does not exist, as opposed to a transport failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::PackageNotFound { .. })
    }
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid duration format
    #[error("invalid duration format '{value}': expected format like '2w', '10d', '1m'")]
    InvalidDuration { value: String },

    /// Unknown target policy
    #[error(
        "invalid target '{value}': expected latest, newest, greatest, minor, patch, semver or @<tag>"
    )]
    InvalidPolicy { value: String },

    /// Malformed per-dependency target rule
    #[error("invalid target rule '{value}': expected <pattern>=<target>")]
    InvalidTargetRule { value: String },

    /// Malformed name pattern
    #[error("invalid name pattern '{value}': {message}")]
    InvalidPattern { value: String, message: String },

    /// Unknown dependency section
    #[error("invalid dependency section '{value}': expected prod, dev, peer, optional or overrides")]
    InvalidSection { value: String },

    /// Invalid path
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: PathBuf, message: String },

    /// Conflicting options
    #[error("conflicting options: {message}")]
    ConflictingOptions { message: String },
}

/// Which external step of a doctor trial failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStage {
    Install,
    Test,
}

impl std::fmt::Display for ProcessStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStage::Install => write!(f, "install"),
            ProcessStage::Test => write!(f, "test"),
        }
    }
}

/// An external command exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessError {
    pub stage: ProcessStage,
    pub command: String,
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr, for failure attribution only
    pub output: String,
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} command `{}` failed with ", self.stage, self.command)?;
        match self.exit_code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "no exit code"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Fatal conditions that abort doctor mode
#[derive(Error, Debug)]
pub enum DoctorError {
    /// No verification command configured or derivable
    #[error("no verification command configured for {path}: pass --doctor-test or add a \"test\" script")]
    MissingCommand { path: PathBuf },

    /// Working tree has uncommitted changes
    #[error("working tree at {path} has uncommitted changes: {}", .changes.join(", "))]
    DirtyState { path: PathBuf, changes: Vec<String> },

    /// Working tree state cannot be determined
    #[error("cannot inspect working tree at {path}: {message}")]
    WorkingTreeUnavailable { path: PathBuf, message: String },

    /// Unmodified project does not install or verify
    #[error("baseline verification failed before any upgrade was applied: {source}")]
    BaselineFailed {
        #[source]
        source: ProcessError,
    },

    /// Snapshot could not be restored, or restored state does not install
    #[error("failed to restore snapshot of {path}: {message}")]
    Restore { path: PathBuf, message: String },

    /// Manifest could not be edited or written
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Deadline reached; committed upgrades were kept
    #[error("doctor timed out; {confirmed} committed upgrade(s) kept")]
    Timeout { confirmed: usize },
}

impl DoctorError {
    /// Creates a new Restore error
    pub fn restore(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DoctorError::Restore {
            path: path.into(),
            message: message.into(),
        }
    }
}
