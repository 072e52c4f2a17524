//! depdoctor - package.json dependency upgrader library
//!
//! This library provides the core functionality for upgrading npm-style
//! dependencies:
//! - Specifier parsing and rendering (ranges, tags, aliases, non-registry references)
//! - Target policies (latest, newest, greatest, minor, patch, semver, @tag)
//! - Manifest diffing with text-preserving package.json edits
//! - Doctor mode: install + test every upgrade and bisect the ones that break
//! - Workspace and deep-scan runs over several manifests

pub mod aggregator;
pub mod cli;
pub mod context;
pub mod differ;
pub mod doctor;
pub mod domain;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod output;
pub mod package_manager;
pub mod progress;
pub mod prompt;
pub mod registry;
pub mod specifier;
