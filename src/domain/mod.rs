//! Core domain models for depdoctor
//!
//! This module contains the fundamental types used throughout the application:
//! - Dependency sections and declared dependencies
//! - Version catalogs fetched from the registry
//! - Target policies
//! - Upgrade decisions
//! - Manifest, run and doctor summaries

mod catalog;
mod decision;
mod dependency;
mod policy;
mod section;
mod summary;

pub use catalog::{PublishedVersion, VersionCatalog};
pub use decision::{DecisionStatus, PassthroughReason, UpgradeDecision};
pub use dependency::{Dependency, DependencyKey};
pub use policy::TargetPolicy;
pub use section::DepSection;
pub use summary::{DoctorReport, FailureEvidence, ManifestReport, Rejection, RunSummary};
