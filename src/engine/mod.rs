//! Upgrade decision engine
//!
//! This module provides:
//! - Candidate filtering (prereleases, deprecation, minimum release age)
//! - Name rules for filter/reject patterns and per-dependency policies
//! - The target policy evaluator producing one decision per dependency

mod candidates;
mod evaluator;
mod rules;

pub use candidates::CandidateFilter;
pub use evaluator::Evaluator;
pub use rules::{DependencyFilter, NamePattern, PolicyConfig};
