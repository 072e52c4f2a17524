//! Candidate filtering over a version catalog

use crate::domain::PublishedVersion;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Which published versions may become an upgrade target
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    /// Consider prereleases under every policy (`--pre`)
    pub include_prerelease: bool,
    /// Consider deprecated versions
    pub include_deprecated: bool,
    /// Versions younger than this are not candidates
    pub min_age: Option<Duration>,
    /// Reference time for age checks
    pub now: DateTime<Utc>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            include_prerelease: false,
            include_deprecated: false,
            min_age: None,
            now: Utc::now(),
        }
    }
}

impl CandidateFilter {
    /// Create a filter with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether prereleases are candidates for every policy
    pub fn with_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// Set whether deprecated versions are candidates
    pub fn with_deprecated(mut self, include: bool) -> Self {
        self.include_deprecated = include;
        self
    }

    /// Set the minimum release age
    pub fn with_min_age(mut self, age: Duration) -> Self {
        self.min_age = Some(age);
        self
    }

    /// Set the reference time (for testing)
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Check whether a version passes the deprecation and age rules
    ///
    /// Versions without a publish time pass the age rule.
    pub fn accepts(&self, version: &PublishedVersion) -> bool {
        if version.deprecated && !self.include_deprecated {
            return false;
        }
        match (self.min_age, version.published_at) {
            (Some(min_age), Some(published_at)) => match chrono::Duration::from_std(min_age) {
                Ok(min_age) => published_at <= self.now - min_age,
                Err(_) => false,
            },
            _ => true,
        }
    }

    /// Check whether a version is a candidate, given whether the policy takes prereleases
    pub fn is_candidate(&self, version: &PublishedVersion, policy_allows_prerelease: bool) -> bool {
        (!version.is_prerelease() || policy_allows_prerelease || self.include_prerelease)
            && self.accepts(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use semver::Version;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn published(version: &str, days_ago: i64) -> PublishedVersion {
        PublishedVersion::new(Version::parse(version).unwrap())
            .with_published_at(fixed_time() - chrono::Duration::days(days_ago))
    }

    #[test]
    fn test_prerelease_excluded_by_default() {
        let filter = CandidateFilter::new().with_time(fixed_time());
        assert!(!filter.is_candidate(&published("2.0.0-beta.1", 30), false));
        assert!(filter.is_candidate(&published("2.0.0-beta.1", 30), true));
        assert!(filter.is_candidate(&published("1.0.0", 30), false));
    }

    #[test]
    fn test_pre_flag_includes_prereleases() {
        let filter = CandidateFilter::new()
            .with_time(fixed_time())
            .with_prerelease(true);
        assert!(filter.is_candidate(&published("2.0.0-rc.1", 30), false));
    }

    #[test]
    fn test_deprecated_excluded_by_default() {
        let filter = CandidateFilter::new();
        let deprecated = published("1.0.1", 30).with_deprecated(true);
        assert!(!filter.accepts(&deprecated));
        assert!(filter.clone().with_deprecated(true).accepts(&deprecated));
    }

    #[test]
    fn test_min_age() {
        let filter = CandidateFilter::new()
            .with_time(fixed_time())
            .with_min_age(Duration::from_secs(7 * 24 * 60 * 60));
        assert!(filter.accepts(&published("1.0.0", 10)));
        assert!(filter.accepts(&published("1.0.1", 7)));
        assert!(!filter.accepts(&published("1.0.2", 3)));
    }

    #[test]
    fn test_min_age_passes_unknown_publish_time() {
        let filter = CandidateFilter::new().with_min_age(Duration::from_secs(86_400));
        assert!(filter.accepts(&PublishedVersion::new(Version::new(1, 0, 0))));
    }
}
