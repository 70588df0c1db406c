//! Version identifiers for cache entries

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// strftime layout of auto-generated versions. Fixed width and zero padded,
/// so string order equals chronological order.
pub const VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Selector name resolving to the newest version
pub const LATEST: &str = "latest";

static TIMESTAMP_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}_\d{6}$").expect("Invalid TIMESTAMP_VERSION_RE regex"));

/// Generate a version identifier for the given instant
pub fn timestamp_version(at: DateTime<Local>) -> String {
    at.format(VERSION_FORMAT).to_string()
}

/// Whether a version label has the auto-generated timestamp shape
#[allow(dead_code)]
pub fn is_timestamp_version(version: &str) -> bool {
    TIMESTAMP_VERSION_RE.is_match(version)
}

/// Sort versions newest first (plain string order, descending)
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| b.cmp(a));
}

/// Which entry of a cache key to address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// The greatest existing version
    #[default]
    Latest,
    /// A specific version directory
    Exact(String),
    /// The single-file slot used when versioning is disabled
    Unversioned,
}

impl From<&str> for VersionSpec {
    fn from(value: &str) -> Self {
        if value == LATEST {
            VersionSpec::Latest
        } else {
            VersionSpec::Exact(value.to_string())
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "{}", LATEST),
            VersionSpec::Exact(version) => write!(f, "{}", version),
            VersionSpec::Unversioned => write!(f, "unversioned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_version_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(timestamp_version(at), "20240307_090502");
        assert!(is_timestamp_version(&timestamp_version(Local::now())));
    }

    #[test]
    fn test_is_timestamp_version() {
        assert!(is_timestamp_version("20240101_120000"));
        assert!(!is_timestamp_version("v1"));
        assert!(!is_timestamp_version("2024010_120000"));
        assert!(!is_timestamp_version("20240101-120000"));
    }

    #[test]
    fn test_string_order_is_chronological() {
        let earlier = Local.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(timestamp_version(earlier) < timestamp_version(later));
    }

    #[test]
    fn test_sort_descending() {
        let mut versions = vec![
            "20240101_120000".to_string(),
            "20240301_000000".to_string(),
            "20240201_080000".to_string(),
        ];
        sort_descending(&mut versions);
        assert_eq!(
            versions,
            vec!["20240301_000000", "20240201_080000", "20240101_120000"]
        );
    }

    #[test]
    fn test_sort_descending_mixed_labels_is_plain_string_order() {
        let mut versions = vec!["20240101_120000".to_string(), "v1".to_string()];
        sort_descending(&mut versions);
        assert_eq!(versions, vec!["v1", "20240101_120000"]);
    }

    #[test]
    fn test_version_spec_from_str() {
        assert_eq!(VersionSpec::from("latest"), VersionSpec::Latest);
        assert_eq!(
            VersionSpec::from("20240101_120000"),
            VersionSpec::Exact("20240101_120000".to_string())
        );
    }

    #[test]
    fn test_version_spec_display() {
        assert_eq!(VersionSpec::Latest.to_string(), "latest");
        assert_eq!(VersionSpec::Exact("v2".to_string()).to_string(), "v2");
        assert_eq!(VersionSpec::Unversioned.to_string(), "unversioned");
    }
}
