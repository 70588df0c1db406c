//! Path utilities
//!
//! Cache keys and versions become path segments on disk and in object keys,
//! so they are validated here before any storage call.

use std::path::PathBuf;

/// Check that a cache key or version label can be used as a single path segment
pub fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("must not be empty".to_string());
    }
    if segment == "." || segment == ".." {
        return Err(format!("'{}' is not a valid name", segment));
    }
    if let Some(c) = segment.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
        return Err(format!("'{}' contains forbidden character {:?}", segment, c));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(value: &str) -> String {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().to_string();
        }
    } else if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    value.to_string()
}

/// Default directory for pbi configuration (`~/.pbi_cli`)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pbi_cli")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_segment_accepts_plain_names() {
        assert!(validate_segment("workspaces").is_ok());
        assert!(validate_segment("apps_admin").is_ok());
        assert!(validate_segment("20240101_120000").is_ok());
        assert!(validate_segment("v1.2").is_ok());
    }

    #[test]
    fn test_validate_segment_rejects_separators() {
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("a\\b").is_err());
        assert!(validate_segment("nul\0").is_err());
    }

    #[test]
    fn test_validate_segment_rejects_relative_names() {
        assert!(validate_segment("").is_err());
        assert!(validate_segment(".").is_err());
        assert!(validate_segment("..").is_err());
    }

    #[test]
    fn test_expand_home_leaves_other_paths() {
        assert_eq!(expand_home("/tmp/cache"), "/tmp/cache");
        assert_eq!(expand_home("s3://bucket/x"), "s3://bucket/x");
        assert_eq!(expand_home("a~/b"), "a~/b");
    }

    #[test]
    fn test_expand_home_prefix() {
        if let Some(home) = dirs::home_dir() {
            let expanded = expand_home("~/pbi/cache");
            assert_eq!(PathBuf::from(expanded), home.join("pbi/cache"));
        }
    }

    #[test]
    fn test_config_dir_name() {
        assert!(config_dir().ends_with(".pbi_cli"));
    }
}
