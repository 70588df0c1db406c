//! Cache configuration

use crate::config::store::ConfigStore;
use crate::core::paths::expand_home;

/// Config keys holding cache settings
pub const FOLDER_KEY: &str = "cache.folder";
pub const ENABLED_KEY: &str = "cache.enabled";
pub const VERSIONING_KEY: &str = "cache.versioning";

/// Settings of a cache manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Local path or `scheme://bucket/prefix`; `None` leaves the cache unconfigured
    pub cache_folder: Option<String>,

    /// Master switch for save/load
    pub enabled: bool,

    /// Create a new timestamped version on every save without an explicit version
    pub default_versioning: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_folder: None,
            enabled: true,
            default_versioning: true,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_folder: impl Into<String>) -> Self {
        Self {
            cache_folder: Some(cache_folder.into()),
            ..Default::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_versioning(mut self, default_versioning: bool) -> Self {
        self.default_versioning = default_versioning;
        self
    }

    /// Read cache settings from the config store; missing values fall back to defaults
    pub fn from_store(store: &ConfigStore) -> Self {
        let defaults = Self::default();
        Self {
            cache_folder: store
                .get_str(FOLDER_KEY)
                .filter(|folder| !folder.trim().is_empty())
                .map(|folder| expand_home(&folder)),
            enabled: store.get_bool(ENABLED_KEY).unwrap_or(defaults.enabled),
            default_versioning: store
                .get_bool(VERSIONING_KEY)
                .unwrap_or(defaults.default_versioning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.cache_folder.is_none());
        assert!(config.enabled);
        assert!(config.default_versioning);
    }

    #[test]
    fn test_builders() {
        let config = CacheConfig::new("/tmp/cache")
            .with_enabled(false)
            .with_versioning(false);
        assert_eq!(config.cache_folder.as_deref(), Some("/tmp/cache"));
        assert!(!config.enabled);
        assert!(!config.default_versioning);
    }

    #[test]
    fn test_from_store() {
        let temp = tempdir().unwrap();
        let mut store = ConfigStore::open(temp.path().join("config.yaml"));
        store
            .set(FOLDER_KEY, Value::String("/data/pbi-cache".to_string()))
            .unwrap();
        store.set(VERSIONING_KEY, Value::Bool(false)).unwrap();

        let config = CacheConfig::from_store(&store);
        assert_eq!(config.cache_folder.as_deref(), Some("/data/pbi-cache"));
        assert!(config.enabled);
        assert!(!config.default_versioning);
    }

    #[test]
    fn test_from_empty_store() {
        let temp = tempdir().unwrap();
        let store = ConfigStore::open(temp.path().join("config.yaml"));
        assert_eq!(CacheConfig::from_store(&store), CacheConfig::default());
    }
}
