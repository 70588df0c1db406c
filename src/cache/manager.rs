//! Cache manager - versioned save/load/list/clear over a storage backend
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/<cache_key>/<version>/<cache_key>.json   (versioned)
//! <root>/<cache_key>.json                         (non-versioned)
//! ```
//!
//! Caching is best-effort. Storage failures are logged and reported as
//! `None` or empty results; only caller mistakes (bad key, payload that is
//! not JSON serializable) come back as `CacheError`.

use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{Read, Write};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::config::CacheConfig;
use crate::cache::envelope::CacheEnvelope;
use crate::cache::version::{self, VersionSpec};
use crate::core::paths::validate_segment;
use crate::storage::{open_storage, Location, Storage, StorageError, StorageResult, StorePath};

/// Extension of cache files
pub const CACHE_EXT: &str = "json";

/// Caller errors surfaced by the cache manager
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("data is not JSON serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What `clear` removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    /// Every key; the root is recreated empty
    All,
    /// All versions of one key
    Key(String),
    /// The file of a single version; its directory is left in place
    Version { cache_key: String, version: String },
    /// The non-versioned file of one key
    Unversioned(String),
}

impl ClearTarget {
    /// Build a target from optional key/version, the way the CLI passes them.
    /// A version without a key still means "everything".
    pub fn from_args(cache_key: Option<&str>, version: Option<&str>) -> Self {
        match (cache_key, version) {
            (None, _) => ClearTarget::All,
            (Some(key), None) => ClearTarget::Key(key.to_string()),
            (Some(key), Some(version)) => ClearTarget::Version {
                cache_key: key.to_string(),
                version: version.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
enum ReadError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("corrupt cache file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Versioned JSON cache
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    storage: Option<Box<dyn Storage>>,
}

impl CacheManager {
    /// Build a manager for `config.cache_folder`. An unusable location leaves
    /// the manager unconfigured.
    pub fn new(config: CacheConfig) -> Self {
        let storage = match config.cache_folder.as_deref() {
            None => None,
            Some(folder) => match Location::parse(folder).and_then(|location| open_storage(&location)) {
                Ok(storage) => Some(storage),
                Err(error) => {
                    warn!(folder, %error, "Cache location is not usable; caching disabled");
                    None
                }
            },
        };
        Self { config, storage }
    }

    /// Build a manager over an already constructed storage backend
    #[allow(dead_code)]
    pub fn with_storage(config: CacheConfig, storage: Box<dyn Storage>) -> Self {
        Self {
            config,
            storage: Some(storage),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.storage.is_some()
    }

    /// Location of the cache root, for display
    pub fn root_location(&self) -> Option<String> {
        self.storage
            .as_deref()
            .map(|storage| storage.location(&StorePath::root()))
    }

    /// Storage for save/load: requires both a location and `enabled`
    fn active_storage(&self) -> Option<&dyn Storage> {
        if !self.config.enabled {
            debug!("Cache is disabled");
            return None;
        }
        if self.storage.is_none() {
            debug!("Cache is not configured");
        }
        self.storage.as_deref()
    }

    fn file_name(cache_key: &str) -> String {
        format!("{}.{}", cache_key, CACHE_EXT)
    }

    fn key_dir(cache_key: &str) -> StorePath {
        StorePath::root().join(cache_key)
    }

    fn version_file(cache_key: &str, version: &str) -> StorePath {
        Self::key_dir(cache_key)
            .join(version)
            .join(Self::file_name(cache_key))
    }

    fn unversioned_file(cache_key: &str) -> StorePath {
        StorePath::root().join(Self::file_name(cache_key))
    }

    /// Save `data` under `cache_key`.
    ///
    /// An explicit `version` is used verbatim. Otherwise a timestamp version is
    /// created, or, with versioning disabled, the single non-versioned file is
    /// overwritten and a synthetic timestamp is reported.
    ///
    /// Returns `Ok(None)` when caching is off or the write failed.
    pub fn save<T: Serialize + ?Sized>(
        &self,
        cache_key: &str,
        data: &T,
        version: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Option<String>, CacheError> {
        let Some(storage) = self.active_storage() else {
            return Ok(None);
        };

        validate_key(cache_key)?;
        if let Some(version) = version {
            validate_version(version)?;
        }

        let data = serde_json::to_value(data)?;
        let now = Local::now();

        let (used_version, path) = match version {
            Some(version) => (version.to_string(), Self::version_file(cache_key, version)),
            None if self.config.default_versioning => {
                let version = version::timestamp_version(now);
                let path = Self::version_file(cache_key, &version);
                (version, path)
            }
            None => (
                version::timestamp_version(now),
                Self::unversioned_file(cache_key),
            ),
        };

        let envelope = CacheEnvelope::new(
            cache_key,
            &used_version,
            now,
            metadata.unwrap_or_default(),
            data,
        );
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        match write_file(storage, &path, &bytes) {
            Ok(()) => {
                info!(
                    cache_key,
                    version = %used_version,
                    path = %storage.location(&path),
                    "Cached data"
                );
                Ok(Some(used_version))
            }
            Err(error) => {
                warn!(cache_key, %error, "Failed to save cache");
                Ok(None)
            }
        }
    }

    /// Load the envelope stored under `cache_key`.
    ///
    /// `Latest` picks the greatest version whose file can be read; a missing
    /// or corrupt entry yields `None`.
    pub fn load(&self, cache_key: &str, version: impl Into<VersionSpec>) -> Option<CacheEnvelope> {
        let storage = self.active_storage()?;

        if let Err(reason) = validate_segment(cache_key) {
            warn!(cache_key, %reason, "Invalid cache key");
            return None;
        }

        match version.into() {
            VersionSpec::Latest => {
                let versions = self.list_versions(cache_key);
                if versions.is_empty() {
                    debug!(cache_key, "No cached versions found");
                    return None;
                }

                for version in &versions {
                    let path = Self::version_file(cache_key, version);
                    match read_envelope(storage, &path) {
                        Ok(envelope) => {
                            info!(cache_key, version = %version, "Loaded cache");
                            return Some(envelope);
                        }
                        Err(error) => {
                            warn!(cache_key, version = %version, %error, "Skipping unreadable cache version");
                        }
                    }
                }
                None
            }
            VersionSpec::Exact(version) => {
                if let Err(reason) = validate_segment(&version) {
                    warn!(cache_key, %version, %reason, "Invalid cache version");
                    return None;
                }
                load_logged(storage, cache_key, &Self::version_file(cache_key, &version))
            }
            VersionSpec::Unversioned => {
                load_logged(storage, cache_key, &Self::unversioned_file(cache_key))
            }
        }
    }

    /// Versions of `cache_key`, newest first. Only directories holding the
    /// key's cache file count as versions.
    pub fn list_versions(&self, cache_key: &str) -> Vec<String> {
        let Some(storage) = self.storage.as_deref() else {
            return Vec::new();
        };
        if validate_segment(cache_key).is_err() {
            return Vec::new();
        }

        match collect_versions(storage, cache_key) {
            Ok(versions) => versions,
            Err(error) if error.is_not_found() => Vec::new(),
            Err(error) => {
                warn!(cache_key, %error, "Failed to list versions");
                Vec::new()
            }
        }
    }

    /// Cache keys with at least one version, ascending
    pub fn list_keys(&self) -> Vec<String> {
        let Some(storage) = self.storage.as_deref() else {
            return Vec::new();
        };

        let root = StorePath::root();
        let entries = match storage.exists(&root).and_then(|exists| {
            if exists {
                storage.list_dir(&root)
            } else {
                Ok(Vec::new())
            }
        }) {
            Ok(entries) => entries,
            Err(error) if error.is_not_found() => return Vec::new(),
            Err(error) => {
                warn!(%error, "Failed to list cache keys");
                return Vec::new();
            }
        };

        let mut keys: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_dir)
            .filter(|entry| !self.list_versions(&entry.name).is_empty())
            .map(|entry| entry.name)
            .collect();
        keys.sort();
        keys
    }

    /// Delete cached data. Returns whether anything was removed; failures are
    /// logged, never raised.
    pub fn clear(&self, target: &ClearTarget) -> bool {
        let Some(storage) = self.storage.as_deref() else {
            warn!("Cache path not configured");
            return false;
        };

        let key = match target {
            ClearTarget::All => None,
            ClearTarget::Key(key)
            | ClearTarget::Version { cache_key: key, .. }
            | ClearTarget::Unversioned(key) => Some(key),
        };
        if let Some(key) = key {
            if let Err(reason) = validate_segment(key) {
                warn!(cache_key = %key, %reason, "Invalid cache key");
                return false;
            }
        }
        if let ClearTarget::Version { version, .. } = target {
            if let Err(reason) = validate_segment(version) {
                warn!(version = %version, %reason, "Invalid cache version");
                return false;
            }
        }

        match clear_target(storage, target) {
            Ok(removed) => {
                if removed {
                    info!(?target, "Cleared cache");
                } else {
                    debug!(?target, "Nothing to clear");
                }
                removed
            }
            Err(error) => {
                error!(?target, %error, "Failed to clear cache");
                false
            }
        }
    }
}

fn validate_key(cache_key: &str) -> Result<(), CacheError> {
    validate_segment(cache_key).map_err(|reason| CacheError::InvalidKey {
        key: cache_key.to_string(),
        reason,
    })
}

fn validate_version(version: &str) -> Result<(), CacheError> {
    if version == version::LATEST {
        return Err(CacheError::InvalidVersion {
            version: version.to_string(),
            reason: "reserved for selecting the newest version".to_string(),
        });
    }
    validate_segment(version).map_err(|reason| CacheError::InvalidVersion {
        version: version.to_string(),
        reason,
    })
}

fn write_file(storage: &dyn Storage, path: &StorePath, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        storage.create_dir_all(&parent)?;
    }

    let mut writer = storage.open_write(path)?;
    writer
        .write_all(bytes)
        .and_then(|_| writer.flush())
        .map_err(|source| StorageError::Io {
            path: storage.location(path),
            source,
        })
}

fn read_envelope(storage: &dyn Storage, path: &StorePath) -> Result<CacheEnvelope, ReadError> {
    let mut content = String::new();
    storage
        .open_read(path)?
        .read_to_string(&mut content)
        .map_err(|source| StorageError::Io {
            path: storage.location(path),
            source,
        })?;
    Ok(serde_json::from_str(&content)?)
}

fn load_logged(storage: &dyn Storage, cache_key: &str, path: &StorePath) -> Option<CacheEnvelope> {
    match read_envelope(storage, path) {
        Ok(envelope) => {
            info!(cache_key, path = %storage.location(path), "Loaded cache");
            Some(envelope)
        }
        Err(ReadError::Storage(error)) if error.is_not_found() => {
            debug!(cache_key, path = %storage.location(path), "Cache file not found");
            None
        }
        Err(error) => {
            warn!(cache_key, %error, "Failed to load cache");
            None
        }
    }
}

fn collect_versions(storage: &dyn Storage, cache_key: &str) -> StorageResult<Vec<String>> {
    let dir = CacheManager::key_dir(cache_key);
    if !storage.is_dir(&dir)? {
        return Ok(Vec::new());
    }

    let mut versions = Vec::new();
    for entry in storage.list_dir(&dir)? {
        if entry.is_dir && storage.is_file(&CacheManager::version_file(cache_key, &entry.name))? {
            versions.push(entry.name);
        }
    }

    version::sort_descending(&mut versions);
    Ok(versions)
}

fn clear_target(storage: &dyn Storage, target: &ClearTarget) -> StorageResult<bool> {
    match target {
        ClearTarget::All => {
            let root = StorePath::root();
            let existed = storage.exists(&root)?;
            if existed {
                storage.remove_dir_all(&root)?;
            }
            storage.create_dir_all(&root)?;
            Ok(existed)
        }
        ClearTarget::Key(cache_key) => {
            let dir = CacheManager::key_dir(cache_key);
            if !storage.exists(&dir)? {
                return Ok(false);
            }
            storage.remove_dir_all(&dir)?;
            Ok(true)
        }
        ClearTarget::Version { cache_key, version } => {
            remove_if_present(storage, &CacheManager::version_file(cache_key, version))
        }
        ClearTarget::Unversioned(cache_key) => {
            remove_if_present(storage, &CacheManager::unversioned_file(cache_key))
        }
    }
}

fn remove_if_present(storage: &dyn Storage, path: &StorePath) -> StorageResult<bool> {
    if !storage.is_file(path)? {
        return Ok(false);
    }
    storage.remove_file(path)?;
    Ok(true)
}
