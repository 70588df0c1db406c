//! Storage module - Uniform access to cache roots
//!
//! Provides:
//! - The `Storage` trait used by the cache manager
//! - A local directory implementation
//! - An object-store implementation over a flat key/value client
//! - Cloud clients for `s3://`, `gs://` and `az://` (feature `remote`)
//! - Location parsing (local path vs `scheme://bucket/prefix`)

pub mod local;
pub mod object;
#[cfg(feature = "remote")]
pub mod remote;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::storage::local::LocalStorage;
use crate::storage::object::{MemoryObjectClient, ObjectStorage};

/// Errors raised by storage adapters
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object store error: {0}")]
    Backend(String),

    #[error("no object client available for scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid storage location: {0}")]
    InvalidLocation(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A location relative to a storage root, held as plain segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The storage root itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn parent(&self) -> Option<StorePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("/"))
        }
    }
}

/// A child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Filesystem-like operations shared by local and remote cache roots.
///
/// Paths are always relative to the root the implementation was built for.
/// Remote implementations treat directories as key prefixes: `create_dir_all`
/// is a no-op and a directory exists as long as something lives under it.
pub trait Storage: fmt::Debug + Send + Sync {
    /// Human-readable location of `path`, for logs and output
    fn location(&self, path: &StorePath) -> String;

    fn exists(&self, path: &StorePath) -> StorageResult<bool>;

    fn is_dir(&self, path: &StorePath) -> StorageResult<bool>;

    fn create_dir_all(&self, path: &StorePath) -> StorageResult<()>;

    /// Immediate children of a directory, sorted by name
    fn list_dir(&self, path: &StorePath) -> StorageResult<Vec<DirEntry>>;

    fn open_read(&self, path: &StorePath) -> StorageResult<Box<dyn Read + '_>>;

    /// Open a file for writing, truncating it. Content is durable once the
    /// returned writer has been flushed.
    fn open_write(&self, path: &StorePath) -> StorageResult<Box<dyn Write + '_>>;

    fn remove_file(&self, path: &StorePath) -> StorageResult<()>;

    fn remove_dir_all(&self, path: &StorePath) -> StorageResult<()>;

    fn is_file(&self, path: &StorePath) -> StorageResult<bool> {
        Ok(self.exists(path)? && !self.is_dir(path)?)
    }
}

static URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://(.*)$").expect("Invalid URI_RE regex")
});

/// Where a cache root lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote {
        scheme: String,
        bucket: String,
        prefix: String,
    },
}

impl Location {
    /// Parse a cache folder string. `scheme://bucket/prefix` is remote
    /// (except `file://`), anything else is a local path.
    pub fn parse(value: &str) -> StorageResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StorageError::InvalidLocation("empty location".to_string()));
        }

        let Some(caps) = URI_RE.captures(value) else {
            return Ok(Location::Local(PathBuf::from(value)));
        };

        let scheme = caps[1].to_lowercase();
        let rest = &caps[2];

        if scheme == "file" {
            return Ok(Location::Local(PathBuf::from(rest)));
        }

        let rest = rest.trim_matches('/');
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(StorageError::InvalidLocation(format!(
                "missing bucket in {}",
                value
            )));
        }

        Ok(Location::Remote {
            scheme,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    #[allow(dead_code)]
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote {
                scheme,
                bucket,
                prefix,
            } if prefix.is_empty() => write!(f, "{}://{}", scheme, bucket),
            Location::Remote {
                scheme,
                bucket,
                prefix,
            } => write!(f, "{}://{}/{}", scheme, bucket, prefix),
        }
    }
}

/// In-process buckets for `mem://`, shared by every storage opened in this process
static MEMORY_BUCKETS: Lazy<Mutex<HashMap<String, Arc<MemoryObjectClient>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn memory_bucket(bucket: &str) -> StorageResult<Arc<MemoryObjectClient>> {
    let mut buckets = MEMORY_BUCKETS
        .lock()
        .map_err(|_| StorageError::Backend("memory bucket registry poisoned".to_string()))?;
    Ok(buckets
        .entry(bucket.to_string())
        .or_insert_with(|| Arc::new(MemoryObjectClient::new()))
        .clone())
}

/// Build the storage backend for a location
pub fn open_storage(location: &Location) -> StorageResult<Box<dyn Storage>> {
    match location {
        Location::Local(path) => Ok(Box::new(LocalStorage::new(path))),
        Location::Remote {
            scheme,
            bucket,
            prefix,
        } => match scheme.as_str() {
            "mem" => {
                let client = memory_bucket(bucket)?;
                Ok(Box::new(ObjectStorage::new(
                    client,
                    prefix.clone(),
                    location.to_string(),
                )))
            }
            #[cfg(feature = "remote")]
            cloud if remote::SCHEMES.contains(&cloud) => {
                let client = remote::ObjectStoreClient::for_bucket(cloud, bucket)?;
                Ok(Box::new(ObjectStorage::new(
                    Arc::new(client),
                    prefix.clone(),
                    location.to_string(),
                )))
            }
            other => Err(StorageError::UnsupportedScheme(other.to_string())),
        },
    }
}
