//! Unified Result Model
//!
//! Every command maps its outcome to `ResultItem`s before rendering, so cache
//! listings, loaded entries and config values share one output shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of result item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Key,
    Version,
    Entry,
    Saved,
    Cleared,
    Status,
    Config,
    Error,
}

/// Error information for a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PbiError {
    pub code: String,
    pub message: String,
}

impl PbiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The unified result item that all commands produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub kind: Kind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Storage location or config key this item refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Structured payload (envelope, config value, status details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PbiError>,
}

impl ResultItem {
    fn empty(kind: Kind) -> Self {
        Self {
            kind,
            cache_key: None,
            version: None,
            path: None,
            data: None,
            errors: Vec::new(),
        }
    }

    /// A cache key
    pub fn key(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            ..Self::empty(Kind::Key)
        }
    }

    /// One version of a cache key
    pub fn version(cache_key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            version: Some(version.into()),
            ..Self::empty(Kind::Version)
        }
    }

    /// A loaded cache entry
    pub fn entry(cache_key: impl Into<String>, version: impl Into<String>, envelope: Value) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            version: Some(version.into()),
            data: Some(envelope),
            ..Self::empty(Kind::Entry)
        }
    }

    /// A successful save
    pub fn saved(cache_key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            version: Some(version.into()),
            ..Self::empty(Kind::Saved)
        }
    }

    /// Outcome of a clear; `data` records whether anything was removed
    pub fn cleared(cache_key: Option<String>, version: Option<String>, removed: bool) -> Self {
        Self {
            cache_key,
            version,
            data: Some(serde_json::json!({ "removed": removed })),
            ..Self::empty(Kind::Cleared)
        }
    }

    /// Freshness of a cache key
    pub fn status(cache_key: impl Into<String>, details: Value) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            data: Some(details),
            ..Self::empty(Kind::Status)
        }
    }

    /// A config key and its value
    pub fn config(key: impl Into<String>, value: Value) -> Self {
        Self {
            path: Some(key.into()),
            data: Some(value),
            ..Self::empty(Kind::Config)
        }
    }

    /// Create a new error result
    pub fn error(error: PbiError) -> Self {
        Self {
            errors: vec![error],
            ..Self::empty(Kind::Error)
        }
    }

    /// Set the storage location
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the cache key
    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }
}

/// Result set containing multiple result items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any item is an error
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| item.kind == Kind::Error)
    }
}

impl FromIterator<ResultItem> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
