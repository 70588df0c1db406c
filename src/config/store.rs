//! Config store - YAML settings file with dotted-key access

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::paths::config_dir;

/// Default config file name inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config key '{0}'")]
    InvalidKey(String),

    #[error("cannot set '{key}': '{segment}' is a {found}, not a mapping")]
    NotAMapping {
        key: String,
        segment: String,
        found: &'static str,
    },

    #[error("failed to write config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings loaded from a YAML file; every change is written back immediately
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    data: Mapping,
}

impl ConfigStore {
    /// Default location: `~/.pbi_cli/config.yaml`
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// Load the store at `path`. A missing, empty or unreadable file yields
    /// the default document.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_document(&path);
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Document used when no config file exists yet
    pub fn default_document() -> Mapping {
        let mut doc = Mapping::new();
        doc.insert(Value::from("active_profile"), Value::Null);
        doc.insert(Value::from("profiles"), Value::Mapping(Mapping::new()));
        doc.insert(Value::from("default_output_folder"), Value::Null);
        doc
    }

    /// Look up a dotted key such as `cache.folder`
    pub fn get(&self, key: &str) -> Option<&Value> {
        let segments = split_key(key).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut current = &self.data;
        for segment in parents {
            current = current.get(*segment)?.as_mapping()?;
        }
        current.get(*last)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Set a dotted key, creating intermediate mappings, and save the file
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        let segments = split_key(key)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;

        let mut current = &mut self.data;
        for segment in parents {
            let slot = current
                .entry(Value::from(*segment))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if slot.is_null() {
                *slot = Value::Mapping(Mapping::new());
            }
            current = match slot {
                Value::Mapping(map) => map,
                other => {
                    return Err(ConfigError::NotAMapping {
                        key: key.to_string(),
                        segment: segment.to_string(),
                        found: kind_name(other),
                    })
                }
            };
        }
        current.insert(Value::from(*last), value);

        self.save()
    }

    /// Remove a dotted key. Returns whether it existed.
    pub fn unset(&mut self, key: &str) -> Result<bool, ConfigError> {
        let segments = split_key(key)?;
        let Some((last, parents)) = segments.split_last() else {
            return Ok(false);
        };

        let mut current = &mut self.data;
        for segment in parents {
            match current.get_mut(*segment).and_then(Value::as_mapping_mut) {
                Some(map) => current = map,
                None => return Ok(false),
            }
        }

        if current.remove(*last).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let yaml = serde_yaml::to_string(&self.data)?;
        fs::write(&self.path, yaml).map_err(io_error)?;
        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}

fn load_document(path: &Path) -> Mapping {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return ConfigStore::default_document();
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "Could not read config");
            return ConfigStore::default_document();
        }
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(doc)) => doc,
        Ok(_) => ConfigStore::default_document(),
        Err(error) => {
            warn!(path = %path.display(), %error, "Could not parse config");
            ConfigStore::default_document()
        }
    }
}

fn split_key(key: &str) -> Result<Vec<&str>, ConfigError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Interpret a command-line value as a YAML scalar (`true`, `3`, `null`, ...),
/// falling back to the raw string
pub fn parse_value(raw: &str) -> Value {
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
