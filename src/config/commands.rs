//! Config commands - handlers behind `pbi config ...`

use anyhow::{Context, Result};

use crate::config::store::{parse_value, ConfigStore};
use crate::core::model::{PbiError, ResultItem, ResultSet};
use crate::core::render::{emit, RenderConfig};

fn single(item: ResultItem) -> ResultSet {
    let mut result_set = ResultSet::new();
    result_set.push(item);
    result_set
}

/// Print the value stored under a dotted key
pub fn run_get(store: &ConfigStore, key: &str, render_config: RenderConfig) -> Result<()> {
    let item = match store.get(key) {
        Some(value) => {
            let value = serde_json::to_value(value)
                .with_context(|| format!("Config value of '{}' is not representable as JSON", key))?;
            ResultItem::config(key, value)
        }
        None => ResultItem::error(PbiError::new(
            "NOT_SET",
            format!("config key '{}' is not set", key),
        ))
        .with_path(key),
    };
    emit(&single(item), render_config)
}

/// Store a value under a dotted key and write the file
pub fn run_set(
    store: &mut ConfigStore,
    key: &str,
    raw_value: &str,
    render_config: RenderConfig,
) -> Result<()> {
    let value = parse_value(raw_value);
    store
        .set(key, value.clone())
        .with_context(|| format!("Failed to set config key '{}'", key))?;

    let value = serde_json::to_value(&value).context("Config value is not representable as JSON")?;
    emit(&single(ResultItem::config(key, value)), render_config)
}

/// Remove a dotted key
pub fn run_unset(store: &mut ConfigStore, key: &str, render_config: RenderConfig) -> Result<()> {
    let removed = store
        .unset(key)
        .with_context(|| format!("Failed to unset config key '{}'", key))?;
    emit(
        &single(ResultItem::cleared(None, None, removed).with_path(key)),
        render_config,
    )
}

/// Print the config file location
pub fn run_path(store: &ConfigStore, render_config: RenderConfig) -> Result<()> {
    let path = store.path().display().to_string();
    emit(
        &single(ResultItem::config("path", serde_json::Value::String(path))),
        render_config,
    )
}
