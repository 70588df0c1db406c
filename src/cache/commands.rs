//! Cache commands - handlers behind `pbi cache ...`

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use serde_json::{json, Map, Value};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::cache::manager::{CacheManager, ClearTarget};
use crate::cache::version::VersionSpec;
use crate::core::model::{PbiError, ResultItem, ResultSet};
use crate::core::render::{emit, RenderConfig};

fn single(item: ResultItem) -> ResultSet {
    let mut result_set = ResultSet::new();
    result_set.push(item);
    result_set
}

fn not_configured() -> ResultItem {
    ResultItem::error(PbiError::new(
        "CACHE_NOT_CONFIGURED",
        "no usable cache folder; set cache.folder or pass --cache-folder",
    ))
}

fn disabled() -> ResultItem {
    ResultItem::error(PbiError::new(
        "CACHE_DISABLED",
        "caching is disabled (cache.enabled=false or --no-cache)",
    ))
}

/// Reason save/load cannot run, if any
fn unavailable(cache: &CacheManager) -> Option<ResultItem> {
    if !cache.is_configured() {
        Some(not_configured())
    } else if !cache.config().enabled {
        Some(disabled())
    } else {
        None
    }
}

/// Selector used when the user did not name a version
pub fn default_selector(cache: &CacheManager) -> VersionSpec {
    if cache.config().default_versioning {
        VersionSpec::Latest
    } else {
        VersionSpec::Unversioned
    }
}

/// Show where the cache lives and how it is configured
pub fn run_info(cache: &CacheManager, render_config: RenderConfig) -> Result<()> {
    let config = cache.config();
    let details = json!({
        "cache_folder": config.cache_folder,
        "root": cache.root_location(),
        "configured": cache.is_configured(),
        "enabled": config.enabled,
        "default_versioning": config.default_versioning,
    });
    emit(
        &single(ResultItem::config("cache", details)),
        render_config,
    )
}

/// List cache keys
pub fn run_keys(cache: &CacheManager, render_config: RenderConfig) -> Result<()> {
    if !cache.is_configured() {
        return emit(&single(not_configured()), render_config);
    }

    let result_set: ResultSet = cache.list_keys().into_iter().map(ResultItem::key).collect();
    emit(&result_set, render_config)
}

/// List versions of a key, newest first
pub fn run_versions(cache: &CacheManager, cache_key: &str, render_config: RenderConfig) -> Result<()> {
    if !cache.is_configured() {
        return emit(&single(not_configured()), render_config);
    }

    let result_set: ResultSet = cache
        .list_versions(cache_key)
        .into_iter()
        .map(|version| ResultItem::version(cache_key, version))
        .collect();
    emit(&result_set, render_config)
}

/// Print a cached entry (full envelope, or only its data)
pub fn run_show(
    cache: &CacheManager,
    cache_key: &str,
    selector: VersionSpec,
    data_only: bool,
    render_config: RenderConfig,
) -> Result<()> {
    if let Some(error) = unavailable(cache) {
        return emit(&single(error), render_config);
    }

    let Some(envelope) = cache.load(cache_key, selector.clone()) else {
        let error = PbiError::new(
            "NOT_FOUND",
            format!("no cached entry for '{}' ({})", cache_key, selector),
        );
        return emit(
            &single(ResultItem::error(error).with_cache_key(cache_key)),
            render_config,
        );
    };

    if data_only {
        let body = serde_json::to_string_pretty(&envelope.data)
            .context("Failed to render cached data")?;
        println!("{}", body);
        return Ok(());
    }

    let version = envelope.version.clone();
    let value = serde_json::to_value(&envelope).context("Failed to render cache entry")?;
    emit(
        &single(ResultItem::entry(cache_key, version, value)),
        render_config,
    )
}

/// Read JSON from a file or stdin and save it under `cache_key`
pub fn run_save(
    cache: &CacheManager,
    cache_key: &str,
    file: Option<&Path>,
    version: Option<&str>,
    meta: Vec<(String, Value)>,
    render_config: RenderConfig,
) -> Result<()> {
    if let Some(error) = unavailable(cache) {
        return emit(&single(error), render_config);
    }

    let input = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {:?}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    let data: Value = serde_json::from_str(&input).context("Input is not valid JSON")?;

    let metadata = if meta.is_empty() {
        None
    } else {
        Some(meta.into_iter().collect::<Map<String, Value>>())
    };

    let item = match cache.save(cache_key, &data, version, metadata)? {
        Some(version) => ResultItem::saved(cache_key, version),
        None => ResultItem::error(PbiError::new(
            "SAVE_FAILED",
            format!("could not write cache entry for '{}'", cache_key),
        ))
        .with_cache_key(cache_key),
    };
    emit(&single(item), render_config)
}

/// Report age and staleness of the newest entry of a key
pub fn run_status(
    cache: &CacheManager,
    cache_key: &str,
    max_age_secs: u64,
    render_config: RenderConfig,
) -> Result<()> {
    if let Some(error) = unavailable(cache) {
        return emit(&single(error), render_config);
    }

    let selector = default_selector(cache);
    let Some(envelope) = cache.load(cache_key, selector.clone()) else {
        let error = PbiError::new(
            "NOT_FOUND",
            format!("no cached entry for '{}' ({})", cache_key, selector),
        );
        return emit(
            &single(ResultItem::error(error).with_cache_key(cache_key)),
            render_config,
        );
    };

    let now = Local::now();
    let max_age = i64::try_from(max_age_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    let details = json!({
        "version": envelope.version,
        "cached_at": envelope.cached_at,
        "age_seconds": envelope.age(now).map(|age| age.num_seconds()),
        "max_age_seconds": max_age_secs,
        "stale": envelope.is_stale(max_age, now),
    });
    emit(
        &single(ResultItem::status(cache_key, details)),
        render_config,
    )
}

/// Delete the whole cache, one key, one version or one non-versioned file
pub fn run_clear(
    cache: &CacheManager,
    cache_key: Option<&str>,
    version: Option<&str>,
    unversioned: bool,
    render_config: RenderConfig,
) -> Result<()> {
    if !cache.is_configured() {
        return emit(&single(not_configured()), render_config);
    }

    let target = match (cache_key, unversioned) {
        (Some(key), true) => ClearTarget::Unversioned(key.to_string()),
        _ => ClearTarget::from_args(cache_key, version),
    };

    let removed = cache.clear(&target);
    let item = ResultItem::cleared(
        cache_key.map(str::to_string),
        version.map(str::to_string),
        removed,
    );
    let item = match cache.root_location() {
        Some(root) => item.with_path(root),
        None => item,
    };
    emit(&single(item), render_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use tempfile::tempdir;

    #[test]
    fn test_default_selector_follows_versioning() {
        let versioned = CacheManager::new(CacheConfig::new("/tmp/pbi-selector"));
        assert_eq!(default_selector(&versioned), VersionSpec::Latest);

        let flat = CacheManager::new(CacheConfig::new("/tmp/pbi-selector").with_versioning(false));
        assert_eq!(default_selector(&flat), VersionSpec::Unversioned);
    }

    #[test]
    fn test_unavailable_reasons() {
        let unconfigured = CacheManager::new(CacheConfig::default());
        assert_eq!(
            unavailable(&unconfigured).unwrap().errors[0].code,
            "CACHE_NOT_CONFIGURED"
        );

        let temp = tempdir().unwrap();
        let off = CacheManager::new(
            CacheConfig::new(temp.path().to_string_lossy()).with_enabled(false),
        );
        assert_eq!(unavailable(&off).unwrap().errors[0].code, "CACHE_DISABLED");

        let on = CacheManager::new(CacheConfig::new(temp.path().to_string_lossy()));
        assert!(unavailable(&on).is_none());
    }

    #[test]
    fn test_save_from_file_then_keys() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("workspaces.json");
        fs::write(&input, r#"{"value": [{"id": "123"}]}"#).unwrap();
        let cache = CacheManager::new(CacheConfig::new(temp.path().join("cache").to_string_lossy()));

        run_save(
            &cache,
            "workspaces",
            Some(&input),
            Some("v1"),
            vec![("top".to_string(), json!(1000))],
            RenderConfig::default(),
        )
        .unwrap();

        let loaded = cache.load("workspaces", "v1").unwrap();
        assert_eq!(loaded.data["value"][0]["id"], "123");
        assert_eq!(loaded.metadata["top"], 1000);
    }

    #[test]
    fn test_save_rejects_invalid_json() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("bad.json");
        fs::write(&input, "{oops").unwrap();
        let cache = CacheManager::new(CacheConfig::new(temp.path().join("cache").to_string_lossy()));

        let err = run_save(&cache, "k", Some(&input), None, Vec::new(), RenderConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_show_missing_is_an_error() {
        let temp = tempdir().unwrap();
        let cache = CacheManager::new(CacheConfig::new(temp.path().to_string_lossy()));

        let err = run_show(&cache, "missing", VersionSpec::Latest, false, RenderConfig::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("NOT_FOUND"));
    }

    #[test]
    fn test_status_accepts_any_max_age() {
        let temp = tempdir().unwrap();
        let cache = CacheManager::new(CacheConfig::new(temp.path().to_string_lossy()));
        cache.save("apps", &json!({}), None, None).unwrap().unwrap();

        for max_age in [0, 3600, 100_000_000_000_000_000, u64::MAX] {
            run_status(&cache, "apps", max_age, RenderConfig::default()).unwrap();
        }
    }

    #[test]
    fn test_clear_on_unconfigured_cache_is_an_error() {
        let cache = CacheManager::new(CacheConfig::default());
        assert!(run_clear(&cache, None, None, false, RenderConfig::default()).is_err());
    }
}
