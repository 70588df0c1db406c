//! CLI module - Command-line interface definitions and handlers

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::cache::config::CacheConfig;
use crate::cache::manager::CacheManager;
use crate::cache::version::VersionSpec;
use crate::config::store::ConfigStore;
use crate::core::paths::expand_home;
use crate::core::render::{OutputFormat, RenderConfig};
use crate::core::util::parse_key_value;

/// pbi - Power BI command-line client with a versioned local response cache.
#[derive(Parser, Debug)]
#[command(name = "pbi")]
#[command(
    author,
    version,
    about,
    long_about = r#"pbi keeps JSON responses in a versioned cache and prints every outcome as
records of one shape (kind, cache_key, version, path, data, errors).

Output formats:
- jsonl: one JSON object per line (default)
- json: a single JSON array
- md: human-friendly Markdown

Cache layout under the cache folder:
    <folder>/<key>/<version>/<key>.json    versioned entries
    <folder>/<key>.json                    non-versioned entry

Examples:
    pbi config set cache.folder ~/.pbi_cli/cache
    pbi cache save workspaces --file workspaces.json
    pbi cache versions workspaces
    pbi cache show workspaces --data-only
    pbi cache clear workspaces
"#
)]
pub struct Cli {
    /// Config file to read and write.
    #[arg(
        long,
        global = true,
        env = "PBI_CONFIG",
        value_name = "PATH",
        long_help = "Config file to read and write (YAML).\n\n\
Defaults to ~/.pbi_cli/config.yaml. A missing file behaves like an empty config."
    )]
    pub config: Option<PathBuf>,

    /// Cache folder (overrides cache.folder).
    #[arg(
        long,
        global = true,
        value_name = "LOCATION",
        long_help = "Cache folder for this invocation, overriding cache.folder from the config.\n\n\
Accepts a local path (a leading ~ is expanded) or scheme://bucket/prefix.\n\
s3://, gs:// and az:// read credentials from the AWS_*, GOOGLE_* and AZURE_*\n\
environment variables. mem://bucket/prefix is an in-process store that lives for\n\
one command."
    )]
    pub cache_folder: Option<String>,

    /// Disable cache save/load.
    #[arg(
        long,
        global = true,
        long_help = "Disable cache save/load for this invocation (same as cache.enabled=false).\n\n\
Listing and clearing still work."
    )]
    pub no_cache: bool,

    /// Save and read the single non-versioned entry of a key.
    #[arg(
        long,
        global = true,
        long_help = "Write saves without --version to <folder>/<key>.json instead of a new\n\
timestamped version, and read that entry by default (same as cache.versioning=false)."
    )]
    pub no_versioning: bool,

    /// Output format (jsonl/json/md).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)"
    )]
    pub format: String,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Quiet mode (errors only on stderr).
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        long_help = "Only log errors to stderr. Records are still printed to stdout.\n\n\
PBI_LOG (e.g. PBI_LOG=debug) takes precedence over -q/-v."
    )]
    pub quiet: bool,

    /// Verbose mode (debug logs on stderr).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and manage the response cache.
    #[command(
        long_about = "Save, read, list and delete cached JSON responses.\n\n\
Versioned entries are labelled YYYYMMDD_HHMMSS unless a label is given explicitly."
    )]
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Read and write settings in the config file.
    #[command(
        long_about = "Read and write dotted keys in the YAML config file.\n\n\
Cache keys:\n\
  cache.folder      local path or scheme://bucket/prefix\n\
  cache.enabled     true/false\n\
  cache.versioning  true/false\n\n\
Examples:\n\
  pbi config set cache.folder ~/.pbi_cli/cache\n\
  pbi config get cache.folder\n"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show effective cache settings.
    Info,

    /// List cache keys.
    Keys,

    /// List versions of a key, newest first.
    Versions {
        /// Cache key.
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print a cached entry.
    #[command(
        long_about = "Print the cache envelope (cache_key, cached_at, version, metadata, data)\n\
of a key. Without --version the newest version is used, or the non-versioned entry\n\
when versioning is disabled.\n\n\
Exits with status 1 if nothing is cached.\n\n\
Examples:\n\
  pbi cache show workspaces\n\
  pbi cache show workspaces --version 20240101_120000 --data-only\n"
    )]
    Show {
        /// Cache key.
        #[arg(value_name = "KEY")]
        key: String,

        /// Version label, or "latest".
        #[arg(long, value_name = "VERSION", conflicts_with = "unversioned")]
        version: Option<String>,

        /// Read <folder>/<key>.json.
        #[arg(long)]
        unversioned: bool,

        /// Print only the cached data.
        #[arg(long)]
        data_only: bool,
    },

    /// Save JSON from a file or stdin.
    #[command(
        long_about = "Read a JSON document from --file (or stdin) and save it under KEY.\n\
Prints the version label used.\n\n\
Examples:\n\
  pbi cache save workspaces --file workspaces.json\n\
  curl ... | pbi cache save reports --meta workspace=abc --meta top=100\n"
    )]
    Save {
        /// Cache key.
        #[arg(value_name = "KEY")]
        key: String,

        /// Input file (defaults to stdin).
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Explicit version label.
        #[arg(long, value_name = "VERSION")]
        version: Option<String>,

        /// Metadata entry; the value is parsed as JSON when possible.
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        meta: Vec<(String, Value)>,
    },

    /// Report whether the newest entry is older than a maximum age.
    Status {
        /// Cache key.
        #[arg(value_name = "KEY")]
        key: String,

        /// Maximum age in seconds.
        #[arg(long, value_name = "SECS", default_value_t = 3600)]
        max_age: u64,
    },

    /// Delete cached entries.
    #[command(
        long_about = "Without KEY the whole cache folder is emptied. With KEY all versions of\n\
the key are removed; --version limits it to one version and --unversioned to the\n\
non-versioned entry.\n\n\
Examples:\n\
  pbi cache clear\n\
  pbi cache clear workspaces --version 20240101_120000\n"
    )]
    Clear {
        /// Cache key.
        #[arg(value_name = "KEY")]
        key: Option<String>,

        /// Only this version.
        #[arg(long, value_name = "VERSION", requires = "key", conflicts_with = "unversioned")]
        version: Option<String>,

        /// Only the non-versioned entry.
        #[arg(long, requires = "key")]
        unversioned: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the value of a dotted key.
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Set a dotted key; the value is parsed as YAML (true, 3, null, ...).
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Remove a dotted key.
    Unset {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print the config file location.
    Path,
}

/// Cache settings from the config file with command-line overrides applied
fn cache_config(
    store: &ConfigStore,
    cache_folder: Option<&str>,
    no_cache: bool,
    no_versioning: bool,
) -> CacheConfig {
    let mut config = CacheConfig::from_store(store);
    if let Some(folder) = cache_folder.filter(|folder| !folder.trim().is_empty()) {
        config.cache_folder = Some(expand_home(folder));
    }
    if no_cache {
        config = config.with_enabled(false);
    }
    if no_versioning {
        config = config.with_versioning(false);
    }
    config
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);

    let config_path = cli.config.clone().unwrap_or_else(ConfigStore::default_path);
    let mut store = ConfigStore::open(config_path);

    match cli.command {
        Commands::Cache { action } => {
            let cache = CacheManager::new(cache_config(
                &store,
                cli.cache_folder.as_deref(),
                cli.no_cache,
                cli.no_versioning,
            ));

            match action {
                CacheCommands::Info => crate::cache::commands::run_info(&cache, render_config),
                CacheCommands::Keys => crate::cache::commands::run_keys(&cache, render_config),
                CacheCommands::Versions { key } => {
                    crate::cache::commands::run_versions(&cache, &key, render_config)
                }
                CacheCommands::Show {
                    key,
                    version,
                    unversioned,
                    data_only,
                } => {
                    let selector = match (version, unversioned) {
                        (Some(version), _) => VersionSpec::from(version.as_str()),
                        (None, true) => VersionSpec::Unversioned,
                        (None, false) => crate::cache::commands::default_selector(&cache),
                    };
                    crate::cache::commands::run_show(&cache, &key, selector, data_only, render_config)
                }
                CacheCommands::Save {
                    key,
                    file,
                    version,
                    meta,
                } => crate::cache::commands::run_save(
                    &cache,
                    &key,
                    file.as_deref(),
                    version.as_deref(),
                    meta,
                    render_config,
                ),
                CacheCommands::Status { key, max_age } => {
                    crate::cache::commands::run_status(&cache, &key, max_age, render_config)
                }
                CacheCommands::Clear {
                    key,
                    version,
                    unversioned,
                } => crate::cache::commands::run_clear(
                    &cache,
                    key.as_deref(),
                    version.as_deref(),
                    unversioned,
                    render_config,
                ),
            }
        }

        Commands::Config { action } => match action {
            ConfigCommands::Get { key } => {
                crate::config::commands::run_get(&store, &key, render_config)
            }
            ConfigCommands::Set { key, value } => {
                crate::config::commands::run_set(&mut store, &key, &value, render_config)
            }
            ConfigCommands::Unset { key } => {
                crate::config::commands::run_unset(&mut store, &key, render_config)
            }
            ConfigCommands::Path => crate::config::commands::run_path(&store, render_config),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::{ENABLED_KEY, FOLDER_KEY};
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cache_config_overrides_store() {
        let temp = tempdir().unwrap();
        let mut store = ConfigStore::open(temp.path().join("config.yaml"));
        store.set(FOLDER_KEY, "/from/config".into()).unwrap();

        let config = cache_config(&store, Some("/from/flag"), true, true);
        assert_eq!(config.cache_folder.as_deref(), Some("/from/flag"));
        assert!(!config.enabled);
        assert!(!config.default_versioning);

        let config = cache_config(&store, None, false, false);
        assert_eq!(config.cache_folder.as_deref(), Some("/from/config"));
        assert!(config.enabled);
    }

    #[test]
    fn test_no_cache_flag_wins_over_config() {
        let temp = tempdir().unwrap();
        let mut store = ConfigStore::open(temp.path().join("config.yaml"));
        store.set(ENABLED_KEY, true.into()).unwrap();

        assert!(!cache_config(&store, None, true, false).enabled);
    }

    #[test]
    fn test_parse_save_meta() {
        let cli = Cli::try_parse_from([
            "pbi", "cache", "save", "reports", "--meta", "top=100", "--meta", "ws=abc",
        ])
        .unwrap();
        match cli.command {
            Commands::Cache {
                action: CacheCommands::Save { key, meta, .. },
            } => {
                assert_eq!(key, "reports");
                assert_eq!(meta[0], ("top".to_string(), serde_json::json!(100)));
                assert_eq!(meta[1], ("ws".to_string(), serde_json::json!("abc")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_clear_version_requires_key() {
        assert!(Cli::try_parse_from(["pbi", "cache", "clear", "--version", "v1"]).is_err());
    }
}
