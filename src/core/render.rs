//! Renderer module
//!
//! Renders ResultSet to different output formats: jsonl, json, md

use crate::core::model::{Kind, ResultItem, ResultSet};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    /// Create a new render config with default options
    #[allow(dead_code)]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for result sets
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a new renderer with render config
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a result set to a string
    pub fn render(&self, result_set: &ResultSet) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(result_set),
            OutputFormat::Json => self.render_json(result_set),
            OutputFormat::Markdown => self.render_markdown(result_set),
        }
    }

    /// Render as JSON Lines (one JSON object per line)
    fn render_jsonl(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    /// Render as a single JSON array
    fn render_json(&self, result_set: &ResultSet) -> String {
        if self.config.pretty {
            serde_json::to_string_pretty(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        }
    }

    /// Render as Markdown
    fn render_markdown(&self, result_set: &ResultSet) -> String {
        let mut output = String::new();

        let sections = [
            (Kind::Error, "Errors"),
            (Kind::Key, "Cache Keys"),
            (Kind::Version, "Versions"),
            (Kind::Entry, "Entries"),
            (Kind::Saved, "Saved"),
            (Kind::Cleared, "Cleared"),
            (Kind::Status, "Status"),
            (Kind::Config, "Config"),
        ];

        for (kind, title) in sections {
            let items: Vec<&ResultItem> = result_set
                .items
                .iter()
                .filter(|item| item.kind == kind)
                .collect();
            if items.is_empty() {
                continue;
            }

            output.push_str(&format!("## {}\n\n", title));
            for item in items {
                self.render_item_md(&mut output, item);
            }
            output.push('\n');
        }

        output
    }

    fn render_item_md(&self, output: &mut String, item: &ResultItem) {
        match item.kind {
            Kind::Error => {
                for error in &item.errors {
                    output.push_str(&format!("- **{}**: {}\n", error.code, error.message));
                }
                return;
            }
            Kind::Key => {
                if let Some(key) = &item.cache_key {
                    output.push_str(&format!("- `{}`\n", key));
                }
                return;
            }
            _ => {}
        }

        let mut label = Vec::new();
        if let Some(key) = &item.cache_key {
            label.push(format!("`{}`", key));
        }
        if let Some(version) = &item.version {
            label.push(format!("version `{}`", version));
        }
        if let Some(path) = &item.path {
            label.push(format!("at `{}`", path));
        }

        match item.kind {
            Kind::Entry | Kind::Status | Kind::Config => {
                output.push_str(&format!("### {}\n", label.join(" ")));
                if let Some(data) = &item.data {
                    let body = serde_json::to_string_pretty(data).unwrap_or_default();
                    output.push_str("\n```json\n");
                    output.push_str(&body);
                    output.push_str("\n```\n");
                }
                output.push('\n');
            }
            _ => {
                output.push_str(&format!("- {}", label.join(" ")));
                if item.kind == Kind::Cleared {
                    let removed = item
                        .data
                        .as_ref()
                        .and_then(|data| data.get("removed"))
                        .and_then(|removed| removed.as_bool())
                        .unwrap_or(false);
                    if !removed {
                        output.push_str(" (nothing to remove)");
                    }
                }
                output.push('\n');
            }
        }
    }
}

/// Print a result set to stdout. Error items turn into a failing exit status.
pub fn emit(result_set: &ResultSet, config: RenderConfig) -> anyhow::Result<()> {
    let output = Renderer::with_config(config).render(result_set);
    if !output.is_empty() {
        println!("{}", output);
    }

    if !result_set.has_errors() {
        return Ok(());
    }
    match result_set.items.iter().flat_map(|item| item.errors.iter()).next() {
        Some(error) => anyhow::bail!("{}: {}", error.code, error.message),
        None => anyhow::bail!("command failed"),
    }
}
