//! Application configuration for wikiport.
//!
//! User config lives at `~/.wikiport/wikiport.toml`.
//! CLI flags and environment variables override config file values, which
//! override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, WikiportError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikiport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikiport";

// ---------------------------------------------------------------------------
// Config structs (matching wikiport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The site being migrated.
    #[serde(default)]
    pub source: SourceConfig,

    /// External code repository used for source-file links.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Where documents and the persisted index are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Fetch timing and content heuristics.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Per-reference title/path overrides, keyed by `original_reference`.
    #[serde(default)]
    pub overrides: BTreeMap<String, PathOverride>,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the source site. Required at run time.
    #[serde(default)]
    pub base_url: String,

    /// Reference of the page that maps to `/`. Defaults to the base URL's path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_reference: Option<String>,

    /// CSS selector for the element holding the navigation list.
    #[serde(default = "default_nav_container")]
    pub nav_container_selector: String,

    /// CSS selector (inside the container) for the list whose `li` children are entries.
    #[serde(default = "default_nav_list")]
    pub nav_list_selector: String,

    /// Pixels of `padding-left` per nesting level.
    #[serde(default = "default_indent_unit")]
    pub indent_unit_px: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            root_reference: None,
            nav_container_selector: default_nav_container(),
            nav_list_selector: default_nav_list(),
            indent_unit_px: default_indent_unit(),
        }
    }
}

fn default_nav_container() -> String {
    "div.border-r-border[class*='md:sticky']".into()
}
fn default_nav_list() -> String {
    "ul.flex-1".into()
}
fn default_indent_unit() -> u32 {
    12
}

/// `[repository]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Blob URL prefix, e.g. `https://github.com/org/repo/blob/main/`.
    #[serde(default)]
    pub blob_url_prefix: String,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the emitted document tree.
    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    /// Path of the persisted JSON index.
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// File extension of emitted documents (`md` or `mdx`).
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            index_path: default_index_path(),
            extension: default_extension(),
        }
    }
}

fn default_target_dir() -> String {
    "src/content/docs".into()
}
fn default_index_path() -> String {
    "wikiport-index.json".into()
}
fn default_extension() -> String {
    "mdx".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Bounded wait for a single fetch, in seconds.
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Fixed delay after a fetch completes, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Minimum trimmed length for a payload to count as a content chunk.
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            render_timeout_secs: default_render_timeout(),
            settle_delay_ms: default_settle_delay(),
            min_content_len: default_min_content_len(),
        }
    }
}

fn default_render_timeout() -> u64 {
    20
}
fn default_settle_delay() -> u64 {
    3000
}
fn default_min_content_len() -> usize {
    100
}

/// `[overrides."<reference>"]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOverride {
    /// Replacement display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fully specified canonical path (must start with `/`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Migrate config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime migration configuration, validated from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Base URL of the source site.
    pub source_url: Url,
    /// Reference that always maps to `/`.
    pub root_reference: String,
    /// CSS selector for the navigation container.
    pub nav_container_selector: String,
    /// CSS selector for the navigation list.
    pub nav_list_selector: String,
    /// Pixels per nesting level.
    pub indent_unit_px: u32,
    /// Repository blob URL prefix for source-file and citation links.
    pub repo_blob_prefix: String,
    /// Output document root.
    pub target_dir: PathBuf,
    /// Persisted index path.
    pub index_path: PathBuf,
    /// Emitted document extension.
    pub extension: String,
    /// Bounded wait per fetch.
    pub render_timeout: Duration,
    /// Settle delay after each fetch.
    pub settle_delay: Duration,
    /// Minimum chunk length heuristic.
    pub min_content_len: usize,
    /// Per-reference overrides.
    pub overrides: BTreeMap<String, PathOverride>,
}

impl TryFrom<&AppConfig> for MigrateConfig {
    type Error = WikiportError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        if config.source.base_url.trim().is_empty() {
            return Err(WikiportError::config(
                "source.base_url is not set (use --source-url or WIKIPORT_SOURCE_URL)",
            ));
        }
        let source_url = Url::parse(config.source.base_url.trim()).map_err(|e| {
            WikiportError::config(format!(
                "invalid source.base_url '{}': {e}",
                config.source.base_url
            ))
        })?;

        if config.source.indent_unit_px == 0 {
            return Err(WikiportError::config("source.indent_unit_px must be > 0"));
        }

        for (reference, over) in &config.overrides {
            if let Some(path) = &over.canonical_path {
                if !path.starts_with('/') {
                    return Err(WikiportError::config(format!(
                        "override for '{reference}': canonical_path '{path}' must start with '/'"
                    )));
                }
            }
        }

        let root_reference = config
            .source
            .root_reference
            .clone()
            .unwrap_or_else(|| default_root_reference(&source_url));

        Ok(Self {
            root_reference,
            nav_container_selector: config.source.nav_container_selector.clone(),
            nav_list_selector: config.source.nav_list_selector.clone(),
            indent_unit_px: config.source.indent_unit_px,
            repo_blob_prefix: config.repository.blob_url_prefix.clone(),
            target_dir: PathBuf::from(&config.output.target_dir),
            index_path: PathBuf::from(&config.output.index_path),
            extension: config.output.extension.trim_start_matches('.').to_string(),
            render_timeout: Duration::from_secs(config.fetch.render_timeout_secs),
            settle_delay: Duration::from_millis(config.fetch.settle_delay_ms),
            min_content_len: config.fetch.min_content_len,
            overrides: config.overrides.clone(),
            source_url,
        })
    }
}

/// The base URL's path without a trailing slash, or `/` for a bare origin.
fn default_root_reference(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikiport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WikiportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikiport/wikiport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WikiportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| WikiportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikiportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikiportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikiportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
