//! Shared types, error model, and configuration for wikiport.
//!
//! This crate is the foundation depended on by all other wikiport crates.
//! It provides:
//! - [`WikiportError`]: the unified error type
//! - Domain types ([`NavigationNode`], [`SiteMap`], [`PageRecord`], [`ResolvedLink`])
//! - Configuration ([`AppConfig`], [`MigrateConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, MigrateConfig, OutputConfig, PathOverride, RepositoryConfig,
    SourceConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, WikiportError};
pub use types::{
    CURRENT_SCHEMA_VERSION, ContentBlock, LinkContext, MigrationIndex, NavItem, NavigationNode,
    PageRecord, PageState, ResolvedLink, ResolvedLinks, SiteMap,
};
