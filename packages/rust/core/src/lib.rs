//! Site-map construction and cross-reference resolution for wikiport.
//!
//! This crate ties navigation reading, content extraction, and link rewriting
//! into end-to-end workflows (e.g., [`migrate`]).

pub mod content;
pub mod emitter;
pub mod fixup;
pub mod index;
pub mod links;
pub mod pipeline;
pub mod sitemap;

#[cfg(test)]
mod testing;

pub use content::{ChunkIndex, ContentReport, resolve_content};
pub use emitter::{EmitReport, emit, output_path, read_index, render_document, write_index};
pub use fixup::{FixupReport, fix_links};
pub use index::LinkIndex;
pub use links::{LinkReport, LinkRules, PageLinks, Substitutions, resolve_all, resolve_page_links};
pub use pipeline::{
    MigrateResult, ProgressReporter, SilentProgress, emit_from_index, fix_links_from_index,
    migrate,
};
pub use sitemap::{PathAssigner, PathContext, extract_site_map, has_root_page};
