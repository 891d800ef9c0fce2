//! Text-level building blocks for migrating wiki content.
//!
//! Everything here is a pure function over strings:
//! - [`slugify`]: title → URL-safe slug
//! - [`parse_citation`]: `path[:start[-end]]` → `(path, #L fragment)`
//! - [`replace_links`] / [`find_source_file_block`]: markdown link scanning
//! - [`extract_payload`] / [`extract_chunks`]: embedded content payloads
//! - [`cleanup`]: final body cleanup and frontmatter

mod chunk;
mod citation;
pub mod cleanup;
mod links;
mod payload;
mod slug;

pub use chunk::{extract_chunks, extract_diagrams, leading_heading};
pub use citation::{is_citation, parse_citation};
pub use links::{
    MarkdownLink, SOURCE_FILES_MARKER, SourceFileBlock, find_source_file_block,
    render_link, replace_links,
};
pub use payload::{DecodeTier, DecodedPayload, PAYLOAD_MARKER, decode_payload, extract_payload};
pub use slug::slugify;
