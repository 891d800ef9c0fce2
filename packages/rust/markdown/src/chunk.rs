//! Content chunks and structural data within them.

use std::sync::LazyLock;

use regex::Regex;

use crate::payload::{PAYLOAD_MARKER, extract_payload};

/// Top-level heading line.
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.*?)[ \t]*\r?$").expect("valid regex"));

/// Fenced mermaid block.
static MERMAID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid\r?\n(.*?)\r?\n```").expect("valid regex"));

/// Collect content chunks from a page's script payloads.
///
/// A decoded payload is accepted when, trimmed, it starts with a top-level
/// heading marker and is at least `min_len` characters long.
pub fn extract_chunks<'a, I>(scripts: I, min_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    scripts
        .into_iter()
        .filter(|script| script.contains(PAYLOAD_MARKER))
        .filter_map(extract_payload)
        .map(|payload| payload.text.trim().to_string())
        .filter(|text| text.starts_with("# ") && text.chars().count() >= min_len)
        .collect()
}

/// Text of the first top-level heading in `md`.
pub fn leading_heading(md: &str) -> Option<&str> {
    H1_RE
        .captures(md)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Bodies of all fenced mermaid blocks, in order.
pub fn extract_diagrams(md: &str) -> Vec<String> {
    MERMAID_RE
        .captures_iter(md)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
