//! Markdown link scanning.
//!
//! Inline links only (`[text](href)`); image links (`![alt](src)`) are never
//! reported or rewritten.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Introductory summary text of the collapsible source-file block.
pub const SOURCE_FILES_MARKER: &str = "Relevant source files";

/// `[text](href)` on a single line.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]*)\]\(([^)\n]*)\)").expect("valid regex"));

/// The collapsible `<details>` block listing relevant source files.
static SOURCE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)<details>\s*<summary>\s*{}\s*</summary>(.*?)</details>",
        regex::escape(SOURCE_FILES_MARKER)
    ))
    .expect("valid regex")
});

/// `- [text](href)` list items inside the source-file block.
static LIST_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\s*\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));

/// A markdown link located in some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownLink<'a> {
    pub text: &'a str,
    pub href: &'a str,
    /// Byte range of the whole `[text](href)` in the scanned text.
    pub range: Range<usize>,
}

impl<'a> MarkdownLink<'a> {
    fn from_captures(caps: &Captures<'a>) -> Self {
        Self {
            text: caps.get(1).map_or("", |m| m.as_str()),
            href: caps.get(2).map_or("", |m| m.as_str()),
            range: caps.get(0).map_or(0..0, |m| m.range()),
        }
    }
}

/// The source-file block and the links listed in it.
#[derive(Debug, Clone)]
pub struct SourceFileBlock<'a> {
    /// Byte range of the whole `<details>…</details>` element.
    pub range: Range<usize>,
    pub links: Vec<MarkdownLink<'a>>,
}

/// Render `[text](href)`.
pub fn render_link(text: &str, href: &str) -> String {
    format!("[{text}]({href})")
}

fn is_image(md: &str, start: usize) -> bool {
    start > 0 && md.as_bytes()[start - 1] == b'!'
}

/// Replace non-image links for which `rewrite` returns `Some`; leave the rest untouched.
pub fn replace_links<F>(md: &str, mut rewrite: F) -> String
where
    F: FnMut(&MarkdownLink<'_>) -> Option<String>,
{
    LINK_RE
        .replace_all(md, |caps: &Captures| {
            let link = MarkdownLink::from_captures(caps);
            if is_image(md, link.range.start) {
                return caps[0].to_string();
            }
            rewrite(&link).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Locate the first source-file block and its list links.
pub fn find_source_file_block(md: &str) -> Option<SourceFileBlock<'_>> {
    let caps = SOURCE_BLOCK_RE.captures(md)?;
    let whole = caps.get(0)?;
    let inner = caps.get(1)?;
    let offset = inner.start();

    let links = LIST_LINK_RE
        .captures_iter(inner.as_str())
        .filter_map(|c| {
            let text = c.get(1)?;
            let href = c.get(2)?;
            let whole = c.get(0)?;
            Some(MarkdownLink {
                text: text.as_str().trim(),
                href: href.as_str().trim(),
                range: (offset + whole.start())..(offset + whole.end()),
            })
        })
        .filter(|l| !l.text.is_empty() && !l.href.is_empty())
        .collect();

    Some(SourceFileBlock {
        range: whole.range(),
        links,
    })
}
