//! Core domain types for a wikiport migration run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WikiportError};

/// Current schema version for the persisted index format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// One raw entry as read from the source site's navigation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    /// Visible link text.
    pub title: String,
    /// Source-site path of the linked page.
    pub reference: String,
    /// Left indentation of the entry in pixels.
    pub indent_px: u32,
}

impl NavItem {
    pub fn new(title: impl Into<String>, reference: impl Into<String>, indent_px: u32) -> Self {
        Self {
            title: title.into(),
            reference: reference.into(),
            indent_px,
        }
    }
}

/// A navigation entry with its depth and assigned output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationNode {
    /// Source-site path; unique key within a site map.
    pub original_reference: String,
    /// Display title (after overrides).
    pub title: String,
    /// Nesting depth, 0 = top level.
    pub depth: u32,
    /// Output path in the target scheme; always starts with `/`.
    pub canonical_path: String,
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Which rewrite rule produced a [`ResolvedLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkContext {
    /// A link from the page's collapsible list of relevant source files.
    SourceFileList,
    /// A `path[:start[-end]]` citation on a `Sources:` line.
    InlineCitation,
    /// Any other markdown link in the page body.
    BodyLink,
}

impl LinkContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceFileList => "source-file-list",
            Self::InlineCitation => "inline-citation",
            Self::BodyLink => "body-link",
        }
    }
}

impl std::fmt::Display for LinkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link found in page content together with its rewritten target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    /// Link text as it appeared.
    pub text: String,
    /// Rewritten target. Empty when resolution was deferred.
    pub href: String,
    /// Target as it appeared in the source content.
    pub original_reference: String,
    pub context: LinkContext,
}

impl ResolvedLink {
    fn key(&self) -> (&str, &str, LinkContext) {
        (&self.text, &self.original_reference, self.context)
    }
}

/// Per-page list of resolved links, unique by `(text, original_reference, context)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedLinks(Vec<ResolvedLink>);

impl ResolvedLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link unless an entry with the same text, reference and context exists.
    /// Returns whether the link was added.
    pub fn insert(&mut self, link: ResolvedLink) -> bool {
        if self.0.iter().any(|l| l.key() == link.key()) {
            return false;
        }
        self.0.push(link);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedLink> {
        self.0.iter()
    }

    /// Links produced by one rewrite rule, in insertion order.
    pub fn with_context(&self, context: LinkContext) -> impl Iterator<Item = &ResolvedLink> {
        self.0.iter().filter(move |l| l.context == context)
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Content matched to a page, plus structural data extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Raw markdown payload as extracted.
    pub markdown: String,
    /// Bodies of fenced `mermaid` diagram blocks.
    #[serde(default)]
    pub diagrams: Vec<String>,
    /// SHA-256 of `markdown`, hex encoded.
    pub sha256: String,
}

// ---------------------------------------------------------------------------
// Page lifecycle
// ---------------------------------------------------------------------------

/// Processing state of one page. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Unvisited,
    ContentResolved,
    LinksResolved,
    Emitted,
}

impl PageState {
    /// The only state this one may move to.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Unvisited => Some(Self::ContentResolved),
            Self::ContentResolved => Some(Self::LinksResolved),
            Self::LinksResolved => Some(Self::Emitted),
            Self::Emitted => None,
        }
    }
}

/// A site map entry: navigation node, resolved content and links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(flatten)]
    pub node: NavigationNode,
    /// Absolute source URL, used for the per-page fallback fetch.
    pub source_url: String,
    pub state: PageState,
    /// `None` until content is found; stays `None` if neither channel had it.
    pub content: Option<ContentBlock>,
    /// Content after link rewriting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_markdown: Option<String>,
    #[serde(default)]
    pub links: ResolvedLinks,
}

impl PageRecord {
    pub fn new(node: NavigationNode, source_url: impl Into<String>) -> Self {
        Self {
            node,
            source_url: source_url.into(),
            state: PageState::Unvisited,
            content: None,
            rewritten_markdown: None,
            links: ResolvedLinks::new(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.node.original_reference
    }

    pub fn title(&self) -> &str {
        &self.node.title
    }

    pub fn canonical_path(&self) -> &str {
        &self.node.canonical_path
    }

    /// Move to `next`, which must be the direct successor of the current state.
    pub fn advance(&mut self, next: PageState) -> Result<()> {
        if self.state.successor() != Some(next) {
            return Err(WikiportError::validation(format!(
                "page '{}': illegal transition {:?} -> {next:?}",
                self.node.original_reference, self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SiteMap
// ---------------------------------------------------------------------------

/// Ordered collection of page records keyed by `original_reference`.
#[derive(Debug, Clone, Default)]
pub struct SiteMap {
    records: Vec<PageRecord>,
    positions: HashMap<String, usize>,
}

impl SiteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records, rejecting duplicate references.
    pub fn from_records(records: Vec<PageRecord>) -> Result<Self> {
        let mut map = Self::new();
        for record in records {
            let reference = record.reference().to_string();
            if !map.insert(record) {
                return Err(WikiportError::validation(format!(
                    "duplicate reference '{reference}' in site map"
                )));
            }
        }
        Ok(map)
    }

    /// Append a record. Returns `false` (and drops the record) if its key exists.
    pub fn insert(&mut self, record: PageRecord) -> bool {
        if self.positions.contains_key(record.reference()) {
            return false;
        }
        self.positions
            .insert(record.reference().to_string(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, reference: &str) -> Option<&PageRecord> {
        self.positions.get(reference).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, reference: &str) -> Option<&mut PageRecord> {
        let i = *self.positions.get(reference)?;
        self.records.get_mut(i)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.positions.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageRecord> {
        self.records.iter_mut()
    }

    pub fn into_records(self) -> Vec<PageRecord> {
        self.records
    }
}

// ---------------------------------------------------------------------------
// MigrationIndex
// ---------------------------------------------------------------------------

/// The persisted index written at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationIndex {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Identifier of the run that produced this index.
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Base URL of the migrated site.
    pub source_url: String,
    /// One record per navigation entry, in navigation order.
    pub pages: Vec<PageRecord>,
}

impl MigrationIndex {
    pub fn new(source_url: impl Into<String>, site_map: SiteMap) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: Uuid::now_v7(),
            generated_at: Utc::now(),
            source_url: source_url.into(),
            pages: site_map.into_records(),
        }
    }

    /// Check the schema version and rebuild the site map.
    pub fn into_site_map(mut self) -> Result<SiteMap> {
        self.take_site_map()
    }

    /// Like [`into_site_map`](Self::into_site_map), but leaves the run
    /// metadata in place so the pages can be put back with
    /// [`replace_pages`](Self::replace_pages).
    pub fn take_site_map(&mut self) -> Result<SiteMap> {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(WikiportError::validation(format!(
                "unsupported schema_version: {} (expected {CURRENT_SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        SiteMap::from_records(std::mem::take(&mut self.pages))
    }

    /// Store updated pages; `id` and `generated_at` are unchanged.
    pub fn replace_pages(&mut self, site_map: SiteMap) {
        self.pages = site_map.into_records();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(reference: &str, title: &str, path: &str) -> NavigationNode {
        NavigationNode {
            original_reference: reference.into(),
            title: title.into(),
            depth: 0,
            canonical_path: path.into(),
        }
    }

    fn link(text: &str, reference: &str, context: LinkContext) -> ResolvedLink {
        ResolvedLink {
            text: text.into(),
            href: "https://example.com/x".into(),
            original_reference: reference.into(),
            context,
        }
    }

    #[test]
    fn resolved_links_suppress_duplicate_triples() {
        let mut links = ResolvedLinks::new();
        assert!(links.insert(link("a.py:1", "#", LinkContext::InlineCitation)));
        assert!(!links.insert(link("a.py:1", "#", LinkContext::InlineCitation)));
        // Same text and reference under another context is a distinct entry.
        assert!(links.insert(link("a.py:1", "#", LinkContext::BodyLink)));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn page_state_only_moves_forward() {
        let mut record = PageRecord::new(node("/w/1-intro", "Intro", "/"), "https://w/1-intro");
        assert!(record.advance(PageState::LinksResolved).is_err());
        record.advance(PageState::ContentResolved).expect("forward");
        record.advance(PageState::LinksResolved).expect("forward");
        assert!(record.advance(PageState::ContentResolved).is_err());
        record.advance(PageState::Emitted).expect("forward");
        assert!(record.advance(PageState::Emitted).is_err());
    }

    #[test]
    fn site_map_keys_are_unique_and_ordered() {
        let mut map = SiteMap::new();
        assert!(map.insert(PageRecord::new(node("/b", "B", "/b"), "")));
        assert!(map.insert(PageRecord::new(node("/a", "A", "/a"), "")));
        assert!(!map.insert(PageRecord::new(node("/b", "B2", "/b2"), "")));

        let refs: Vec<&str> = map.iter().map(|r| r.reference()).collect();
        assert_eq!(refs, vec!["/b", "/a"]);
        assert_eq!(map.get("/b").map(|r| r.title()), Some("B"));
    }

    #[test]
    fn index_serializes_null_content_and_kebab_contexts() {
        let mut map = SiteMap::new();
        let mut record = PageRecord::new(node("/w/2-setup", "Setup", "/setup"), "");
        record
            .links
            .insert(link("setup.py", "setup.py", LinkContext::SourceFileList));
        map.insert(record);

        let index = MigrationIndex::new("https://w", map);
        let json = serde_json::to_value(&index).expect("serialize");
        let page = &json["pages"][0];
        assert!(page["content"].is_null());
        assert_eq!(page["canonical_path"], "/setup");
        assert_eq!(page["state"], "unvisited");
        assert_eq!(page["links"][0]["context"], "source-file-list");

        let parsed: MigrationIndex = serde_json::from_value(json).expect("deserialize");
        let map = parsed.into_site_map().expect("site map");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn index_rejects_unknown_schema() {
        let mut index = MigrationIndex::new("https://w", SiteMap::new());
        index.schema_version = 99;
        assert!(index.into_site_map().is_err());
    }
}
