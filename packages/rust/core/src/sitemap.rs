//! Navigation tree extraction and path assignment.
//!
//! The navigation arrives as a flat list where nesting is encoded only in the
//! indentation of each entry. A [`PathContext`] remembers, per depth, the
//! path most recently assigned at that depth; the parent of a node at depth
//! `d` is whatever was last assigned at `d - 1`.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, instrument, warn};

use wikiport_markdown::slugify;
use wikiport_shared::{MigrateConfig, NavItem, NavigationNode, PageRecord, PathOverride, SiteMap};

// ---------------------------------------------------------------------------
// PathContext
// ---------------------------------------------------------------------------

/// Most recently assigned canonical path at each depth.
///
/// Built fresh for every extraction run.
#[derive(Debug, Clone, Default)]
pub struct PathContext {
    by_depth: BTreeMap<u32, String>,
}

impl PathContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent path for a node at `depth`, if one has been recorded.
    pub fn parent_of(&self, depth: u32) -> Option<&str> {
        let parent_depth = depth.checked_sub(1)?;
        self.by_depth.get(&parent_depth).map(String::as_str)
    }

    pub fn record(&mut self, depth: u32, path: impl Into<String>) {
        self.by_depth.insert(depth, path.into());
    }
}

// ---------------------------------------------------------------------------
// PathAssigner
// ---------------------------------------------------------------------------

/// Computes canonical paths for navigation nodes in navigation order.
#[derive(Debug)]
pub struct PathAssigner<'a> {
    root_reference: &'a str,
    overrides: &'a BTreeMap<String, PathOverride>,
    context: PathContext,
}

impl<'a> PathAssigner<'a> {
    pub fn new(root_reference: &'a str, overrides: &'a BTreeMap<String, PathOverride>) -> Self {
        Self {
            root_reference,
            overrides,
            context: PathContext::new(),
        }
    }

    pub fn from_config(config: &'a MigrateConfig) -> Self {
        Self::new(&config.root_reference, &config.overrides)
    }

    /// Assign the canonical path of one node and record it as the parent
    /// context for its depth.
    ///
    /// `position` is the number of nodes already in the site map; it only
    /// feeds the `page-<n>` fallback slug.
    pub fn assign(&mut self, reference: &str, title: &str, depth: u32, position: usize) -> String {
        if is_same_reference(reference, self.root_reference) {
            self.context.record(0, "/");
            return "/".to_string();
        }

        if let Some(path) = self
            .overrides
            .get(reference)
            .and_then(|o| o.canonical_path.as_deref())
        {
            self.context.record(depth, path);
            return path.to_string();
        }

        let slug = node_slug(title, reference, position);
        let path = match self.context.parent_of(depth) {
            Some("/") | Some("") | None => format!("/{slug}"),
            Some(parent) => format!("{parent}/{slug}"),
        };

        self.context.record(depth, path.clone());
        path
    }
}

/// Slug of `title`, falling back to the last segment of `reference`, then to
/// `page-<position>`.
fn node_slug(title: &str, reference: &str, position: usize) -> String {
    let slug = slugify(title);
    if !slug.is_empty() {
        return slug;
    }

    let last_segment = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let slug = slugify(last_segment);
    if !slug.is_empty() {
        return slug;
    }

    format!("page-{position}")
}

fn is_same_reference(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Build the initial site map from raw navigation entries.
///
/// Entries with an empty title or reference are skipped, as are repeated
/// references (the first occurrence wins). Content and links stay unresolved.
#[instrument(skip_all, fields(entries = items.len()))]
pub fn extract_site_map(items: &[NavItem], config: &MigrateConfig) -> SiteMap {
    let mut site_map = SiteMap::new();
    let mut assigner = PathAssigner::from_config(config);
    let mut seen_paths: HashMap<String, String> = HashMap::new();
    let mut skipped = 0usize;

    for (position, item) in items.iter().enumerate() {
        let reference = item.reference.trim();
        let raw_title = item.title.trim();

        if raw_title.is_empty() || reference.is_empty() {
            warn!(
                position,
                title = raw_title,
                reference,
                "skipping navigation entry with empty title or reference"
            );
            skipped += 1;
            continue;
        }
        if site_map.contains(reference) {
            warn!(position, reference, "skipping duplicate navigation reference");
            skipped += 1;
            continue;
        }

        let title = config
            .overrides
            .get(reference)
            .and_then(|o| o.title.as_deref())
            .unwrap_or(raw_title);
        let depth = item.indent_px / config.indent_unit_px;
        let canonical_path = assigner.assign(reference, title, depth, site_map.len());

        if let Some(previous) = seen_paths.insert(canonical_path.clone(), reference.to_string()) {
            warn!(%canonical_path, previous = %previous, reference, "canonical path assigned twice");
        }

        let source_url = match config.source_url.join(reference) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(reference, error = %e, "could not build source URL");
                reference.to_string()
            }
        };

        debug!(depth, title, reference, %canonical_path, "mapped navigation entry");

        site_map.insert(PageRecord::new(
            NavigationNode {
                original_reference: reference.to_string(),
                title: title.to_string(),
                depth,
                canonical_path,
            },
            source_url,
        ));
    }

    if !site_map.is_empty() && !has_root_page(&site_map) {
        warn!(
            root_reference = %config.root_reference,
            "no navigation entry matched the root reference; no index document will be emitted"
        );
    }

    info!(pages = site_map.len(), skipped, "site map built");
    site_map
}

/// Whether some page was mapped to `/`.
pub fn has_root_page(site_map: &SiteMap) -> bool {
    site_map.iter().any(|r| r.canonical_path() == "/")
}
