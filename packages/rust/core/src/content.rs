//! Content resolution.
//!
//! Content comes from two channels: one bulk fetch of the site's base URL,
//! whose chunks are matched to pages by heading, and one fallback fetch per
//! page still missing content afterwards. Neither failing is fatal.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use wikiport_crawler::PageFetcher;
use wikiport_markdown::{extract_chunks, extract_diagrams, leading_heading, slugify};
use wikiport_shared::{ContentBlock, MigrateConfig, PageState, Result, SiteMap};

use crate::pipeline::ProgressReporter;

/// Outcome of content resolution over a whole site map.
#[derive(Debug, Clone, Default)]
pub struct ContentReport {
    /// Chunks accepted from the bulk payload.
    pub bulk_chunks: usize,
    pub from_bulk: usize,
    pub from_fallback: usize,
    /// References of pages left without content.
    pub without_content: Vec<String>,
}

// ---------------------------------------------------------------------------
// ChunkIndex
// ---------------------------------------------------------------------------

/// Content chunks keyed by heading text and by heading slug.
#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    chunks: Vec<String>,
    by_key: HashMap<String, usize>,
}

impl ChunkIndex {
    /// Index chunks by their leading heading. The first chunk wins a key.
    pub fn build(chunks: Vec<String>) -> Self {
        let mut by_key = HashMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let Some(heading) = leading_heading(chunk) else {
                continue;
            };
            by_key.entry(heading.to_string()).or_insert(i);
            let slug = slugify(heading);
            if !slug.is_empty() {
                by_key.entry(slug).or_insert(i);
            }
        }
        Self { chunks, by_key }
    }

    /// Chunk for `title`: exact heading first, then slug.
    pub fn lookup(&self, title: &str) -> Option<&str> {
        self.by_key
            .get(title)
            .or_else(|| self.by_key.get(&slugify(title)))
            .and_then(|&i| self.chunks.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// First chunk whose heading is exactly `title`.
pub fn match_exact<'a>(chunks: &'a [String], title: &str) -> Option<&'a str> {
    chunks
        .iter()
        .find(|chunk| leading_heading(chunk) == Some(title))
        .map(String::as_str)
}

/// Wrap matched markdown with its diagrams and digest.
pub fn content_block(markdown: &str) -> ContentBlock {
    let mut hasher = Sha256::new();
    hasher.update(markdown.as_bytes());
    ContentBlock {
        markdown: markdown.to_string(),
        diagrams: extract_diagrams(markdown),
        sha256: format!("{:x}", hasher.finalize()),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Attach content to every page and move all pages to `ContentResolved`.
#[instrument(skip_all, fields(pages = site_map.len()))]
pub async fn resolve_content<F: PageFetcher>(
    site_map: &mut SiteMap,
    fetcher: &F,
    config: &MigrateConfig,
    progress: &dyn ProgressReporter,
) -> Result<ContentReport> {
    let mut report = ContentReport::default();

    // --- Bulk channel ---
    let bulk = match fetcher.fetch(config.source_url.as_str()).await {
        Ok(artifacts) => ChunkIndex::build(extract_chunks(
            artifacts.scripts.iter().map(String::as_str),
            config.min_content_len,
        )),
        Err(e) => {
            warn!(error = %e, "bulk fetch failed, relying on per-page fetches");
            ChunkIndex::default()
        }
    };
    report.bulk_chunks = bulk.len();
    info!(chunks = bulk.len(), "bulk content extracted");

    for record in site_map.iter_mut() {
        if let Some(markdown) = bulk.lookup(record.title()) {
            record.content = Some(content_block(markdown));
            report.from_bulk += 1;
        }
    }
    info!(pages = report.from_bulk, "pages matched from bulk content");

    // --- Per-page fallback ---
    let missing: Vec<(String, String, String)> = site_map
        .iter()
        .filter(|r| r.content.is_none())
        .map(|r| {
            (
                r.reference().to_string(),
                r.title().to_string(),
                r.source_url.clone(),
            )
        })
        .collect();
    let total = missing.len();

    for (i, (reference, title, url)) in missing.into_iter().enumerate() {
        debug!(%reference, %url, "fallback fetch");
        let found = match fetcher.fetch(&url).await {
            Ok(artifacts) => {
                let chunks = extract_chunks(
                    artifacts.scripts.iter().map(String::as_str),
                    config.min_content_len,
                );
                match_exact(&chunks, &title).map(content_block)
            }
            Err(e) => {
                warn!(%reference, error = %e, "fallback fetch failed");
                None
            }
        };
        progress.page_fetched(&reference, i + 1, total);

        match found {
            Some(block) => {
                if let Some(record) = site_map.get_mut(&reference) {
                    record.content = Some(block);
                }
                report.from_fallback += 1;
            }
            None => {
                warn!(%reference, %title, "no content found for page");
                report.without_content.push(reference);
            }
        }
    }

    for record in site_map.iter_mut() {
        record.advance(PageState::ContentResolved)?;
    }

    info!(
        from_bulk = report.from_bulk,
        from_fallback = report.from_fallback,
        without_content = report.without_content.len(),
        "content resolved"
    );
    Ok(report)
}
