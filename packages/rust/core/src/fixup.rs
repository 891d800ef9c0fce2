//! Offline link fixes over an already-emitted document tree.
//!
//! Works from the persisted index alone; nothing is fetched. Two rewrites
//! are applied to every document:
//!
//! - in-page anchors whose link text names another page become
//!   `/that/page#anchor`
//! - citation links on `Sources:` lines that still have no real target are
//!   pointed at the repository

use std::path::Path;

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use wikiport_markdown::{is_citation, parse_citation, render_link, replace_links};
use wikiport_shared::{Result, SiteMap, WikiportError};

use crate::emitter::{canonical_path_of, write_atomic};
use crate::index::LinkIndex;
use crate::links::{is_citation_line, repository_url};

#[derive(Debug, Clone, Default)]
pub struct FixupReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub anchors_converted: usize,
    pub citations_fixed: usize,
}

/// Rewrite links in every `*.<extension>` file under `docs_dir`.
#[instrument(skip_all, fields(docs_dir = %docs_dir.display()))]
pub fn fix_links(
    docs_dir: &Path,
    extension: &str,
    site_map: &SiteMap,
    repo_prefix: &str,
) -> Result<FixupReport> {
    if !docs_dir.is_dir() {
        return Err(WikiportError::validation(format!(
            "docs directory {} does not exist",
            docs_dir.display()
        )));
    }

    let index = LinkIndex::build(site_map);
    let mut report = FixupReport::default();

    for entry in WalkDir::new(docs_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(extension)
        {
            continue;
        }

        let Some(page_path) = canonical_path_of(docs_dir, path) else {
            continue;
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable document");
                continue;
            }
        };
        report.files_scanned += 1;

        let fixed = fix_document(&content, &page_path, &index, repo_prefix);
        if fixed.text != content {
            write_atomic(path, fixed.text.as_bytes())?;
            report.files_changed += 1;
            report.anchors_converted += fixed.anchors;
            report.citations_fixed += fixed.citations;
            debug!(
                path = %path.display(),
                anchors = fixed.anchors,
                citations = fixed.citations,
                "document updated"
            );
        }
    }

    info!(
        scanned = report.files_scanned,
        changed = report.files_changed,
        "link fixes applied"
    );
    Ok(report)
}

/// A document after fixes.
#[derive(Debug, Clone)]
pub struct FixedDocument {
    pub text: String,
    pub anchors: usize,
    pub citations: usize,
}

/// Apply both rewrites to one document whose own canonical path is `page_path`.
pub fn fix_document(
    content: &str,
    page_path: &str,
    index: &LinkIndex,
    repo_prefix: &str,
) -> FixedDocument {
    let mut citations = 0usize;
    let text: String = content
        .split_inclusive('\n')
        .map(|line| {
            if !is_citation_line(line) {
                return line.to_string();
            }
            replace_links(line, |link| {
                let text = link.text.trim();
                let href = link.href.trim();
                let unresolved = href.is_empty() || href == "#" || href == text;
                if !unresolved || !is_citation(text) {
                    return None;
                }
                let (path, fragment) = parse_citation(text);
                citations += 1;
                Some(render_link(
                    link.text,
                    &format!("{}{fragment}", repository_url(repo_prefix, &path)),
                ))
            })
        })
        .collect();

    let mut anchors = 0usize;
    let text = replace_links(&text, |link| {
        let href = link.href.trim();
        if href.len() < 2 || !href.starts_with('#') || href.contains(['/', ':']) {
            return None;
        }
        let target = index.resolve_title(link.text)?;
        if target == page_path {
            return None;
        }
        anchors += 1;
        Some(render_link(link.text, &format!("{target}{href}")))
    });

    FixedDocument {
        text,
        anchors,
        citations,
    }
}
