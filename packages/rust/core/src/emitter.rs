//! Page emission and index persistence.
//!
//! One document per site-map record, placed by canonical path: `/` becomes
//! `index.<ext>`, any other path mirrors its segments (`/guide/setup` →
//! `guide/setup.<ext>`). Every write goes to a temp file first and is then
//! renamed into place.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use wikiport_markdown::{cleanup, slugify};
use wikiport_shared::{MigrationIndex, PageRecord, PageState, Result, SiteMap, WikiportError};

use crate::pipeline::ProgressReporter;

/// Outcome of emitting a site map.
#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub written: usize,
    /// Emitted pages that had no content.
    pub empty: usize,
    /// Records not yet in a state that allows emission.
    pub skipped: usize,
    /// Pages whose document could not be written; they stay `LinksResolved`.
    pub failed: usize,
}

/// Output file for `canonical_path` under `root`.
pub fn output_path(root: &Path, canonical_path: &str, extension: &str) -> PathBuf {
    let segments: Vec<String> = canonical_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let slug = slugify(s);
            if slug.is_empty() { s.to_string() } else { slug }
        })
        .collect();

    let Some((file, dirs)) = segments.split_last() else {
        return root.join(format!("index.{extension}"));
    };

    let mut path = root.to_path_buf();
    for dir in dirs {
        path.push(dir);
    }
    path.push(format!("{file}.{extension}"));
    path
}

/// Canonical path of an emitted document, the inverse of [`output_path`].
///
/// Returns `None` for files outside `root`.
pub fn canonical_path_of(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?.with_extension("");
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    match segments.split_last() {
        None => None,
        Some((last, [])) if last == "index" => Some("/".to_string()),
        Some((last, dirs)) if last == "index" => Some(format!("/{}", dirs.join("/"))),
        Some(_) => Some(format!("/{}", segments.join("/"))),
    }
}

/// Full document text for one record: frontmatter plus cleaned body.
pub fn render_document(record: &PageRecord) -> String {
    let body = record
        .rewritten_markdown
        .as_deref()
        .or(record.content.as_ref().map(|c| c.markdown.as_str()))
        .unwrap_or_default();

    let frontmatter = cleanup::build_frontmatter(record.title());
    let body = cleanup::run_pipeline(body, record.title());
    if body.trim().is_empty() {
        return frontmatter;
    }
    format!("{frontmatter}\n{body}")
}

/// Write every emittable record under `root` and advance it to `Emitted`.
///
/// Records already `Emitted` are written again and keep their state. A page
/// whose write fails is logged and counted, and the remaining pages are still
/// written.
#[instrument(skip_all, fields(root = %root.display(), pages = site_map.len()))]
pub fn emit(
    site_map: &mut SiteMap,
    root: &Path,
    extension: &str,
    progress: &dyn ProgressReporter,
) -> Result<EmitReport> {
    let mut report = EmitReport::default();
    let total = site_map.len();

    for (i, record) in site_map.iter_mut().enumerate() {
        if record.state < PageState::LinksResolved {
            warn!(
                reference = record.reference(),
                state = ?record.state,
                "page not ready for emission"
            );
            report.skipped += 1;
            continue;
        }

        let path = output_path(root, record.canonical_path(), extension);
        if let Err(e) = write_atomic(&path, render_document(record).as_bytes()) {
            warn!(
                reference = record.reference(),
                path = %path.display(),
                error = %e,
                "failed to write page"
            );
            report.failed += 1;
            continue;
        }
        debug!(path = %path.display(), title = record.title(), "wrote page");

        if record.content.is_none() {
            report.empty += 1;
        }
        if record.state == PageState::LinksResolved {
            record.advance(PageState::Emitted)?;
        }
        report.written += 1;
        progress.page_emitted(record.canonical_path(), i + 1, total);
    }

    info!(
        written = report.written,
        empty = report.empty,
        skipped = report.skipped,
        failed = report.failed,
        "emission complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Index persistence
// ---------------------------------------------------------------------------

/// Persist the migration index as pretty-printed JSON.
pub fn write_index(path: &Path, index: &MigrationIndex) -> Result<()> {
    let json = serde_json::to_string_pretty(index)?;
    write_atomic(path, json.as_bytes())?;
    info!(path = %path.display(), pages = index.pages.len(), "wrote index");
    Ok(())
}

pub fn read_index(path: &Path) -> Result<MigrationIndex> {
    let content = std::fs::read_to_string(path).map_err(|e| WikiportError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        WikiportError::validation(format!("invalid index {}: {e}", path.display()))
    })
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WikiportError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, contents).map_err(|e| WikiportError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(WikiportError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::content::content_block;
    use wikiport_shared::NavigationNode;

    fn record(title: &str, path: &str, body: Option<&str>) -> PageRecord {
        let mut record = PageRecord::new(
            NavigationNode {
                original_reference: format!("/acme/widget/{}", slugify(title)),
                title: title.into(),
                depth: 0,
                canonical_path: path.into(),
            },
            "",
        );
        record.content = body.map(content_block);
        record.advance(PageState::ContentResolved).unwrap();
        record.advance(PageState::LinksResolved).unwrap();
        record
    }

    #[test]
    fn output_paths_mirror_segments() {
        let root = Path::new("docs");
        assert_eq!(output_path(root, "/", "mdx"), root.join("index.mdx"));
        assert_eq!(output_path(root, "/guide", "mdx"), root.join("guide.mdx"));
        assert_eq!(
            output_path(root, "/Reference/API Docs", "md"),
            root.join("reference").join("api-docs.md")
        );
    }

    #[test]
    fn canonical_path_inverts_output_path() {
        let root = Path::new("docs");
        for path in ["/", "/guide", "/guide/setup"] {
            let file = output_path(root, path, "mdx");
            assert_eq!(canonical_path_of(root, &file).as_deref(), Some(path));
        }
        assert_eq!(
            canonical_path_of(root, &root.join("guide").join("index.mdx")).as_deref(),
            Some("/guide")
        );
        assert_eq!(canonical_path_of(root, Path::new("elsewhere/x.mdx")), None);
    }

    #[test]
    fn document_prefers_rewritten_markdown_and_drops_title_h1() {
        let mut page = record("Setup", "/setup", Some("# Setup\n\n[a](/x)"));
        page.rewritten_markdown = Some("# Setup\n\n[a](/y)".into());
        assert_eq!(
            render_document(&page),
            "---\ntitle: \"Setup\"\n---\n\n[a](/y)\n"
        );
    }

    #[test]
    fn contentless_page_is_frontmatter_only() {
        let page = record("Empty", "/empty", None);
        assert_eq!(render_document(&page), "---\ntitle: \"Empty\"\n---\n");
    }

    #[test]
    fn emit_writes_tree_and_advances_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = SiteMap::from_records(vec![
            record("Overview", "/", Some("# Overview\n\nHello")),
            record("Setup", "/guide/setup", None),
        ])
        .unwrap();

        let report = emit(&mut map, dir.path(), "mdx", &SilentProgress).unwrap();
        assert_eq!((report.written, report.empty, report.skipped), (2, 1, 0));
        assert!(dir.path().join("index.mdx").exists());
        assert!(dir.path().join("guide").join("setup.mdx").exists());
        assert!(map.iter().all(|r| r.state == PageState::Emitted));

        // Re-emission rewrites files without moving state.
        let again = emit(&mut map, dir.path(), "mdx", &SilentProgress).unwrap();
        assert_eq!(again.written, 2);
    }

    #[test]
    fn failed_write_does_not_stop_other_pages() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the output file makes that write fail.
        std::fs::create_dir_all(dir.path().join("guide.mdx")).unwrap();
        let mut map = SiteMap::from_records(vec![
            record("Guide", "/guide", Some("# Guide\n\nBody")),
            record("Usage", "/usage", Some("# Usage\n\nBody")),
        ])
        .unwrap();

        let report = emit(&mut map, dir.path(), "mdx", &SilentProgress).unwrap();
        assert_eq!((report.written, report.failed), (1, 1));
        assert!(dir.path().join("usage.mdx").is_file());
        assert!(!dir.path().join(".guide.mdx.tmp").exists());

        let states: Vec<PageState> = map.iter().map(|r| r.state).collect();
        assert_eq!(states, vec![PageState::LinksResolved, PageState::Emitted]);
    }

    #[test]
    fn emit_skips_unresolved_pages() {
        let dir = tempfile::tempdir().unwrap();
        let page = PageRecord::new(
            NavigationNode {
                original_reference: "/x".into(),
                title: "X".into(),
                depth: 0,
                canonical_path: "/x".into(),
            },
            "",
        );
        let mut map = SiteMap::from_records(vec![page]).unwrap();
        let report = emit(&mut map, dir.path(), "md", &SilentProgress).unwrap();
        assert_eq!(report.skipped, 1);
        assert!(!dir.path().join("x.md").exists());
    }

    #[test]
    fn index_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");
        let map = SiteMap::from_records(vec![record("Setup", "/setup", None)]).unwrap();

        write_index(&path, &MigrationIndex::new("https://wiki.example.com", map)).unwrap();
        let loaded = read_index(&path).unwrap();
        assert_eq!(loaded.pages.len(), 1);
        assert!(loaded.pages[0].content.is_none());
        assert!(!dir.path().join("nested").join(".index.json.tmp").exists());
    }
}
