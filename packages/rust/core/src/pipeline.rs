//! End-to-end `migrate` pipeline:
//! navigation → site map → link index → content → links → documents → index.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use wikiport_crawler::{NavigationReader, PageFetcher};
use wikiport_shared::{MigrateConfig, MigrationIndex, Result, WikiportError};

use crate::content::{ContentReport, resolve_content};
use crate::emitter::{self, EmitReport};
use crate::fixup::{self, FixupReport};
use crate::index::LinkIndex;
use crate::links::{LinkReport, LinkRules, resolve_all};
use crate::sitemap::extract_site_map;

/// Summary of a `migrate` run.
#[derive(Debug, Clone)]
pub struct MigrateResult {
    /// Identifier of the persisted index.
    pub run_id: String,
    pub index_path: std::path::PathBuf,
    /// Raw navigation entries read.
    pub navigation_entries: usize,
    /// Pages in the site map.
    pub pages: usize,
    pub content: ContentReport,
    pub links: LinkReport,
    /// `None` when emission was disabled.
    pub emitted: Option<EmitReport>,
    pub elapsed: Duration,
}

impl MigrateResult {
    pub fn pages_without_content(&self) -> usize {
        self.content.without_content.len()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each per-page fallback fetch.
    fn page_fetched(&self, reference: &str, current: usize, total: usize);
    /// Called after each document is written.
    fn page_emitted(&self, path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &MigrateResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _reference: &str, _current: usize, _total: usize) {}
    fn page_emitted(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &MigrateResult) {}
}

/// Run the full migration.
///
/// A navigation failure aborts before anything is written. Every other
/// per-page problem is logged and the run continues.
#[instrument(skip_all, fields(source_url = %config.source_url))]
pub async fn migrate<N, F>(
    config: &MigrateConfig,
    navigation: &N,
    fetcher: &F,
    emit: bool,
    progress: &dyn ProgressReporter,
) -> Result<MigrateResult>
where
    N: NavigationReader,
    F: PageFetcher,
{
    let start = Instant::now();
    info!("starting migration");

    // --- Phase 1: Navigation ---
    progress.phase("Reading navigation");
    let items = navigation.read().await?;
    let mut site_map = extract_site_map(&items, config);
    if site_map.is_empty() {
        return Err(WikiportError::Navigation(
            "navigation list has no usable entries".into(),
        ));
    }

    // --- Phase 2: Link index (paths are final from here on) ---
    let index = LinkIndex::build(&site_map);

    // --- Phase 3: Content ---
    progress.phase("Resolving content");
    let content = resolve_content(&mut site_map, fetcher, config, progress).await?;

    // --- Phase 4: Links ---
    progress.phase("Resolving links");
    let links = resolve_all(&mut site_map, &LinkRules::new(&index, config))?;

    // --- Phase 5: Documents ---
    let emitted = if emit {
        progress.phase("Writing documents");
        Some(emitter::emit(
            &mut site_map,
            &config.target_dir,
            &config.extension,
            progress,
        ))
    } else {
        None
    };

    // --- Phase 6: Index (written even when emission failed) ---
    progress.phase("Writing index");
    let pages = site_map.len();
    let migration_index = MigrationIndex::new(config.source_url.as_str(), site_map);
    emitter::write_index(&config.index_path, &migration_index)?;
    let emitted = emitted.transpose()?;

    let result = MigrateResult {
        run_id: migration_index.id.to_string(),
        index_path: config.index_path.clone(),
        navigation_entries: items.len(),
        pages,
        content,
        links,
        emitted,
        elapsed: start.elapsed(),
    };

    info!(
        pages = result.pages,
        without_content = result.pages_without_content(),
        links = result.links.links,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "migration complete"
    );
    progress.done(&result);

    Ok(result)
}

/// Emit documents from a persisted index without fetching anything, then
/// store the advanced page states back into the index. The index keeps the
/// `id` and `generated_at` of the run that produced it.
#[instrument(skip_all, fields(index = %index_path.display()))]
pub fn emit_from_index(
    index_path: &Path,
    target_dir: &Path,
    extension: &str,
    progress: &dyn ProgressReporter,
) -> Result<EmitReport> {
    let mut index = emitter::read_index(index_path)?;
    let mut site_map = index.take_site_map()?;

    progress.phase("Writing documents");
    let report = emitter::emit(&mut site_map, target_dir, extension, progress);
    index.replace_pages(site_map);
    emitter::write_index(index_path, &index)?;
    report
}

/// Run the offline link fixes against an emitted tree using a persisted index.
pub fn fix_links_from_index(
    index_path: &Path,
    docs_dir: &Path,
    extension: &str,
    repo_prefix: &str,
) -> Result<FixupReport> {
    let site_map = emitter::read_index(index_path)?.into_site_map()?;
    fixup::fix_links(docs_dir, extension, &site_map, repo_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BASE_URL, REPO_PREFIX, StubFetcher, StubNavigation, test_config};
    use wikiport_shared::{LinkContext, NavItem, PageState};

    const OVERVIEW: &str = "# Overview\n\nStart with the [Guide](/acme/widget/2-guide).";
    const GUIDE: &str = "# Guide\n\n<details>\n<summary>Relevant source files</summary>\n\n- [src/main.rs](src/main.rs)\n</details>\n\nRead [Setup](#prerequisites) first.\n\nSources: [src/main.rs:1-20](#)\n";

    fn navigation() -> StubNavigation {
        StubNavigation(Some(vec![
            NavItem::new("Overview", "/acme/widget/1-overview", 0),
            NavItem::new("Guide", "/acme/widget/2-guide", 0),
            NavItem::new("Setup", "/acme/widget/2.1-setup", 12),
            NavItem::new("", "/acme/widget/broken", 0),
        ]))
    }

    fn config_in(dir: &Path) -> MigrateConfig {
        let mut config = test_config();
        config.target_dir = dir.join("docs");
        config.index_path = dir.join("wikiport-index.json");
        config
    }

    #[tokio::test]
    async fn migrate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let fetcher = StubFetcher::new().with_page(BASE_URL, &[OVERVIEW, GUIDE]);

        let result = migrate(&config, &navigation(), &fetcher, true, &SilentProgress)
            .await
            .unwrap();

        assert_eq!((result.navigation_entries, result.pages), (4, 3));
        assert_eq!(result.pages_without_content(), 1);
        assert_eq!(result.emitted.as_ref().map(|e| e.written), Some(3));

        let guide = std::fs::read_to_string(config.target_dir.join("guide.mdx")).unwrap();
        assert!(guide.starts_with("---\ntitle: \"Guide\"\n---\n"));
        assert!(guide.contains("[Setup](/guide/setup#prerequisites)"));
        assert!(guide.contains(&format!("[src/main.rs:1-20]({REPO_PREFIX}src/main.rs#L1-L20)")));
        assert!(!guide.contains("# Guide"));

        let overview = std::fs::read_to_string(config.target_dir.join("index.mdx")).unwrap();
        assert!(overview.contains("[Guide](/guide)"));
        assert!(config.target_dir.join("guide").join("setup.mdx").exists());

        let index = emitter::read_index(&config.index_path).unwrap();
        assert_eq!(index.id.to_string(), result.run_id);
        let setup = index
            .pages
            .iter()
            .find(|p| p.node.canonical_path == "/guide/setup")
            .unwrap();
        assert!(setup.content.is_none());
        assert_eq!(setup.state, PageState::Emitted);

        let guide = index.pages.iter().find(|p| p.node.title == "Guide").unwrap();
        assert_eq!(guide.links.with_context(LinkContext::SourceFileList).count(), 1);
        assert_eq!(guide.links.with_context(LinkContext::InlineCitation).count(), 1);
        assert_eq!(guide.links.with_context(LinkContext::BodyLink).count(), 1);
    }

    #[tokio::test]
    async fn navigation_failure_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = migrate(
            &config,
            &StubNavigation(None),
            &StubFetcher::new(),
            true,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(err.is_abort());
        assert!(!config.index_path.exists());
        assert!(!config.target_dir.exists());
    }

    #[tokio::test]
    async fn empty_navigation_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let nav = StubNavigation(Some(vec![NavItem::new("", "", 0)]));

        let err = migrate(&config, &nav, &StubFetcher::new(), false, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, WikiportError::Navigation(_)));
    }

    #[tokio::test]
    async fn emit_later_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let fetcher = StubFetcher::new().with_page(BASE_URL, &[OVERVIEW, GUIDE]);

        let result = migrate(&config, &navigation(), &fetcher, false, &SilentProgress)
            .await
            .unwrap();
        assert!(result.emitted.is_none());
        assert!(!config.target_dir.exists());

        let report =
            emit_from_index(&config.index_path, &config.target_dir, "md", &SilentProgress)
                .unwrap();
        assert_eq!(report.written, 3);
        assert!(config.target_dir.join("index.md").exists());

        let index = emitter::read_index(&config.index_path).unwrap();
        assert!(index.pages.iter().all(|p| p.state == PageState::Emitted));
        assert_eq!(index.id.to_string(), result.run_id);
    }

    #[tokio::test]
    async fn failed_document_write_still_persists_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(config.target_dir.join("guide.mdx")).unwrap();
        let fetcher = StubFetcher::new().with_page(BASE_URL, &[OVERVIEW, GUIDE]);

        let result = migrate(&config, &navigation(), &fetcher, true, &SilentProgress)
            .await
            .unwrap();

        let emitted = result.emitted.as_ref().unwrap();
        assert_eq!((emitted.written, emitted.failed), (2, 1));
        assert!(config.target_dir.join("guide").join("setup.mdx").is_file());

        let index = emitter::read_index(&config.index_path).unwrap();
        let guide = index.pages.iter().find(|p| p.node.title == "Guide").unwrap();
        assert_eq!(guide.state, PageState::LinksResolved);
        assert!(guide.rewritten_markdown.is_some());
    }

    #[tokio::test]
    async fn fix_links_uses_persisted_titles() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let fetcher = StubFetcher::new().with_page(BASE_URL, &[OVERVIEW, GUIDE]);
        migrate(&config, &navigation(), &fetcher, true, &SilentProgress)
            .await
            .unwrap();

        std::fs::write(
            config.target_dir.join("index.mdx"),
            "Later edit: see [Guide](#usage).\n",
        )
        .unwrap();
        let report =
            fix_links_from_index(&config.index_path, &config.target_dir, "mdx", REPO_PREFIX)
                .unwrap();
        assert_eq!(report.files_changed, 1);
        assert_eq!(
            std::fs::read_to_string(config.target_dir.join("index.mdx")).unwrap(),
            "Later edit: see [Guide](/guide#usage).\n"
        );
    }
}
