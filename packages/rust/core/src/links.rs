//! Link resolution.
//!
//! Each page's content goes through three passes, in order:
//!
//! 1. links in the "Relevant source files" block → repository URLs
//! 2. citations on `Sources:` lines → repository URLs with line fragments
//! 3. every other link → canonical paths via the [`LinkIndex`]
//!
//! Passes 1 and 2 do not write their output into the text directly. They
//! leave a placeholder token and queue the rendered link in a
//! [`Substitutions`] plan, which is applied once pass 3 is done, so pass 3
//! never sees a link an earlier pass produced.

use tracing::{debug, info, instrument};
use url::Url;

use wikiport_markdown::{
    MarkdownLink, find_source_file_block, is_citation, parse_citation, render_link, replace_links,
};
use wikiport_shared::{
    LinkContext, MigrateConfig, PageState, ResolvedLink, ResolvedLinks, Result, SiteMap,
};

use crate::index::LinkIndex;

/// Prefix of lines holding inline citations (compared case-insensitively).
const CITATION_LINE_PREFIX: &str = "sources:";

// ---------------------------------------------------------------------------
// Substitutions
// ---------------------------------------------------------------------------

/// Pending placeholder substitutions for one text.
///
/// Tokens are guaranteed not to occur in the text the plan was created for.
#[derive(Debug, Clone)]
pub struct Substitutions {
    marker: String,
    pending: Vec<(String, String)>,
}

impl Substitutions {
    pub fn for_text(text: &str) -> Self {
        let mut marker = String::from("%%XREF");
        let mut salt = 0u32;
        while text.contains(&marker) {
            salt += 1;
            marker = format!("%%XREF{salt}");
        }
        Self {
            marker,
            pending: Vec::new(),
        }
    }

    /// Queue `replacement` and return the token standing in for it.
    pub fn push(&mut self, replacement: String) -> String {
        let token = format!("{}_{}%%", self.marker, self.pending.len());
        self.pending.push((token.clone(), replacement));
        token
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Replace every queued token in `text` with its replacement.
    pub fn apply(&self, text: &str) -> String {
        self.pending
            .iter()
            .fold(text.to_string(), |acc, (token, replacement)| {
                acc.replace(token, replacement)
            })
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Everything the passes need besides the page text.
#[derive(Debug, Clone, Copy)]
pub struct LinkRules<'a> {
    pub index: &'a LinkIndex,
    /// Repository blob URL prefix.
    pub repo_prefix: &'a str,
    /// Source site base URL; same-host absolute links are reduced to paths.
    pub source_url: &'a Url,
}

impl<'a> LinkRules<'a> {
    pub fn new(index: &'a LinkIndex, config: &'a MigrateConfig) -> Self {
        Self {
            index,
            repo_prefix: &config.repo_blob_prefix,
            source_url: &config.source_url,
        }
    }
}

/// Join a repository path onto the blob URL prefix.
///
/// Leading slashes on `path` are ignored. An empty prefix leaves the path
/// relative.
pub fn repository_url(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return path.to_string();
    }
    let base = if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };
    Url::parse(&base)
        .and_then(|b| b.join(path))
        .map(String::from)
        .unwrap_or_else(|_| format!("{base}{path}"))
}

// ---------------------------------------------------------------------------
// Per-page resolution
// ---------------------------------------------------------------------------

/// Result of resolving one page's links.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    pub markdown: String,
    pub links: ResolvedLinks,
    /// Site-relative body links with no index match.
    pub unresolved: usize,
}

/// Run the three passes over one page's content.
pub fn resolve_page_links(markdown: &str, rules: &LinkRules<'_>) -> PageLinks {
    let mut subs = Substitutions::for_text(markdown);
    let mut links = ResolvedLinks::new();

    let text = rewrite_source_file_block(markdown, rules, &mut subs, &mut links);
    let text = rewrite_citations(&text, rules, &mut subs, &mut links);
    let (text, unresolved) = rewrite_body_links(&text, rules, &mut links);

    PageLinks {
        markdown: subs.apply(&text),
        links,
        unresolved,
    }
}

/// Pass 1: the collapsible source-file list.
fn rewrite_source_file_block(
    md: &str,
    rules: &LinkRules<'_>,
    subs: &mut Substitutions,
    links: &mut ResolvedLinks,
) -> String {
    let Some(block) = find_source_file_block(md) else {
        return md.to_string();
    };

    let mut out = String::with_capacity(md.len());
    let mut cursor = block.range.start;
    out.push_str(&md[..cursor]);

    for link in &block.links {
        let href = repository_url(rules.repo_prefix, link.href);
        links.insert(ResolvedLink {
            text: link.text.to_string(),
            href: href.clone(),
            original_reference: link.href.to_string(),
            context: LinkContext::SourceFileList,
        });

        out.push_str(&md[cursor..link.range.start]);
        out.push_str(&subs.push(format!("- {}", render_link(link.text, &href))));
        cursor = link.range.end;
    }

    out.push_str(&md[cursor..]);
    out
}

/// Pass 2: citations on `Sources:` lines.
fn rewrite_citations(
    md: &str,
    rules: &LinkRules<'_>,
    subs: &mut Substitutions,
    links: &mut ResolvedLinks,
) -> String {
    md.split_inclusive('\n')
        .map(|line| {
            if !is_citation_line(line) {
                return line.to_string();
            }
            replace_links(line, |link| {
                let text = link.text.trim();
                if !is_citation(text) {
                    return None;
                }
                let (path, fragment) = parse_citation(text);
                let href = format!("{}{fragment}", repository_url(rules.repo_prefix, &path));
                links.insert(ResolvedLink {
                    text: text.to_string(),
                    href: href.clone(),
                    original_reference: link.href.trim().to_string(),
                    context: LinkContext::InlineCitation,
                });
                Some(subs.push(render_link(link.text, &href)))
            })
        })
        .collect()
}

pub(crate) fn is_citation_line(line: &str) -> bool {
    line.trim_start()
        .get(..CITATION_LINE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(CITATION_LINE_PREFIX))
}

/// Pass 3: everything else, through the index.
fn rewrite_body_links(
    md: &str,
    rules: &LinkRules<'_>,
    links: &mut ResolvedLinks,
) -> (String, usize) {
    let mut unresolved = 0usize;
    let text = replace_links(md, |link| {
        match resolve_body_link(link, rules) {
            BodyTarget::Resolved(href) => {
                links.insert(ResolvedLink {
                    text: link.text.to_string(),
                    href: href.clone(),
                    original_reference: link.href.to_string(),
                    context: LinkContext::BodyLink,
                });
                Some(render_link(link.text, &href))
            }
            BodyTarget::Missed => {
                debug!(href = link.href, text = link.text, "no index match for link");
                unresolved += 1;
                None
            }
            BodyTarget::Ignored => None,
        }
    });
    (text, unresolved)
}

enum BodyTarget {
    Resolved(String),
    /// A site-relative link the index does not know.
    Missed,
    /// External, empty, or an anchor naming no known page.
    Ignored,
}

fn resolve_body_link(link: &MarkdownLink<'_>, rules: &LinkRules<'_>) -> BodyTarget {
    let href = link.href.trim();
    if href.is_empty() || href == "#" {
        return BodyTarget::Ignored;
    }

    if let Some(path) = rules.index.resolve_reference(href) {
        return BodyTarget::Resolved(path.to_string());
    }

    if href.starts_with('#') {
        return match rules.index.resolve_title(link.text) {
            Some(path) => BodyTarget::Resolved(format!("{path}{href}")),
            None => BodyTarget::Ignored,
        };
    }

    let Some((path, fragment)) = site_reference(href, rules.source_url) else {
        return BodyTarget::Ignored;
    };
    match rules.index.resolve_reference(&path) {
        Some(target) => BodyTarget::Resolved(format!("{target}{fragment}")),
        None => BodyTarget::Missed,
    }
}

/// Split a link into a source-site path and its `#fragment` (possibly empty).
///
/// Returns `None` for links that do not point at the source site.
fn site_reference(href: &str, source_url: &Url) -> Option<(String, String)> {
    if href.starts_with('/') && !href.starts_with("//") {
        let (path, fragment) = match href.find('#') {
            Some(i) => href.split_at(i),
            None => (href, ""),
        };
        let path = path.split('?').next().unwrap_or(path);
        return Some((path.to_string(), fragment.to_string()));
    }

    let url = Url::parse(href).ok()?;
    if url.host_str() != source_url.host_str() {
        return None;
    }
    let fragment = url.fragment().map(|f| format!("#{f}")).unwrap_or_default();
    Some((url.path().to_string(), fragment))
}

// ---------------------------------------------------------------------------
// Whole site
// ---------------------------------------------------------------------------

/// Outcome of link resolution over a whole site map.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub pages_with_links: usize,
    pub links: usize,
    pub unresolved: usize,
}

/// Resolve links on every page and move all pages to `LinksResolved`.
///
/// Pages without content get no links but still advance.
#[instrument(skip_all, fields(pages = site_map.len()))]
pub fn resolve_all(site_map: &mut SiteMap, rules: &LinkRules<'_>) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for record in site_map.iter_mut() {
        if let Some(content) = &record.content {
            let page = resolve_page_links(&content.markdown, rules);
            debug!(
                reference = record.reference(),
                links = page.links.len(),
                unresolved = page.unresolved,
                "links resolved"
            );
            if !page.links.is_empty() {
                report.pages_with_links += 1;
            }
            report.links += page.links.len();
            report.unresolved += page.unresolved;
            record.rewritten_markdown = Some(page.markdown);
            record.links = page.links;
        }
        record.advance(PageState::LinksResolved)?;
    }

    info!(
        links = report.links,
        unresolved = report.unresolved,
        "link resolution complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{REPO_PREFIX, test_config};
    use wikiport_shared::{NavigationNode, PageRecord};

    fn index() -> LinkIndex {
        let records = [
            ("/acme/widget/1-overview", "Overview", "/"),
            ("/acme/widget/2-guide", "Guide", "/guide"),
            ("/acme/widget/3-foo", "Foo Page", "/foo"),
        ]
        .iter()
        .map(|(reference, title, path)| {
            PageRecord::new(
                NavigationNode {
                    original_reference: reference.to_string(),
                    title: title.to_string(),
                    depth: 0,
                    canonical_path: path.to_string(),
                },
                "",
            )
        })
        .collect();
        LinkIndex::build(&SiteMap::from_records(records).unwrap())
    }

    fn resolve(md: &str) -> PageLinks {
        let config = test_config();
        let index = index();
        let rules = LinkRules::new(&index, &config);
        resolve_page_links(md, &rules)
    }

    #[test]
    fn substitutions_avoid_existing_tokens() {
        let mut subs = Substitutions::for_text("literal %%XREF_0%% in text");
        let token = subs.push("x".into());
        assert_ne!(token, "%%XREF_0%%");
        assert_eq!(subs.apply(&format!("a {token} b")), "a x b");
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn repository_url_joins_prefix_and_path() {
        assert_eq!(
            repository_url("https://github.com/acme/widget/blob/main", "/src/lib.rs"),
            "https://github.com/acme/widget/blob/main/src/lib.rs"
        );
        assert_eq!(repository_url("", "/src/lib.rs"), "src/lib.rs");
    }

    #[test]
    fn source_file_block_links_point_at_repository() {
        let md = "# Guide\n\n<details>\n<summary>Relevant source files</summary>\n\n- [src/lib.rs](src/lib.rs)\n- [README.md](/README.md)\n</details>\n\nBody";
        let page = resolve(md);

        let hrefs: Vec<&str> = page
            .links
            .with_context(LinkContext::SourceFileList)
            .map(|l| l.href.as_str())
            .collect();
        assert_eq!(
            hrefs,
            vec![
                format!("{REPO_PREFIX}src/lib.rs"),
                format!("{REPO_PREFIX}README.md")
            ]
        );
        assert!(page.markdown.contains(&format!("- [src/lib.rs]({REPO_PREFIX}src/lib.rs)")));
        assert!(page.markdown.contains("<summary>Relevant source files</summary>"));
        // Nothing in the block was mistaken for a body link.
        assert_eq!(page.links.with_context(LinkContext::BodyLink).count(), 0);
    }

    #[test]
    fn citations_get_line_fragments() {
        let md = "Text.\n\nSources: [src/app.py:10-20](#), [src/util.py:5](), [the guide](/acme/widget/2-guide)\n";
        let page = resolve(md);

        assert!(page.markdown.contains(&format!("[src/app.py:10-20]({REPO_PREFIX}src/app.py#L10-L20)")));
        assert!(page.markdown.contains(&format!("[src/util.py:5]({REPO_PREFIX}src/util.py#L5)")));
        // Non-citation text on a Sources line is left for the body pass.
        assert!(page.markdown.contains("[the guide](/guide)"));
        assert_eq!(page.links.with_context(LinkContext::InlineCitation).count(), 2);
    }

    #[test]
    fn repeated_citation_is_recorded_once() {
        let md = "Sources: [a.py:1](#)\n\nsources: [a.py:1](#)\n";
        let page = resolve(md);
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.markdown.matches("a.py#L1").count(), 2);
    }

    #[test]
    fn anchor_link_resolves_through_title() {
        let page = resolve("See [Foo Page](#section-name).");
        assert_eq!(page.markdown, "See [Foo Page](/foo#section-name).");
        let link = page.links.iter().next().unwrap();
        assert_eq!(link.original_reference, "#section-name");
        assert_eq!(link.context, LinkContext::BodyLink);
    }

    #[test]
    fn anchor_naming_the_current_page_still_resolves() {
        // Content of /foo linking to one of its own sections.
        let page = resolve("Jump to [foo page](#section-name).");
        assert_eq!(page.markdown, "Jump to [foo page](/foo#section-name).");
        assert_eq!(page.links.with_context(LinkContext::BodyLink).count(), 1);
    }

    #[test]
    fn anchor_with_unknown_text_is_left_alone() {
        let md = "Jump to [details](#details).";
        let page = resolve(md);
        assert_eq!(page.markdown, md);
        assert!(page.links.is_empty());
        assert_eq!(page.unresolved, 0);
    }

    #[test]
    fn body_links_use_reference_index() {
        let md = "[guide](/acme/widget/2-guide) [abs](https://wiki.example.com/ACME/widget/3-foo#usage) [ext](https://example.org/x) [gone](/acme/widget/9-gone) ![img](/acme/widget/2-guide)";
        let page = resolve(md);
        assert_eq!(
            page.markdown,
            "[guide](/guide) [abs](/foo#usage) [ext](https://example.org/x) [gone](/acme/widget/9-gone) ![img](/acme/widget/2-guide)"
        );
        assert_eq!(page.unresolved, 1);
        assert_eq!(page.links.len(), 2);
    }

    #[test]
    fn resolve_all_advances_pages_without_content() {
        let config = test_config();
        let index = index();
        let rules = LinkRules::new(&index, &config);
        let mut record = PageRecord::new(
            NavigationNode {
                original_reference: "/acme/widget/2-guide".into(),
                title: "Guide".into(),
                depth: 0,
                canonical_path: "/guide".into(),
            },
            "",
        );
        record.advance(PageState::ContentResolved).unwrap();
        let mut map = SiteMap::from_records(vec![record]).unwrap();

        let report = resolve_all(&mut map, &rules).unwrap();
        assert_eq!(report.links, 0);
        let record = map.get("/acme/widget/2-guide").unwrap();
        assert_eq!(record.state, PageState::LinksResolved);
        assert!(record.rewritten_markdown.is_none());
    }
}
