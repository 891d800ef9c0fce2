//! Reading the source site's navigation list.
//!
//! The navigation is a single flat `<ul>` whose `<li>` children carry their
//! nesting level as an inline `padding-left` style.

use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use wikiport_shared::{MigrateConfig, NavItem, Result, WikiportError};

use crate::fetcher::HttpFetcher;

static PADDING_LEFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"padding-left:\s*(\d+)px").expect("valid regex"));

/// Source of the ordered navigation entries.
///
/// Any error returned here is fatal for the run.
pub trait NavigationReader {
    fn read(&self) -> impl Future<Output = Result<Vec<NavItem>>> + Send;
}

/// CSS selectors locating the navigation list inside a page.
#[derive(Debug, Clone)]
pub struct NavSelectors {
    pub container: String,
    pub list: String,
}

impl NavSelectors {
    pub fn from_config(config: &MigrateConfig) -> Self {
        Self {
            container: config.nav_container_selector.clone(),
            list: config.nav_list_selector.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// HtmlNavigationReader
// ---------------------------------------------------------------------------

/// Reads navigation from the rendered HTML of the site's base URL.
#[derive(Debug, Clone)]
pub struct HtmlNavigationReader {
    fetcher: HttpFetcher,
    selectors: NavSelectors,
}

impl HtmlNavigationReader {
    pub fn new(fetcher: HttpFetcher, selectors: NavSelectors) -> Self {
        Self { fetcher, selectors }
    }
}

impl NavigationReader for HtmlNavigationReader {
    #[instrument(skip_all, fields(url = %self.fetcher.base_url()))]
    async fn read(&self) -> Result<Vec<NavItem>> {
        let base = self.fetcher.base_url().clone();
        let html = self.fetcher.fetch_html(&base).await.map_err(|e| {
            WikiportError::Navigation(format!("navigation source unreachable: {e}"))
        })?;

        let items = parse_navigation(&html, &base, &self.selectors)?;
        info!(entries = items.len(), "read navigation");
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse navigation entries out of a page.
///
/// Every direct `li` child of the list yields one [`NavItem`], in document
/// order. Entries without a link come back with empty title and reference so
/// the caller can decide to skip them.
pub fn parse_navigation(html: &str, base: &Url, selectors: &NavSelectors) -> Result<Vec<NavItem>> {
    let container_sel = parse_selector(&selectors.container)?;
    let list_sel = parse_selector(&selectors.list)?;
    let anchor_sel = parse_selector("a")?;

    let doc = Html::parse_document(html);

    let container = doc.select(&container_sel).next().ok_or_else(|| {
        WikiportError::Navigation(format!(
            "navigation container '{}' not found",
            selectors.container
        ))
    })?;
    let list = container.select(&list_sel).next().ok_or_else(|| {
        WikiportError::Navigation(format!(
            "navigation list '{}' not found inside container",
            selectors.list
        ))
    })?;

    let mut items = Vec::new();
    for li in list.children().filter_map(ElementRef::wrap) {
        if li.value().name() != "li" {
            continue;
        }

        let (title, reference) = match li.select(&anchor_sel).next() {
            Some(a) => {
                let title = a.text().collect::<Vec<_>>().join(" ");
                let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
                let href = a.value().attr("href").unwrap_or_default();
                (title, href_to_reference(href, base))
            }
            None => {
                warn!("navigation entry without a link");
                (String::new(), String::new())
            }
        };

        let indent_px = li
            .value()
            .attr("style")
            .and_then(|style| PADDING_LEFT_RE.captures(style))
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);

        debug!(%title, %reference, indent_px, "navigation entry");
        items.push(NavItem::new(title, reference, indent_px));
    }

    Ok(items)
}

/// Reduce an `href` to a site reference: the path for same-host links,
/// the full URL otherwise.
fn href_to_reference(href: &str, base: &Url) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    match base.join(href) {
        Ok(url) if url.host_str() == base.host_str() => url.path().to_string(),
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| WikiportError::config(format!("invalid CSS selector '{selector}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NAV_HTML: &str = r#"<html><body>
<div class="border-r-border md:sticky top-0">
  <ul class="flex-1">
    <li style="padding-left: 0px"><a href="/acme/widget/1-overview">Overview</a></li>
    <li style="padding-left: 0px"><a href="/acme/widget/2-guide">Guide</a></li>
    <li style="padding-left:12px"><a href="/acme/widget/2.1-setup"> Setup
        and Install </a></li>
    <li style="padding-left: 12px"><a href="https://wiki.example.com/acme/widget/2.2-usage">Usage</a></li>
    <li><span>Divider</span></li>
  </ul>
</div>
<ul class="flex-1"><li><a href="/elsewhere">Not navigation</a></li></ul>
</body></html>"#;

    fn selectors() -> NavSelectors {
        NavSelectors {
            container: "div.border-r-border[class*='md:sticky']".into(),
            list: "ul.flex-1".into(),
        }
    }

    fn base() -> Url {
        Url::parse("https://wiki.example.com/acme/widget").unwrap()
    }

    #[test]
    fn parses_entries_in_document_order() {
        let items = parse_navigation(NAV_HTML, &base(), &selectors()).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], NavItem::new("Overview", "/acme/widget/1-overview", 0));
        assert_eq!(items[2], NavItem::new("Setup and Install", "/acme/widget/2.1-setup", 12));
        // Absolute same-host links reduce to their path.
        assert_eq!(items[3].reference, "/acme/widget/2.2-usage");
        assert_eq!(items[3].indent_px, 12);
        // Entries without a link are kept with empty fields.
        assert_eq!(items[4], NavItem::new("", "", 0));
    }

    #[test]
    fn missing_container_is_navigation_error() {
        let err = parse_navigation("<html><ul class=\"flex-1\"></ul></html>", &base(), &selectors())
            .unwrap_err();
        assert!(matches!(err, WikiportError::Navigation(_)));
        assert!(err.is_abort());
    }

    #[test]
    fn missing_list_is_navigation_error() {
        let html = r#"<div class="border-r-border md:sticky"><ol></ol></div>"#;
        let err = parse_navigation(html, &base(), &selectors()).unwrap_err();
        assert!(err.to_string().contains("ul.flex-1"));
    }

    #[test]
    fn foreign_host_links_keep_full_url() {
        assert_eq!(
            href_to_reference("https://other.example.org/x", &base()),
            "https://other.example.org/x"
        );
        assert_eq!(href_to_reference("  ", &base()), "");
    }

    #[tokio::test]
    async fn reader_fetches_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NAV_HTML))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/acme/widget", server.uri())).unwrap();
        let fetcher = HttpFetcher::new(base, Duration::from_secs(5), Duration::ZERO).unwrap();
        let items = HtmlNavigationReader::new(fetcher, selectors())
            .read()
            .await
            .unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[1].title, "Guide");
    }

    #[tokio::test]
    async fn unreachable_source_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let fetcher = HttpFetcher::new(base, Duration::from_secs(5), Duration::ZERO).unwrap();
        let err = HtmlNavigationReader::new(fetcher, selectors())
            .read()
            .await
            .unwrap_err();
        assert!(matches!(err, WikiportError::Navigation(_)));
    }
}
