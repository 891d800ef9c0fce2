//! Page fetching.
//!
//! A fetch is one bounded-wait HTTP request followed by a fixed settle delay.
//! There is no retry: a failed fetch is reported to the caller, which decides
//! whether the page is simply left without content.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use wikiport_shared::{MigrateConfig, Result, WikiportError};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("wikiport/", env!("CARGO_PKG_VERSION"));

/// Everything captured from one fetched page.
#[derive(Debug, Clone, Default)]
pub struct RawArtifacts {
    /// Absolute URL that was fetched.
    pub url: String,
    /// Text of every `<script>` element, in document order.
    pub scripts: Vec<String>,
}

/// Source of raw page artifacts.
///
/// `reference` is a source-site path (or absolute URL) resolved against the
/// site's base URL.
pub trait PageFetcher {
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<RawArtifacts>> + Send;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// [`PageFetcher`] backed by a plain HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    settle_delay: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: Url, render_timeout: Duration, settle_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(render_timeout)
            .build()
            .map_err(|e| WikiportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            settle_delay,
        })
    }

    pub fn from_config(config: &MigrateConfig) -> Result<Self> {
        Self::new(
            config.source_url.clone(),
            config.render_timeout,
            config.settle_delay,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a reference against the base URL.
    pub fn resolve(&self, reference: &str) -> Result<Url> {
        self.base_url
            .join(reference)
            .map_err(|e| WikiportError::parse(format!("invalid reference '{reference}': {e}")))
    }

    /// GET `url` and return the body, then wait out the settle delay.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        debug!("fetching");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| WikiportError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikiportError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WikiportError::Network(format!("{url}: body read failed: {e}")))?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        debug!(bytes = body.len(), "fetched");
        Ok(body)
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<RawArtifacts> {
        let url = self.resolve(reference)?;
        let html = self.fetch_html(&url).await?;
        Ok(RawArtifacts {
            url: url.to_string(),
            scripts: extract_scripts(&html),
        })
    }
}

/// Text content of every `<script>` element in `html`.
pub fn extract_scripts(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse("script") else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}
