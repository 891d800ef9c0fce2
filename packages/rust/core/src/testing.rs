//! Shared fixtures for unit tests.

use std::collections::HashMap;

use wikiport_crawler::{NavigationReader, PageFetcher, RawArtifacts};
use wikiport_shared::{AppConfig, MigrateConfig, NavItem, Result, WikiportError};

pub const BASE_URL: &str = "https://wiki.example.com/acme/widget";
pub const REPO_PREFIX: &str = "https://github.com/acme/widget/blob/main/";

pub fn test_config() -> MigrateConfig {
    let mut app = AppConfig::default();
    app.source.base_url = BASE_URL.into();
    app.source.root_reference = Some("/acme/widget/1-overview".into());
    app.repository.blob_url_prefix = REPO_PREFIX.into();
    app.fetch.min_content_len = 10;
    MigrateConfig::try_from(&app).expect("valid test config")
}

/// A script element carrying `markdown` as an embedded payload.
pub fn payload_script(markdown: &str) -> String {
    format!(
        "self.__next_f.push([1,{}])",
        serde_json::to_string(markdown).expect("json string")
    )
}

/// Serves canned scripts per URL and records what was fetched.
#[derive(Debug, Default)]
pub struct StubFetcher {
    pages: HashMap<String, Vec<String>>,
    fetched: std::sync::Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `markdown` chunks at `url`.
    pub fn with_page(mut self, url: &str, chunks: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            chunks.iter().map(|c| payload_script(c)).collect(),
        );
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().expect("lock").clone()
    }
}

impl PageFetcher for StubFetcher {
    async fn fetch(&self, reference: &str) -> Result<RawArtifacts> {
        self.fetched.lock().expect("lock").push(reference.to_string());
        match self.pages.get(reference) {
            Some(scripts) => Ok(RawArtifacts {
                url: reference.to_string(),
                scripts: scripts.clone(),
            }),
            None => Err(WikiportError::Network(format!("{reference}: HTTP 404"))),
        }
    }
}

/// Returns a fixed navigation list, or a navigation error when `None`.
#[derive(Debug, Default)]
pub struct StubNavigation(pub Option<Vec<NavItem>>);

impl NavigationReader for StubNavigation {
    async fn read(&self) -> Result<Vec<NavItem>> {
        self.0
            .clone()
            .ok_or_else(|| WikiportError::Navigation("navigation container absent".into()))
    }
}
