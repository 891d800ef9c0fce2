//! Link resolution index.
//!
//! Maps lowercased references and lowercased titles to canonical paths. It is
//! built from a site map whose paths are all final and is read-only afterwards.

use std::collections::HashMap;

use tracing::{debug, instrument};

use wikiport_shared::SiteMap;

#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    by_reference: HashMap<String, String>,
    by_title: HashMap<String, String>,
}

impl LinkIndex {
    /// Index every record. On key collisions the later record wins.
    #[instrument(skip_all, fields(pages = site_map.len()))]
    pub fn build(site_map: &SiteMap) -> Self {
        let mut index = Self::default();

        for record in site_map.iter() {
            let path = record.canonical_path().to_string();

            let reference_key = normalize(record.reference());
            if let Some(previous) = index.by_reference.insert(reference_key, path.clone()) {
                debug!(reference = record.reference(), %previous, "reference key collision");
            }

            let title_key = normalize(record.title());
            if let Some(previous) = index.by_title.insert(title_key, path) {
                debug!(title = record.title(), %previous, "title key collision");
            }
        }

        debug!(
            references = index.by_reference.len(),
            titles = index.by_title.len(),
            "link index built"
        );
        index
    }

    pub fn resolve_reference(&self, reference: &str) -> Option<&str> {
        self.by_reference
            .get(&normalize(reference))
            .map(String::as_str)
    }

    pub fn resolve_title(&self, title: &str) -> Option<&str> {
        self.by_title.get(&normalize(title)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
