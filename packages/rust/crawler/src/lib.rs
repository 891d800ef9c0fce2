//! Fetching the source site.
//!
//! This crate provides:
//! - [`NavigationReader`] / [`HtmlNavigationReader`]: the ordered navigation entries
//! - [`PageFetcher`] / [`HttpFetcher`]: raw script payloads of a single page

pub mod fetcher;
pub mod navigation;

pub use fetcher::{HttpFetcher, PageFetcher, RawArtifacts, extract_scripts};
pub use navigation::{HtmlNavigationReader, NavSelectors, NavigationReader, parse_navigation};
