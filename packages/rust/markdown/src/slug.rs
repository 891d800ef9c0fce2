//! Title → URL-safe slug.

use std::sync::LazyLock;

use regex::Regex;

/// Lowercase, hyphenate whitespace, drop anything that is not a word
/// character or hyphen, collapse hyphen runs and trim hyphens at both ends.
///
/// Idempotent: `slugify(&slugify(x)) == slugify(x)`.
pub fn slugify(title: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static STRIP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    static DASHES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

    let slug = title.to_lowercase();
    let slug = WS_RE.replace_all(&slug, "-");
    let slug = STRIP_RE.replace_all(&slug, "");
    let slug = DASHES_RE.replace_all(&slug, "-");
    slug.trim_matches('-').to_string()
}
