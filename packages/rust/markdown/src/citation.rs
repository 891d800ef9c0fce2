//! `path[:start[-end]]` citation parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Leading `path`, optional `:start`, optional `-end`.
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w./-]+)(?::(\d+)(?:-(\d+))?)?").expect("valid regex")
});

/// The whole token is a citation (nothing trailing).
static CITATION_FULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w./-]+(?::\d+(?:-\d+)?)?$").expect("valid regex")
});

/// Split a citation token into `(path, fragment)`.
///
/// The fragment is `#L<start>-L<end>`, `#L<start>`, or empty. A token that
/// does not start with a path comes back unchanged with an empty fragment.
///
/// ```
/// use wikiport_markdown::parse_citation;
/// assert_eq!(parse_citation("a/b.py:10-20"), ("a/b.py".into(), "#L10-L20".into()));
/// ```
pub fn parse_citation(token: &str) -> (String, String) {
    let Some(caps) = CITATION_RE.captures(token) else {
        return (token.to_string(), String::new());
    };

    let path = caps[1].to_string();
    let fragment = match (caps.get(2), caps.get(3)) {
        (Some(start), Some(end)) => format!("#L{}-L{}", start.as_str(), end.as_str()),
        (Some(start), None) => format!("#L{}", start.as_str()),
        _ => String::new(),
    };
    (path, fragment)
}

/// Whether `text` is entirely a citation token.
pub fn is_citation(text: &str) -> bool {
    CITATION_FULL_RE.is_match(text)
}
