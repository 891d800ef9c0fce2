//! Final cleanup passes applied to a page body before it is written.
//!
//! Each pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on a rewritten page body.
pub fn run_pipeline(md: &str, title: &str) -> String {
    let mut result = md.to_string();

    result = strip_redundant_h1(&result, title);
    result = clean_blank_lines(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

/// Build a YAML frontmatter block carrying the page title.
pub fn build_frontmatter(title: &str) -> String {
    format!("---\ntitle: \"{}\"\n---\n", escape_yaml_string(title))
}

// ---------------------------------------------------------------------------
// Pass 1: Drop the H1 that repeats the title
// ---------------------------------------------------------------------------

/// Remove the first H1 when it equals `title` (case-insensitive, trimmed).
///
/// Only the first H1 is considered; later ones are left alone.
pub fn strip_redundant_h1(md: &str, title: &str) -> String {
    static H1_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*#\s+(.+?)\s*$").expect("valid regex"));

    let wanted = title.trim().to_lowercase();
    let mut removed = false;
    let mut lines: Vec<&str> = Vec::new();

    for line in md.lines() {
        if !removed {
            if let Some(caps) = H1_LINE_RE.captures(line) {
                removed = true;
                if caps[1].trim().to_lowercase() == wanted {
                    continue;
                }
            }
        }
        lines.push(line);
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on lines and leading blank lines of the body.
///
/// Lines inside fenced code are kept verbatim. A hard line break (two or more
/// trailing spaces followed by a non-blank line) is kept as two spaces.
fn normalize_whitespace(md: &str) -> String {
    let lines: Vec<&str> = md.lines().collect();
    let mut in_code_block = false;
    let mut result: Vec<String> = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            result.push(line.trim_end().to_string());
            continue;
        }
        if in_code_block {
            result.push(line.to_string());
            continue;
        }

        let trimmed = line.trim_end();
        let hard_break = !trimmed.is_empty()
            && line.ends_with("  ")
            && lines.get(i + 1).is_some_and(|next| !next.trim().is_empty());
        if hard_break {
            result.push(format!("{trimmed}  "));
        } else {
            result.push(trimmed.to_string());
        }
    }

    result
        .into_iter()
        .skip_while(|line| line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
