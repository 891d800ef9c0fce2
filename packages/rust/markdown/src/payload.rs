//! Embedded content payloads.
//!
//! Client-rendered pages ship their content as string arguments of
//! `self.__next_f.push([<id>, "<payload>"])` script calls. The payload is a
//! JS string literal; decoding degrades through three tiers so a chunk is
//! never dropped just because its escaping is unusual.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Substring identifying a payload-carrying script.
pub const PAYLOAD_MARKER: &str = "self.__next_f.push";

static PUSH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)self\.__next_f\.push\(\s*\[\s*[^,\]]+\s*,\s*"(.*)"\s*\]\s*\)"#)
        .expect("valid regex")
});

/// Which decoding strategy produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTier {
    /// Strict JSON string decoding.
    Json,
    /// Literal backslash-escape decoding.
    Escapes,
    /// Both failed; the extracted text as-is.
    Raw,
}

/// A decoded payload string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub text: String,
    pub tier: DecodeTier,
}

/// Pull the string argument out of a payload script and decode it.
///
/// Returns `None` when the script does not contain a payload push call.
pub fn extract_payload(script: &str) -> Option<DecodedPayload> {
    let caps = PUSH_RE.captures(script)?;
    Some(decode_payload(caps.get(1)?.as_str()))
}

/// Decode the body of a JS string literal (without the surrounding quotes).
pub fn decode_payload(escaped: &str) -> DecodedPayload {
    if let Ok(text) = serde_json::from_str::<String>(&format!("\"{escaped}\"")) {
        return DecodedPayload {
            text,
            tier: DecodeTier::Json,
        };
    }

    if let Some(text) = decode_escapes(escaped) {
        debug!("payload is not valid JSON, used escape decoding");
        return DecodedPayload {
            text,
            tier: DecodeTier::Escapes,
        };
    }

    debug!("payload escapes are malformed, keeping raw text");
    DecodedPayload {
        text: escaped.to_string(),
        tier: DecodeTier::Raw,
    }
}

/// Decode backslash escapes the way a permissive string-literal parser would.
///
/// Unknown escapes keep their backslash. Returns `None` for a trailing lone
/// backslash, short or non-hex `\x`/`\u`/`\U` sequences, and invalid code points.
fn decode_escapes(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'a' => out.push('\u{07}'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '/' => out.push('/'),
            '\n' => {}
            'x' => out.push(char::from_u32(take_hex(&mut chars, 2)?)?),
            'U' => out.push(char::from_u32(take_hex(&mut chars, 8)?)?),
            'u' => {
                let unit = take_hex(&mut chars, 4)?;
                if (0xD800..0xDC00).contains(&unit) {
                    // High surrogate: must be followed by an escaped low surrogate.
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    let low = take_hex(&mut chars, 4)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    out.push(char::from_u32(code)?);
                } else {
                    out.push(char::from_u32(unit)?);
                }
            }
            d @ '0'..='7' => {
                let mut value = d.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(next) => {
                            value = value * 8 + next;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value)?);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Some(out)
}

fn take_hex(chars: &mut impl Iterator<Item = char>, len: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..len {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}
