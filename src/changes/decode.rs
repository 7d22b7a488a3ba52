//! Decoding of git-reported file paths.
//!
//! Git quotes "unusual" path bytes as three-digit octal escapes
//! (`\346\227\245`), and some tooling emits literal non-ASCII characters
//! with stray backslashes glued to them. Both forms are folded into a
//! plain forward-slash UTF-8 path here.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A backslash followed by exactly three octal digits.
static OCTAL_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[0-7]{3}").unwrap());

/// Errors raised while rebuilding the byte stream of an escaped path.
#[derive(Error, Debug, PartialEq, Eq)]
enum DecodeError {
    #[error("octal escape \\{0} does not fit in a single byte")]
    ByteOverflow(String),
}

/// Decode a raw changed-file path into a normalized forward-slash path.
///
/// Never fails: when the escaped form cannot be rebuilt, every backslash
/// is replaced with `/` and the fallback is logged. The output contains no
/// backslashes, so decoding is idempotent.
pub fn decode(raw: &str) -> String {
    if !OCTAL_ESCAPE_RE.is_match(raw) {
        return strip_artifact_backslashes(raw);
    }

    match decode_octal(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            let fallback = raw.replace('\\', "/");
            tracing::info!(
                original = raw,
                fallback = %fallback,
                "failed to decode path ({e}), using fallback"
            );
            fallback
        }
    }
}

/// Replace each octal escape with its byte and decode the stream as UTF-8.
///
/// Undecodable byte runs become U+FFFD rather than aborting.
fn decode_octal(raw: &str) -> Result<String, DecodeError> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut last = 0;

    for m in OCTAL_ESCAPE_RE.find_iter(raw) {
        bytes.extend_from_slice(raw[last..m.start()].as_bytes());
        let digits = &m.as_str()[1..];
        let value = digits
            .bytes()
            .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
        let byte = u8::try_from(value).map_err(|_| DecodeError::ByteOverflow(digits.to_string()))?;
        bytes.push(byte);
        last = m.end();
    }
    bytes.extend_from_slice(raw[last..].as_bytes());

    Ok(String::from_utf8_lossy(&bytes).replace('\\', "/"))
}

/// Drop backslashes touching a non-ASCII character, turn the rest into `/`.
///
/// Adjacency is judged against the raw input, so in `é\\x` only the first
/// backslash is dropped.
fn strip_artifact_backslashes(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());

    for (i, &c) in chars.iter().enumerate() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let prev_non_ascii = i > 0 && !chars[i - 1].is_ascii();
        let next_non_ascii = chars.get(i + 1).is_some_and(|n| !n.is_ascii());
        if !(prev_non_ascii || next_non_ascii) {
            out.push('/');
        }
    }

    out
}

/// Split the comma-separated changed-file string into trimmed, non-empty tokens.
pub fn split_raw(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}
