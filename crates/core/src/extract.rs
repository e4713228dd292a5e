//! Extraction of the first JSON object from free-form service output.
//!
//! The service is asked for bare JSON but routinely wraps it in prose or a
//! Markdown code fence. Strategies are tried in order, and each only accepts
//! a JSON *object*:
//!
//! 1. [`parse_direct`]: the trimmed text is itself an object.
//! 2. [`parse_fenced`]: the body of the first fenced code block.
//! 3. [`parse_outer_slice`]: first `{` through last `}`.
//! 4. [`parse_first_balanced`]: first brace-balanced object, left to right.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// A JSON object as returned by the extractor.
pub type JsonObject = Map<String, Value>;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid fenced-block regex")
});

/// Run every strategy in order and return the first object found.
pub fn extract_json_object(text: &str) -> Option<JsonObject> {
    parse_direct(text)
        .or_else(|| parse_fenced(text))
        .or_else(|| parse_outer_slice(text))
        .or_else(|| parse_first_balanced(text))
}

pub fn parse_direct(text: &str) -> Option<JsonObject> {
    as_object(text.trim())
}

pub fn parse_fenced(text: &str) -> Option<JsonObject> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| as_object(body.as_str().trim()))
}

pub fn parse_outer_slice(text: &str) -> Option<JsonObject> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    as_object(&text[start..=end])
}

/// Scan for a brace-balanced `{...}` span, honoring string literals, and
/// return the first one that parses.
pub fn parse_first_balanced(text: &str) -> Option<JsonObject> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Some(obj) = as_object(&text[start..=end]) {
                return Some(obj);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Index of the `}` closing the object that opens at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_object(candidate: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
