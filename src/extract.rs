// src/extract.rs
//! Structured-payload extraction from free-form model output.
//!
//! LLM replies often wrap a JSON document in a Markdown fence
//! (```` ```json ... ``` ````) surrounded by prose. `extract_json` recovers
//! that document, falling back to parsing the whole text when no fence is
//! present. It never fails loudly: anything that is not valid JSON yields
//! [`Extraction::NotFound`].

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use serde_json::Value;

static FENCED_JSON_RE: OnceLock<Regex> = OnceLock::new();

fn fenced_json_re() -> &'static Regex {
    // (?s) lets `.` span newlines; `.*?` keeps the first closing fence.
    FENCED_JSON_RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

/// Outcome of an extraction attempt.
///
/// `NotFound` is distinct from `Parsed(Value::Null)`: the latter means the
/// text really did encode a JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(Value),
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Parsed(_))
    }

    pub fn into_option(self) -> Option<Value> {
        match self {
            Extraction::Parsed(v) => Some(v),
            Extraction::NotFound => None,
        }
    }
}

impl From<Extraction> for Option<Value> {
    fn from(e: Extraction) -> Self {
        e.into_option()
    }
}

/// Pick the text that should be parsed: the first ```` ```json ```` block if
/// there is one, otherwise the whole input. Both are trimmed.
fn candidate(input: &str) -> &str {
    match fenced_json_re().captures(input).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => input.trim(),
    }
}

/// Extract a JSON value from `input`.
///
/// Text before or after a fenced block is ignored, and only the first
/// block is considered. Malformed fenced content does not fall back to
/// parsing the surrounding text.
pub fn extract_json(input: &str) -> Extraction {
    let text = candidate(input);
    if text.is_empty() {
        return Extraction::NotFound;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(v) => Extraction::Parsed(v),
        Err(e) => match e.classify() {
            Category::Syntax | Category::Eof => {
                tracing::debug!(line = e.line(), column = e.column(), "no JSON payload: {}", e);
                Extraction::NotFound
            }
            Category::Io | Category::Data => {
                tracing::warn!(
                    candidate_len = text.len(),
                    "unexpected failure while parsing JSON payload: {}",
                    e
                );
                Extraction::NotFound
            }
        },
    }
}

/// Like [`extract_json`], for input that may be absent.
pub fn extract_json_opt(input: Option<&str>) -> Extraction {
    input.map_or(Extraction::NotFound, extract_json)
}

/// Like [`extract_json`], for dynamically typed input. Only JSON strings are
/// eligible; every other value yields `NotFound`.
pub fn extract_json_from_value(input: &Value) -> Extraction {
    match input {
        Value::String(s) => extract_json(s),
        _ => Extraction::NotFound,
    }
}

/// Extract and deserialize into `T`. Returns `None` when no payload is found
/// or when it does not have the shape of `T`.
pub fn extract_json_as<T: DeserializeOwned>(input: &str) -> Option<T> {
    let value = extract_json(input).into_option()?;
    match serde_json::from_value(value) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::debug!(
                target_type = std::any::type_name::<T>(),
                "extracted JSON has unexpected shape: {}",
                e
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
