//! Defensive JSON handling for model output.
//!
//! Models routinely wrap JSON in markdown fences or surround it with prose,
//! and return scalars where arrays were asked for. These helpers recover the
//! payload before decoding and coerce mistyped arrays to empty ones.

use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Extract the JSON payload from a model response.
///
/// Strips a ```` ```json ```` (or bare ```` ``` ````) fence when present, then
/// narrows to the span from the first `{` to the last `}`. Falls back to the
/// first `[` .. last `]` span for bare arrays, and to the trimmed text when
/// neither is found.
pub fn extract_json(text: &str) -> &str {
    let text = strip_fence(text.trim());

    if let Some(span) = span_between(text, '{', '}') {
        return span;
    }
    if let Some(span) = span_between(text, '[', ']') {
        return span;
    }
    text
}

/// Extract and decode a model response into `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    let json = extract_json(text);
    serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(200).collect();
        Error::Parse(format!("{e}: {preview}"))
    })
}

/// Deserialize a list leniently.
///
/// Anything that is not an array becomes an empty list, and elements that
/// fail to decode are dropped. Use with
/// `#[serde(default, deserialize_with = "lenient_vec")]`.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Deserialize a string leniently: numbers and booleans are stringified,
/// anything else becomes empty.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn strip_fence(text: &str) -> &str {
    // Handle ```json ... ``` blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks (without json specifier)
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
