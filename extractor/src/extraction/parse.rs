//! Isolating a JSON object from free-form model output.
//!
//! The primary candidate is the span from the first `{` to the last `}`.
//! When that span is not valid JSON, later start braces and earlier end
//! braces are tried, outermost first. This is a heuristic: braces inside
//! prose can still defeat it, and the scan is capped at
//! [`MAX_CANDIDATES`] parses per output.

use serde_json::{Map, Value};
use thiserror::Error;

/// Upper bound on candidate spans parsed for a single output.
pub const MAX_CANDIDATES: usize = 256;

/// Why no JSON object could be taken from a model output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The output has no `{` followed by a `}`.
    #[error("no JSON object found in model output")]
    NoObject,

    /// Braces were found but no enclosed span parsed.
    #[error("model output is not valid JSON: {0}")]
    Invalid(String),
}

/// Returns the first candidate span that parses as a JSON object.
///
/// # Examples
///
/// ```
/// use webai_extractor::extraction::parse::isolate_json_object;
///
/// let object = isolate_json_object(r#"Sure! {"code": "A-1"} Hope this helps."#).unwrap();
/// assert_eq!(object["code"], "A-1");
/// ```
pub fn isolate_json_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let starts: Vec<usize> = raw.match_indices('{').map(|(i, _)| i).collect();
    let ends: Vec<usize> = raw.match_indices('}').map(|(i, _)| i).collect();

    match (starts.first(), ends.last()) {
        (Some(first), Some(last)) if first < last => {}
        _ => return Err(ParseError::NoObject),
    }

    let mut first_error: Option<String> = None;
    let mut tried = 0usize;

    'starts: for &start in &starts {
        for &end in ends.iter().rev() {
            if end <= start {
                break;
            }
            if tried == MAX_CANDIDATES {
                break 'starts;
            }
            tried += 1;

            match serde_json::from_str::<Map<String, Value>>(&raw[start..=end]) {
                Ok(object) => return Ok(object),
                Err(e) => {
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
    }

    Err(ParseError::Invalid(
        first_error.unwrap_or_else(|| "no candidate span".to_string()),
    ))
}

/// Strips a key delimiter from both ends of each key (`###code###` -> `code`).
///
/// Keys without the delimiter pass through. If a stripped key collides with
/// one already present, the first occurrence wins.
#[must_use]
pub fn normalize_keys(object: Map<String, Value>, delimiter: &str) -> Map<String, Value> {
    if delimiter.is_empty() {
        return object;
    }

    let mut normalized = Map::new();
    for (key, value) in object {
        let stripped = key
            .strip_prefix(delimiter)
            .and_then(|k| k.strip_suffix(delimiter))
            .map_or(key.as_str(), str::trim);
        normalized.entry(stripped.to_string()).or_insert(value);
    }
    normalized
}
