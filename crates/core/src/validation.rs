//! Turns one raw service response into a typed [`PartialResult`].
//!
//! Extraction is delegated to [`crate::extract`]; this module applies the
//! field schema of the requested [`AnalysisKind`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalysisError;
use crate::extract::{extract_json_object, JsonObject};
use crate::schema::{AnalysisKind, CONCERNS_FIELD, ERROR_FIELD, NEUTRAL_SCORE};
use crate::types::{Score, SCORE_MAX};

/// Validated metrics extracted from one image.
///
/// Every score lies in `0..=100` and every schema field is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    pub kind: AnalysisKind,
    pub scores: BTreeMap<String, Score>,
    pub categories: BTreeMap<String, String>,
    pub concerns: Vec<String>,
}

/// Parse and validate `raw` against the schema for `kind`.
///
/// Errors:
/// - [`AnalysisError::MalformedResponse`] when no JSON object can be found.
/// - [`AnalysisError::NotAnalyzable`] when the service declined the image.
/// - [`AnalysisError::Validation`] when a required field is missing or a
///   score is out of range.
pub fn validate_response(kind: AnalysisKind, raw: &str) -> Result<PartialResult, AnalysisError> {
    let obj = extract_json_object(raw).ok_or_else(|| {
        AnalysisError::MalformedResponse(format!(
            "no JSON object found in {} byte response",
            raw.len()
        ))
    })?;

    if let Some(reason) = not_analyzable_reason(&obj) {
        return Err(AnalysisError::NotAnalyzable(reason));
    }

    let schema = kind.schema();
    let mut scores = BTreeMap::new();

    for &field in schema.required_numeric {
        let value = match obj.get(field) {
            None | Some(Value::Null) => {
                return Err(AnalysisError::Validation(format!(
                    "required field '{field}' is missing"
                )))
            }
            Some(v) => parse_score(field, v)?,
        };
        scores.insert(field.to_string(), value);
    }

    for &field in schema.optional_numeric {
        let value = match obj.get(field) {
            None | Some(Value::Null) => NEUTRAL_SCORE,
            Some(v) => parse_score(field, v)?,
        };
        scores.insert(field.to_string(), value);
    }

    let mut categories = BTreeMap::new();
    for field in schema.categorical {
        let value = obj
            .get(field.name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AnalysisError::Validation(format!(
                    "required field '{}' is missing or not a string",
                    field.name
                ))
            })?;
        categories.insert(field.name.to_string(), value.to_string());
    }

    Ok(PartialResult {
        kind,
        scores,
        categories,
        concerns: parse_concerns(&obj),
    })
}

/// The service's explanation if it flagged the image as not analyzable.
fn not_analyzable_reason(obj: &JsonObject) -> Option<String> {
    match obj.get(ERROR_FIELD)? {
        Value::Bool(true) => Some(explanation(obj, "image could not be analyzed")),
        Value::String(s) if !is_no_error_marker(s) => Some(explanation(obj, s.trim())),
        _ => None,
    }
}

/// String values in `"error"` that mean "no error".
const NO_ERROR_MARKERS: &[&str] = &["", "none", "null", "false", "no", "0", "n/a"];

fn is_no_error_marker(value: &str) -> bool {
    let value = value.trim();
    NO_ERROR_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m))
}

fn explanation(obj: &JsonObject, default: &str) -> String {
    ["message", "reason"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Accept integers, floats (rounded) and numeric strings within `0..=100`.
fn parse_score(field: &str, value: &Value) -> Result<Score, AnalysisError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| {
        AnalysisError::Validation(format!("field '{field}' is not numeric: {value}"))
    })?;

    let rounded = number.round();
    if !(0.0..=SCORE_MAX as f64).contains(&rounded) {
        return Err(AnalysisError::Validation(format!(
            "field '{field}' must be between 0 and {SCORE_MAX}, got {number}"
        )));
    }
    Ok(rounded as Score)
}

fn parse_concerns(obj: &JsonObject) -> Vec<String> {
    obj.get(CONCERNS_FIELD)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
