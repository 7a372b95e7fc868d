//! Strict decoding of structured model output.
//!
//! Models frequently wrap JSON payloads in a Markdown code fence. This module
//! is the single place where that is tolerated: the fence is stripped, then a
//! strict `serde_json` parse runs. Parsing heuristics never leak past this
//! function.

use crate::error::DecodeError;
use serde::de::DeserializeOwned;

/// Decode model output as strict JSON, tolerating one surrounding code fence
/// (with or without a language tag).
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let payload = strip_code_fence(raw.trim());
    serde_json::from_str(payload).map_err(|e| DecodeError {
        message: e.to_string(),
    })
}

/// Strip a leading/trailing triple-backtick fence if both are present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the optional language tag on the opening fence line.
    match body.split_once('\n') {
        Some((first_line, remainder)) if !first_line.trim().starts_with(['{', '[']) => {
            remainder.trim()
        }
        _ => body.trim(),
    }
}
