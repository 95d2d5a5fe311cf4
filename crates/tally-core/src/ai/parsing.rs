//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their JSON in Markdown fences or surround it with prose.
//! These helpers dig the object out and normalize it into an
//! [`ExtractionResult`].

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{ExtractionResult, DEFAULT_CURRENCY};

/// Remove a surrounding Markdown code fence, if present
///
/// Drops the opening fence line (with any language tag) and a closing fence
/// on the last line.
pub fn strip_code_fences(response: &str) -> &str {
    let text = response.trim();
    if !text.starts_with("```") {
        return text;
    }

    let body = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => "",
    };
    let body = body.trim_end();
    match body.rfind('\n') {
        Some(idx) if body[idx + 1..].trim() == "```" => &body[..idx],
        None if body.trim() == "```" => "",
        _ => body,
    }
}

fn truncate(s: &str) -> String {
    if s.len() > 200 {
        let mut end = 200;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    } else {
        s.to_string()
    }
}

/// Parse a model response into an extraction result
///
/// Tries the fence-stripped text as JSON first, then the span from the first
/// `{` to the last `}`.
pub fn parse_extraction(response: &str) -> Result<ExtractionResult> {
    let text = strip_code_fences(response);

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(first_err) => {
            let start = text.find('{');
            let end = text.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&text[s..=e]).map_err(|e| {
                    Error::InvalidData(format!(
                        "Invalid JSON from AI: {} | Raw: {}",
                        e,
                        truncate(text)
                    ))
                })?,
                _ => {
                    return Err(Error::InvalidData(format!(
                        "No JSON found in AI response ({}) | Raw: {}",
                        first_err,
                        truncate(text)
                    )))
                }
            }
        }
    };

    normalize(&value)
}

/// Coerce a JSON object into the result shape
///
/// Unknown keys are ignored, blank strings become null, currency falls back
/// to INR, and amounts may be numbers or numeric strings.
pub fn normalize(value: &Value) -> Result<ExtractionResult> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidData(format!("Expected a JSON object, got: {}", value)))?;

    let text_field = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let currency = text_field("currency")
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    Ok(ExtractionResult {
        merchant: text_field("merchant"),
        amount: obj.get("amount").and_then(parse_amount),
        currency,
        date: text_field("date"),
        category: text_field("category"),
        rate_limited: false,
    })
}

fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    amount.is_finite().then_some(amount)
}
