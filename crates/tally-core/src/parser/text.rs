//! Rule-based extraction for short chat messages
//!
//! Handles messages like:
//! - "add 15rs as coffee"
//! - "15 coffee"
//! - "₹15 coffee"
//! - "15 INR coffee"
//! - "spent 50 on food"
//!
//! No I/O and no sign handling: amounts come out as positive magnitudes.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ExtractionResult, DEFAULT_CURRENCY, UNCATEGORIZED};

/// Leading verbs, checked in this order. At most one is removed.
const VERB_PREFIXES: &[&str] = &["add", "spent", "spend", "paid", "expense", "exp"];

/// Words that may sit between the amount and the category
const CONNECTORS: &[&str] = &["as", "for", "on", "at", "to", "from"];

/// Amount patterns in priority order; the first one that yields a number wins.
/// Capture group 1 is the number, the whole match is cut out of the text.
const AMOUNT_PATTERNS: &[(&str, &str)] = &[
    ("number_then_marker", r"([0-9]+\.?[0-9]*)\s*(?:rs|rupees?|inr|₹)"),
    ("rupee_symbol_prefix", r"₹\s*([0-9]+\.?[0-9]*)"),
    ("number_then_word", r"([0-9]+\.?[0-9]*)\s*(?:rs|rupees?|inr)"),
    ("bare_number", r"([0-9]+\.?[0-9]*)"),
];

fn amount_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        AMOUNT_PATTERNS
            .iter()
            .map(|(name, pattern)| (*name, Regex::new(pattern).expect("valid regex")))
            .collect()
    })
}

fn leading_number() -> &'static Regex {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    LEADING.get_or_init(|| Regex::new(r"^([0-9]+\.?[0-9]*)").expect("valid regex"))
}

/// Deterministic text parser
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a chat message into a transaction guess
    ///
    /// Returns `None` when the message has no amount.
    pub fn parse(&self, text: &str) -> Option<ExtractionResult> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        let text = strip_verb(&text);
        let (amount, residual) = find_amount(text)?;

        let residual = strip_connector(residual.trim());
        let (category, merchant) = split_category(residual);

        Some(ExtractionResult {
            merchant,
            amount: Some(amount),
            currency: DEFAULT_CURRENCY.to_string(),
            date: None,
            category: Some(category.unwrap_or_else(|| UNCATEGORIZED.to_string())),
            rate_limited: false,
        })
    }
}

/// Remove the first matching verb, if it stands as its own token
fn strip_verb(text: &str) -> &str {
    for verb in VERB_PREFIXES {
        if let Some(rest) = text.strip_prefix(verb) {
            if rest.chars().next().map_or(true, |c| !c.is_alphabetic()) {
                return rest.trim();
            }
        }
    }
    text
}

/// Run the amount patterns in order; returns the amount and the text with
/// the matched span cut out
fn find_amount(text: &str) -> Option<(f64, String)> {
    for (name, re) in amount_patterns() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(amount) = number.as_str().parse::<f64>() else {
            continue;
        };

        tracing::trace!(pattern = name, amount, "Amount pattern matched");
        let residual = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        return Some((amount, residual));
    }

    let m = leading_number().find(text)?;
    let amount = m.as_str().parse::<f64>().ok()?;
    Some((amount, text[m.end()..].to_string()))
}

/// Remove one leading connector word ("as coffee" -> "coffee")
fn strip_connector(text: &str) -> &str {
    for connector in CONNECTORS {
        if let Some(rest) = text
            .strip_prefix(connector)
            .and_then(|r| r.strip_prefix(' '))
        {
            return rest.trim();
        }
    }
    text
}

/// First token is the category, the remainder (if any) the merchant
fn split_category(text: &str) -> (Option<String>, Option<String>) {
    let is_sep = |c: char| c == ',' || c.is_whitespace();
    let text = text.trim_matches(is_sep);
    if text.is_empty() {
        return (None, None);
    }

    match text.find(is_sep) {
        Some(idx) => {
            let category = text[..idx].to_string();
            let rest = text[idx..].trim_matches(is_sep);
            let merchant = (!rest.is_empty()).then(|| rest.to_string());
            (Some(category), merchant)
        }
        None => (Some(text.to_string()), None),
    }
}
