//! Backoff hint extraction for rate-limited provider calls

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

fn retry_hint() -> &'static Regex {
    static HINT: OnceLock<Regex> = OnceLock::new();
    HINT.get_or_init(|| {
        Regex::new(r"(?i)retry in ([0-9]+(?:\.[0-9]+)?)\s*s").expect("valid regex")
    })
}

/// How long to wait before the single retry
///
/// Providers put hints like "Please retry in 21.7s" in their quota errors.
/// The hinted seconds are truncated and padded by one, then capped at `max`.
/// Without a hint the full `max` is used.
pub fn retry_delay(message: &str, max: Duration) -> Duration {
    let hinted = retry_hint()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0);

    match hinted {
        Some(secs) => {
            let padded = Duration::from_secs(secs.trunc() as u64 + 1);
            padded.min(max)
        }
        None => max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Duration = Duration::from_secs(60);

    #[test]
    fn test_fractional_hint_is_truncated_and_padded() {
        assert_eq!(retry_delay("Please retry in 21.7s.", MAX), Duration::from_secs(22));
    }

    #[test]
    fn test_integer_hint() {
        assert_eq!(retry_delay("retry in 5s", MAX), Duration::from_secs(6));
        assert_eq!(retry_delay("retry in 5 s", MAX), Duration::from_secs(6));
    }

    #[test]
    fn test_hint_is_case_insensitive() {
        assert_eq!(retry_delay("RETRY IN 3S", MAX), Duration::from_secs(4));
    }

    #[test]
    fn test_hint_capped_at_max() {
        assert_eq!(retry_delay("retry in 300s", MAX), MAX);
        assert_eq!(retry_delay("retry in 59.9s", MAX), MAX);
    }

    #[test]
    fn test_missing_hint_uses_max() {
        assert_eq!(retry_delay("429 RESOURCE_EXHAUSTED", MAX), MAX);
        assert_eq!(retry_delay("", MAX), MAX);
    }

    #[test]
    fn test_hint_inside_json_body() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded. Please retry in 12.03s.","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(retry_delay(body, MAX), Duration::from_secs(13));
    }

    #[test]
    fn test_custom_max() {
        let max = Duration::from_secs(2);
        assert_eq!(retry_delay("retry in 10s", max), max);
        assert_eq!(retry_delay("no hint", max), max);
        assert_eq!(retry_delay("retry in 0.2s", max), Duration::from_secs(1));
    }
}
