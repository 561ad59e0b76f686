//! Text extraction helpers shared by every receipt adapter.
//!
//! Receipt payloads (HTML tables, PDF text dumps) are collapsed to
//! single-spaced text first; field extractors then anchor on label tokens
//! and capture the adjacent structured value.

use chrono::NaiveDateTime;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First capture group of `pattern` in `text`, trimmed, or `None`.
pub fn capture(text: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Every first-group match of `pattern` in `text`, in document order.
pub fn capture_all(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Parse a monetary token into a fixed-point decimal.
///
/// Thousands separators and currency suffixes are stripped; anything that
/// still does not parse resolves to `None` rather than an error.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Try each strftime template in order; first parse wins, no match is `None`.
pub fn parse_date_any(raw: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
}

/// Uppercase the first letter of each whitespace-delimited token.
///
/// Cosmetic only; validator comparisons stay case-insensitive.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use rust_decimal::Decimal;

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(
            normalize_whitespace("  Payer :\n\tAbebe   Kebede "),
            "Payer : Abebe Kebede"
        );
    }

    #[test]
    fn capture_takes_first_group() {
        static RX: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?i)Payer\s*:?\s*(.*?)\s+Account").unwrap());
        let text = "Payer : Abebe Kebede Account : 1****5017";
        assert_eq!(capture(text, &RX).as_deref(), Some("Abebe Kebede"));
    }

    #[test]
    fn amount_strips_thousands_separators() {
        assert_eq!(parse_amount("1,234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("100.00 Birr"), Some(Decimal::new(10000, 2)));
    }

    #[test]
    fn amount_tolerates_garbage() {
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn date_templates_tried_in_order() {
        let formats = ["%m/%d/%Y, %I:%M:%S %p", "%Y-%m-%d %H:%M:%S"];
        let parsed = parse_date_any("6/26/2023, 2:30:00 PM", &formats).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2023-06-26 14:30");
        let iso = parse_date_any("2023-06-26 14:30:00", &formats).unwrap();
        assert_eq!(iso.format("%H:%M").to_string(), "14:30");
        assert_eq!(parse_date_any("yesterday", &formats), None);
    }

    #[test]
    fn title_case_is_per_token() {
        assert_eq!(title_case("ABEBE KEBEDE demissie"), "Abebe Kebede Demissie");
        assert_eq!(title_case(""), "");
    }
}
