//! Parsing of guarantee values as they come out of an extracted contract.
//!
//! Source text is human-authored and noisy ("125 % BR", "+30€", "Frais réels",
//! "non couvert"). Anything that cannot be classified degrades to
//! [`ValueKind::Unknown`] instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of numeric value found in a guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Percentage of the social-security base rate ("% BR").
    Percentage,
    /// Flat amount in euros.
    Euros,
    /// Not covered, empty, or no recognizable unit.
    Unknown,
}

/// Typed reading of a raw guarantee value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedValue {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub numeric_value: f64,
    /// Raw text exactly as extracted.
    pub original_text: String,
    pub unit: String,
    /// True when the trimmed text starts with `+` (an amount added on top of the base reimbursement).
    pub is_addition: bool,
    pub display_text: String,
}

/// ASCII digits only, so every match parses as `f64`.
const NUMBER: &str = r"([0-9]+(?:\.[0-9]+)?)";

static PERCENTAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i){NUMBER}\s*%"),
        format!(r"(?i){NUMBER}\s*% BR"),
        format!(r"(?i){NUMBER}\s*% BRSS"),
        format!(r"(?i)\+{NUMBER}\s*% BR"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid percentage pattern"))
    .collect()
});

static EUROS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i){NUMBER}\s*€"),
        format!(r"(?i){NUMBER}\s*euros?"),
        format!(r"(?i)\+{NUMBER}\s*€"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid euros pattern"))
    .collect()
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(NUMBER).expect("valid number pattern"));

/// Texts meaning "no coverage", compared case-insensitively.
const NOT_COVERED: [&str; 2] = ["non couvert", "nc"];

impl ParsedValue {
    fn not_covered(raw: &str) -> Self {
        Self {
            kind: ValueKind::Unknown,
            numeric_value: 0.0,
            original_text: raw.to_string(),
            unit: String::new(),
            is_addition: false,
            display_text: raw.to_string(),
        }
    }
}

/// Parse a raw extracted value into a [`ParsedValue`].
///
/// Percentage patterns are tried first, then currency patterns, then any bare
/// number. The first matching pattern wins.
pub fn parse_value(raw: &str) -> ParsedValue {
    let lowered = raw.to_lowercase();
    if raw.is_empty() || raw == "-" || NOT_COVERED.contains(&lowered.as_str()) {
        return ParsedValue::not_covered(raw);
    }

    let clean = raw.trim();
    let is_addition = clean.starts_with('+');

    if let Some(n) = first_capture(&PERCENTAGE_PATTERNS, clean) {
        return ParsedValue {
            kind: ValueKind::Percentage,
            numeric_value: n,
            original_text: raw.to_string(),
            unit: "%".to_string(),
            is_addition,
            display_text: format!("{}% BR", format_number(n)),
        };
    }

    if let Some(n) = first_capture(&EUROS_PATTERNS, clean) {
        return ParsedValue {
            kind: ValueKind::Euros,
            numeric_value: n,
            original_text: raw.to_string(),
            unit: "€".to_string(),
            is_addition,
            display_text: format!("{}€", format_number(n)),
        };
    }

    if let Some(n) = capture_number(&BARE_NUMBER, clean) {
        return ParsedValue {
            kind: ValueKind::Unknown,
            numeric_value: n,
            original_text: raw.to_string(),
            unit: String::new(),
            is_addition,
            display_text: format_number(n),
        };
    }

    ParsedValue {
        is_addition,
        ..ParsedValue::not_covered(raw)
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<f64> {
    patterns.iter().find_map(|re| capture_number(re, text))
}

fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Float display used in labels: integral values keep one decimal (`125.0`),
/// others use the shortest representation (`12.5`).
pub fn format_number(n: f64) -> String {
    format!("{:?}", n)
}
