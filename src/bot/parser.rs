//! Free-text conversion requests such as `100 usd to eur`

use crate::core::CurrencyCode;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionIntent {
    pub amount: f64,
    pub source: CurrencyCode,
    pub target: CurrencyCode,
}

const AMOUNT: &str = r"(\d+(?:\.\d+)?)";
const CODE: &str = r"([a-z]{3,4})";
const CONNECTOR: &str = r"(?:to|in|into)";
const VERB: &str = r"\b(?:convert|change|exchange)";

// Order matters: the bare shape is tried before the verb-prefixed one.
static PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    let bare = format!(r"(?i)(?:^|\s){AMOUNT}\s+{CODE}\s+{CONNECTOR}\s+{CODE}\b");
    let verb = format!(r"(?i){VERB}\s+{AMOUNT}\s+{CODE}\s+{CONNECTOR}\s+{CODE}\b");
    [
        Regex::new(&bare).expect("bare conversion pattern"),
        Regex::new(&verb).expect("verb conversion pattern"),
    ]
});

/// Returns the first conversion request found in `text`, if any.
pub fn parse(text: &str) -> Option<ConversionIntent> {
    let caps = PATTERNS.iter().find_map(|re| re.captures(text))?;

    let amount: f64 = caps[1].parse().ok()?;
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }

    Some(ConversionIntent {
        amount,
        source: CurrencyCode::new(&caps[2]).ok()?,
        target: CurrencyCode::new(&caps[3]).ok()?,
    })
}
