//! Amount extraction for receipt totals, tax lines, and item prices.

use rust_decimal::Decimal;
use std::str::FromStr;

use regex::Regex;

use super::{ExtractionMatch, FieldExtractor};

/// Extracts the amount captured by a labeled line pattern (`TOTAL 5.68`).
pub struct AmountExtractor<'a> {
    pattern: &'a Regex,
    exclude: Option<&'a Regex>,
}

impl<'a> AmountExtractor<'a> {
    pub fn new(pattern: &'a Regex) -> Self {
        Self {
            pattern,
            exclude: None,
        }
    }

    /// Never match lines that also match `exclude` (e.g. subtotal lines).
    pub fn excluding(mut self, exclude: &'a Regex) -> Self {
        self.exclude = Some(exclude);
        self
    }
}

impl FieldExtractor for AmountExtractor<'_> {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        if self.exclude.is_some_and(|exclude| exclude.is_match(text)) {
            return Vec::new();
        }

        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let amount = parse_amount(&caps[1])?;
                Some(ExtractionMatch::from_match(amount, caps.get(0)))
            })
            .collect()
    }
}

/// Split a trailing price off an item line.
///
/// Returns the line with the price removed and the parsed price, or the line
/// unchanged when it has no trailing price.
pub fn split_trailing_price<'t>(pattern: &Regex, line: &'t str) -> (&'t str, Option<Decimal>) {
    match pattern.captures(line) {
        Some(caps) => {
            let price = parse_amount(&caps[1]);
            let start = caps.get(0).map_or(line.len(), |m| m.start());
            (&line[..start], price)
        }
        None => (line, None),
    }
}

/// Parse an amount with `.` or `,` as the decimal separator ("5.68", "5,68", "1,234.56").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(_), None) => cleaned.replace(',', "."),
        // Whichever separator comes last is the decimal one
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}
