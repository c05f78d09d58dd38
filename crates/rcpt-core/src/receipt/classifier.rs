//! Line splitting and role assignment.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::receipt::Item;

use super::rules::{
    AmountExtractor, DateExtractor, ExtractionMatch, FieldExtractor, ItemCleaner, PatternTables,
};

/// A cleaned, non-trivial line of raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Position among the kept lines.
    pub index: usize,
    /// Trimmed text, always longer than one character.
    pub text: String,
}

/// Role assigned to a surviving line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineRole {
    MerchantCandidate,
    DateCandidate,
    Total,
    Tax,
    ItemCandidate,
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    pub line: Line,
    pub role: LineRole,
}

/// Everything the classifier learned about one raw text.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// All kept lines, noise included.
    pub lines: Vec<Line>,
    /// Non-noise lines in reading order, each with exactly one role.
    pub classified: Vec<ClassifiedLine>,
    /// Lines dropped for matching an error signature.
    pub noise_lines: usize,
    pub merchant: Option<String>,
    pub date: Option<ExtractionMatch<NaiveDate>>,
    pub total: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub items: Vec<Item>,
}

impl Classification {
    /// Lines that ended up with `role`.
    pub fn lines_with_role(&self, role: LineRole) -> impl Iterator<Item = &Line> {
        self.classified
            .iter()
            .filter(move |c| c.role == role)
            .map(|c| &c.line)
    }
}

/// Split raw text on any line break, trim, and drop lines of one character or less.
pub fn split_lines(raw_text: &str) -> Vec<Line> {
    raw_text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|text| text.chars().count() > 1)
        .enumerate()
        .map(|(index, text)| Line {
            index,
            text: text.to_string(),
        })
        .collect()
}

/// Assigns roles to lines using first-match-wins policies.
///
/// Precedence: noise lines are dropped, then merchant, date, total/tax, and
/// finally items. A line keeps the first role it receives.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    tables: Arc<PatternTables>,
    config: ExtractionConfig,
}

impl LineClassifier {
    pub fn new(tables: Arc<PatternTables>, config: ExtractionConfig) -> Self {
        Self { tables, config }
    }

    pub fn classify(&self, raw_text: &str, today: NaiveDate) -> Classification {
        self.classify_lines(split_lines(raw_text), today)
    }

    pub fn classify_lines(&self, lines: Vec<Line>, today: NaiveDate) -> Classification {
        let (survivors, noise): (Vec<&Line>, Vec<&Line>) =
            lines.iter().partition(|line| !self.tables.is_noise(&line.text));

        let mut result = Classification {
            noise_lines: noise.len(),
            ..Default::default()
        };
        let mut roles: Vec<Option<LineRole>> = vec![None; survivors.len()];

        let merchant_pos = survivors
            .iter()
            .take(self.config.merchant_scan_lines)
            .position(|line| self.is_store_name(&line.text));
        if let Some(pos) = merchant_pos {
            roles[pos] = Some(LineRole::MerchantCandidate);
            result.merchant = Some(survivors[pos].text.clone());
        }

        let dates = DateExtractor::new(&self.tables.dates, today, self.config.date_window_months);
        for (i, line) in survivors.iter().enumerate() {
            if roles[i].is_some() {
                continue;
            }
            if let Some(found) = dates.extract(&line.text) {
                roles[i] = Some(LineRole::DateCandidate);
                result.date = Some(found);
                break;
            }
        }

        let totals = AmountExtractor::new(&self.tables.total).excluding(&self.tables.subtotal);
        let taxes = AmountExtractor::new(&self.tables.tax);
        for (i, line) in survivors.iter().enumerate() {
            if roles[i].is_some() {
                continue;
            }
            if let Some(found) = totals.extract(&line.text) {
                roles[i] = Some(LineRole::Total);
                result.total.get_or_insert(found.value);
            } else if let Some(found) = taxes.extract(&line.text) {
                roles[i] = Some(LineRole::Tax);
                result.tax.get_or_insert(found.value);
            }
        }

        let cleaner = ItemCleaner::new(&self.tables, self.config.extract_prices);
        let items_start = merchant_pos.map_or(0, |pos| pos + 1);
        for (i, line) in survivors.iter().enumerate().skip(items_start) {
            if roles[i].is_some() || self.tables.is_skippable(&line.text) {
                continue;
            }
            if let Some(item) = cleaner.clean(&line.text) {
                roles[i] = Some(LineRole::ItemCandidate);
                result.items.push(item);
            }
        }

        result.classified = survivors
            .iter()
            .zip(roles)
            .map(|(line, role)| ClassifiedLine {
                line: (*line).clone(),
                role: role.unwrap_or(LineRole::Skip),
            })
            .collect();

        debug!(
            "Classified {} lines ({} noise): merchant={:?}, date={:?}, {} items",
            lines.len(),
            result.noise_lines,
            result.merchant,
            result.date.as_ref().map(|d| d.source.as_str()),
            result.items.len()
        );

        result.lines = lines;
        result
    }

    fn is_store_name(&self, text: &str) -> bool {
        text.chars().count() > self.config.min_merchant_length
            && !self.tables.is_invalid_store_name(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    fn classifier() -> LineClassifier {
        LineClassifier::new(PatternTables::shared_default(), ExtractionConfig::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_split_lines() {
        let lines = split_lines("  FreshMart \r\n\r\nx\n  \n04/12/2024\rMilk");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();

        assert_eq!(texts, vec!["FreshMart", "04/12/2024", "Milk"]);
        assert_eq!(lines[2].index, 2);
    }

    #[test]
    fn test_custom_skip_pattern() {
        let text = "FreshMart\nBag Fee 0.10\nMilk 3.49";

        let result = classifier().classify(text, today());
        assert_eq!(result.items.len(), 2);

        let tables = PatternTables::default().with_skip_pattern(Regex::new(r"(?i)^bag fee\b").unwrap());
        let classifier = LineClassifier::new(Arc::new(tables), ExtractionConfig::default());

        let result = classifier.classify(text, today());
        assert_eq!(result.items, vec![Item::new("Milk", Some(Decimal::new(349, 2)))]);
    }

    #[test]
    fn test_basic_receipt() {
        let result = classifier().classify(
            "FreshMart\n04/12/2024\nMilk 3.49\nBread 2.19\nTOTAL 5.68",
            today(),
        );

        assert_eq!(result.merchant.as_deref(), Some("FreshMart"));
        assert_eq!(result.date.as_ref().map(|d| d.source.as_str()), Some("04/12/2024"));
        assert_eq!(result.total, Some(Decimal::new(568, 2)));
        assert_eq!(
            result.items,
            vec![
                Item::new("Milk", Some(Decimal::new(349, 2))),
                Item::new("Bread", Some(Decimal::new(219, 2))),
            ]
        );

        let roles: Vec<LineRole> = result.classified.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                LineRole::MerchantCandidate,
                LineRole::DateCandidate,
                LineRole::ItemCandidate,
                LineRole::ItemCandidate,
                LineRole::Total,
            ]
        );
    }

    #[test]
    fn test_first_merchant_wins() {
        let result = classifier().classify(
            "12:45\nCorner Shop\nSUPER GIANT HYPERMARKET OUTLET\nApples 1.99",
            today(),
        );

        assert_eq!(result.merchant.as_deref(), Some("Corner Shop"));
        // Lines after the merchant are item candidates
        assert_eq!(result.items[0].name, "SUPER GIANT HYPERMARKET OUTLET");
    }

    #[test]
    fn test_merchant_only_in_first_lines() {
        let result = classifier().classify("$$$\n12:00\n###\n0001\n99%\nLate Store Name", today());

        assert_eq!(result.merchant, None);
        assert_eq!(result.items, vec![Item::new("Late Store Name", None)]);
    }

    #[test]
    fn test_first_valid_date_wins() {
        let result = classifier().classify(
            "FreshMart\n13/13/2024\n01/05/2022\n05/20/2024\n05/21/2024\nMilk",
            today(),
        );

        let date = result.date.unwrap();
        assert_eq!(date.source, "05/20/2024");
        assert_eq!(date.value, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
    }

    #[test]
    fn test_noise_lines_never_candidates() {
        let result = classifier().classify("ReferenceError\nFreshMart\nMilk 3.49", today());

        assert_eq!(result.noise_lines, 1);
        assert_eq!(result.merchant.as_deref(), Some("FreshMart"));
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn test_total_and_tax_first_occurrence() {
        let result = classifier().classify(
            "FreshMart\nEggs 2.99\nSUBTOTAL 2.99\nTAX 0.24\nTOTAL 3.23\nTOTAL 9.99\nCASH 5.00\nCHANGE 1.77",
            today(),
        );

        assert_eq!(result.total, Some(Decimal::new(323, 2)));
        assert_eq!(result.tax, Some(Decimal::new(24, 2)));
        assert_eq!(result.items, vec![Item::new("Eggs", Some(Decimal::new(299, 2)))]);
        assert_eq!(result.lines_with_role(LineRole::Total).count(), 2);
    }

    #[test]
    fn test_prices_off() {
        let config = ExtractionConfig {
            extract_prices: false,
            ..Default::default()
        };
        let result = LineClassifier::new(PatternTables::shared_default(), config)
            .classify("FreshMart\nMilk 3.49", today());

        assert_eq!(result.items, vec![Item::new("Milk", None)]);
    }
}
