//! Combines detector and classifier output into a [`ParseResult`].

use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::config::ExtractionConfig;
use crate::models::receipt::{FailureKind, ParseFailure, ParseResult, PartialReceipt, ReceiptDraft};

use super::classifier::{split_lines, LineClassifier};
use super::detector::ErrorScreenDetector;
use super::rules::PatternTables;

/// Builds the final result for one raw text. Never fails: every path
/// produces a [`ParseResult`].
#[derive(Debug, Clone)]
pub struct ReceiptAssembler {
    detector: ErrorScreenDetector,
    classifier: LineClassifier,
    default_store_name: String,
}

impl ReceiptAssembler {
    pub fn new(tables: Arc<PatternTables>, config: ExtractionConfig) -> Self {
        Self {
            detector: ErrorScreenDetector::from_config(Arc::clone(&tables), &config),
            default_store_name: config.default_store_name.clone(),
            classifier: LineClassifier::new(tables, config),
        }
    }

    pub fn assemble(&self, raw_text: &str, today: NaiveDate) -> ParseResult {
        let lines = split_lines(raw_text);

        let early = self.detector.check_signatures(raw_text, &lines);
        if early.is_error_screen {
            info!(
                "Rejecting text as error screen ({} signatures: {:?})",
                early.distinct_matches(),
                early.matched_signatures
            );
            return ParseResult::failure(
                FailureKind::InvalidImage,
                self.placeholder(today),
                raw_text,
            );
        }

        let classification = self.classifier.classify_lines(lines, today);

        let draft = ReceiptDraft {
            store_name: classification
                .merchant
                .clone()
                .unwrap_or_else(|| self.default_store_name.clone()),
            date: classification
                .date
                .as_ref()
                .map(|d| d.source.clone())
                .unwrap_or_else(|| default_date(today)),
            items: classification.items.clone(),
            total: classification.total,
            tax: classification.tax,
        };

        if draft.items.is_empty() {
            let late = self
                .detector
                .check_line_density(raw_text, &classification.lines);
            let kind = if late.is_error_screen {
                FailureKind::InvalidContent
            } else {
                FailureKind::NoItems
            };

            info!("No items extracted, failing with {}", kind);
            return ParseResult::failure(
                kind,
                PartialReceipt {
                    store_name: draft.store_name,
                    date: draft.date,
                },
                raw_text,
            );
        }

        debug!(
            "Assembled receipt for {:?} with {} items",
            draft.store_name,
            draft.items.len()
        );

        ParseResult::Success {
            receipt: draft,
            raw_text: raw_text.to_string(),
        }
    }

    /// Failure for a fault outside the heuristics (engine, I/O), with placeholder values.
    pub fn engine_failure(&self, cause: impl Display, raw_text: &str, today: NaiveDate) -> ParseResult {
        let kind = FailureKind::EngineError;
        ParseResult::Failure(ParseFailure {
            kind,
            message: format!("{} ({})", kind.message(), cause),
            partial: self.placeholder(today),
            raw_text: raw_text.to_string(),
        })
    }

    fn placeholder(&self, today: NaiveDate) -> PartialReceipt {
        PartialReceipt {
            store_name: self.default_store_name.clone(),
            date: default_date(today),
        }
    }
}

fn default_date(today: NaiveDate) -> String {
    today.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::Item;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn assembler() -> ReceiptAssembler {
        ReceiptAssembler::new(PatternTables::shared_default(), ExtractionConfig::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_end_to_end_receipt() {
        let raw = "FreshMart\n04/12/2024\nMilk 3.49\nBread 2.19\nTOTAL 5.68";
        let result = assembler().assemble(raw, today());

        assert_eq!(
            result,
            ParseResult::Success {
                receipt: ReceiptDraft {
                    store_name: "FreshMart".to_string(),
                    date: "04/12/2024".to_string(),
                    items: vec![
                        Item::new("Milk", Some(Decimal::new(349, 2))),
                        Item::new("Bread", Some(Decimal::new(219, 2))),
                    ],
                    total: Some(Decimal::new(568, 2)),
                    tax: None,
                },
                raw_text: raw.to_string(),
            }
        );
    }

    #[test]
    fn test_item_names_resembling_markers() {
        let raw = "FreshMart\n2 Xtra Large Eggs 3.99\n1 XL Pizza 9.99\nMilk 2% 3.49\nError-free Eggs 2.99\nTOTAL 1,020.46";
        let result = assembler().assemble(raw, today());

        let ParseResult::Success { receipt, .. } = &result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(
            receipt.items,
            vec![
                Item::new("2 Xtra Large Eggs", Some(Decimal::new(399, 2))),
                Item::new("1 XL Pizza", Some(Decimal::new(999, 2))),
                Item::new("Milk 2%", Some(Decimal::new(349, 2))),
                Item::new("Error-free Eggs", Some(Decimal::new(299, 2))),
            ]
        );
        assert_eq!(receipt.total, Some(Decimal::new(102046, 2)));
    }

    #[test]
    fn test_error_screen_is_invalid_image() {
        let raw = "TypeError: undefined is not a function\n[runtime not ready]\nDISMISS RELOAD";
        let result = assembler().assemble(raw, today());

        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidImage));
        assert_eq!(result.raw_text(), raw);
    }

    #[test]
    fn test_single_stray_signature_keeps_receipt() {
        let raw = "FreshMart\n04/12/2024\nReferenceError\nMilk 3.49\nBread 2.19";
        let result = assembler().assemble(raw, today());

        assert!(result.is_success());
        assert_eq!(result.receipt().unwrap().items.len(), 2);
    }

    #[test]
    fn test_noisy_itemless_text_is_invalid_content() {
        let raw = "Loading...\nReferenceError\n12:45";
        let result = assembler().assemble(raw, today());

        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidContent));
    }

    #[test]
    fn test_two_signatures_without_items() {
        let raw = "ReferenceError\nat render (App.js:10:5)";
        let kind = assembler().assemble(raw, today()).failure_kind();

        assert!(matches!(
            kind,
            Some(FailureKind::InvalidImage) | Some(FailureKind::InvalidContent)
        ));
    }

    #[test]
    fn test_empty_input_is_no_items() {
        for raw in ["", "   \n\t\n  "] {
            let result = assembler().assemble(raw, today());

            match result {
                ParseResult::Failure(failure) => {
                    assert_eq!(failure.kind, FailureKind::NoItems);
                    assert_eq!(failure.partial.store_name, "Unknown Store");
                    assert_eq!(failure.partial.date, "2024-06-01");
                    assert_eq!(failure.raw_text, raw);
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_items_keeps_partial_header() {
        let raw = "FreshMart\n04/12/2024\nTOTAL 5.68\nTHANK YOU";
        let result = assembler().assemble(raw, today());

        match result {
            ParseResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::NoItems);
                assert_eq!(failure.partial.store_name, "FreshMart");
                assert_eq!(failure.partial.date, "04/12/2024");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_default_date_when_missing() {
        let result = assembler().assemble("FreshMart\nMilk 3.49", today());

        assert_eq!(result.receipt().unwrap().date, "2024-06-01");
    }

    #[test]
    fn test_same_input_same_result() {
        let raw = "Corner Shop\nMar 3, 2024\n2 x Wh0le Milk!!\nEggs 2.99\nTAX 0.40";
        let assembler = assembler();

        let first = assembler.assemble(raw, today());
        let second = assembler.assemble(raw, today());
        assert_eq!(first, second);
        assert_eq!(first.receipt().unwrap().items[0].name, "Wh0le Milk");
        assert_eq!(first.receipt().unwrap().tax, Some(Decimal::new(40, 2)));
    }

    #[test]
    fn test_engine_failure_placeholders() {
        let result = assembler().engine_failure("model missing", "", today());

        match result {
            ParseResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::EngineError);
                assert!(failure.message.contains("model missing"));
                assert_eq!(failure.partial.store_name, "Unknown Store");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
