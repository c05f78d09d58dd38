//! Detection of captured error/debug screens posing as receipts.

use std::sync::Arc;

use tracing::debug;

use crate::models::config::ExtractionConfig;

use super::classifier::Line;
use super::rules::PatternTables;

/// Outcome of an error-screen check.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorScreenVerdict {
    /// Whether the text should be treated as an error screen.
    pub is_error_screen: bool,
    /// Names of the distinct signatures found anywhere in the text.
    pub matched_signatures: Vec<&'static str>,
    /// Lines matching at least one signature.
    pub matching_lines: usize,
    /// Lines considered.
    pub total_lines: usize,
}

impl ErrorScreenVerdict {
    pub fn distinct_matches(&self) -> usize {
        self.matched_signatures.len()
    }

    /// Share of lines matching a signature. Zero when there are no lines.
    pub fn line_ratio(&self) -> f32 {
        if self.total_lines == 0 {
            0.0
        } else {
            self.matching_lines as f32 / self.total_lines as f32
        }
    }
}

/// Decides whether raw text is an application error screen.
///
/// Runs twice per parse: [`check_signatures`](Self::check_signatures) before
/// classification, and [`check_line_density`](Self::check_line_density) once
/// item extraction has come back empty.
#[derive(Debug, Clone)]
pub struct ErrorScreenDetector {
    tables: Arc<PatternTables>,
    signature_threshold: usize,
    line_ratio_threshold: f32,
}

impl ErrorScreenDetector {
    pub fn new(tables: Arc<PatternTables>) -> Self {
        Self::from_config(tables, &ExtractionConfig::default())
    }

    pub fn from_config(tables: Arc<PatternTables>, config: &ExtractionConfig) -> Self {
        Self {
            tables,
            signature_threshold: config.error_signature_threshold,
            line_ratio_threshold: config.noise_line_ratio,
        }
    }

    /// Early check: fires when enough distinct signatures appear anywhere.
    pub fn check_signatures(&self, raw_text: &str, lines: &[Line]) -> ErrorScreenVerdict {
        let mut verdict = self.scan(raw_text, lines);
        verdict.is_error_screen = verdict.distinct_matches() >= self.signature_threshold;

        debug!(
            "Error-screen signature check: {} distinct ({:?}), fired={}",
            verdict.distinct_matches(),
            verdict.matched_signatures,
            verdict.is_error_screen
        );

        verdict
    }

    /// Stricter check for item-less text: also fires when the share of
    /// signature-bearing lines exceeds the configured ratio.
    pub fn check_line_density(&self, raw_text: &str, lines: &[Line]) -> ErrorScreenVerdict {
        let mut verdict = self.scan(raw_text, lines);
        verdict.is_error_screen = verdict.distinct_matches() >= self.signature_threshold
            || verdict.line_ratio() > self.line_ratio_threshold;

        debug!(
            "Error-screen density check: {}/{} noise lines ({:.2}), fired={}",
            verdict.matching_lines,
            verdict.total_lines,
            verdict.line_ratio(),
            verdict.is_error_screen
        );

        verdict
    }

    fn scan(&self, raw_text: &str, lines: &[Line]) -> ErrorScreenVerdict {
        let matched_signatures = self
            .tables
            .error_signatures
            .iter()
            .filter(|s| s.is_match(raw_text))
            .map(|s| s.name)
            .collect();

        let matching_lines = lines
            .iter()
            .filter(|line| self.tables.is_noise(&line.text))
            .count();

        ErrorScreenVerdict {
            is_error_screen: false,
            matched_signatures,
            matching_lines,
            total_lines: lines.len(),
        }
    }
}
