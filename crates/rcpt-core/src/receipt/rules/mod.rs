//! Rule-based field extractors for receipts.

pub mod amounts;
pub mod dates;
pub mod items;
pub mod patterns;

pub use amounts::{parse_amount, split_trailing_price, AmountExtractor};
pub use dates::DateExtractor;
pub use items::ItemCleaner;
pub use patterns::{DatePatterns, PatternTables, Signature};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// An extracted value with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    /// Build from a regex match, keeping its text and span.
    pub fn from_match(value: T, m: Option<regex::Match<'_>>) -> Self {
        match m {
            Some(m) => Self::new(value, m.as_str()).with_position(m.start(), m.end()),
            None => Self::new(value, ""),
        }
    }
}
