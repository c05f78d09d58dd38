//! Receipt data models and the tagged parse result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single purchased line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Cleaned item name. Never empty and never purely numeric.
    pub name: String,

    /// Price, when one was printed on the same line.
    pub price: Option<Decimal>,
}

impl Item {
    pub fn new(name: impl Into<String>, price: Option<Decimal>) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// Structured receipt reconstructed from raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDraft {
    /// Merchant name, or the configured default.
    pub store_name: String,

    /// Transaction date as printed on the receipt, or today's date (ISO) as a default.
    pub date: String,

    /// Items in reading order.
    pub items: Vec<Item>,

    /// Receipt total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,

    /// Tax amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<Decimal>,
}

/// Why a parse did not produce a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The OCR engine failed to initialize or recognize.
    EngineError,
    /// Error-screen signatures were found before item extraction.
    InvalidImage,
    /// No items, and most lines look like error-screen noise.
    InvalidContent,
    /// No items, and the text does not look like an error screen.
    NoItems,
}

impl FailureKind {
    /// Default user-facing remediation message for this failure.
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::EngineError => "Text recognition failed. Please try again.",
            FailureKind::InvalidImage => {
                "This looks like a screenshot of an error screen, not a receipt."
            }
            FailureKind::InvalidContent => {
                "The image contains mostly error or log text. Please photograph a receipt."
            }
            FailureKind::NoItems => {
                "No items could be read from the receipt. Please retake a clearer photo."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EngineError => "engine_error",
            FailureKind::InvalidImage => "invalid_image",
            FailureKind::InvalidContent => "invalid_content",
            FailureKind::NoItems => "no_items",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whatever header fields were recovered before a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialReceipt {
    pub store_name: String,
    pub date: String,
}

/// A typed failure. Carries the raw text for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub kind: FailureKind,
    pub message: String,
    pub partial: PartialReceipt,
    pub raw_text: String,
}

/// Outcome of one parse. Every path through the pipeline ends in one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Success {
        receipt: ReceiptDraft,
        raw_text: String,
    },
    Failure(ParseFailure),
}

impl ParseResult {
    /// Build a failure using the kind's default message.
    pub fn failure(kind: FailureKind, partial: PartialReceipt, raw_text: impl Into<String>) -> Self {
        ParseResult::Failure(ParseFailure {
            kind,
            message: kind.message().to_string(),
            partial,
            raw_text: raw_text.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success { .. })
    }

    /// Failure kind, if this is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ParseResult::Success { .. } => None,
            ParseResult::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn receipt(&self) -> Option<&ReceiptDraft> {
        match self {
            ParseResult::Success { receipt, .. } => Some(receipt),
            ParseResult::Failure(_) => None,
        }
    }

    /// Original recognized text, present on every outcome.
    pub fn raw_text(&self) -> &str {
        match self {
            ParseResult::Success { raw_text, .. } => raw_text,
            ParseResult::Failure(failure) => &failure.raw_text,
        }
    }

    /// Flatten into the JSON response shape.
    pub fn to_response(&self) -> ParseResponse {
        match self {
            ParseResult::Success { receipt, raw_text } => ParseResponse {
                success: true,
                store_name: Some(receipt.store_name.clone()),
                date: Some(receipt.date.clone()),
                items: Some(receipt.items.clone()),
                total: receipt.total,
                tax: receipt.tax,
                original_text: raw_text.clone(),
                error: None,
                details: None,
                partial_data: None,
                debug: None,
            },
            ParseResult::Failure(failure) => ParseResponse {
                success: false,
                store_name: None,
                date: None,
                items: None,
                total: None,
                tax: None,
                original_text: failure.raw_text.clone(),
                error: Some(failure.kind),
                details: Some(failure.message.clone()),
                partial_data: Some(failure.partial.clone()),
                debug: Some(DebugInfo {
                    original_text: failure.raw_text.clone(),
                }),
            },
        }
    }
}

impl Serialize for ParseResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_response().serialize(serializer)
    }
}

/// Wire shape of a [`ParseResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<Decimal>,

    pub original_text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<PartialReceipt>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub original_text: String,
}
