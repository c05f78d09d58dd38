//! Core library for receipt OCR processing.
//!
//! This crate provides:
//! - Image preprocessing and a lifecycle-managed OCR engine adapter
//! - Error-screen detection for captured app/debug screens
//! - Line classification into merchant, date, items, total and tax
//! - A deterministic [`ParseResult`] for every input, success or failure

pub mod clock;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod receipt;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{OcrError, ReceiptError, Result};
pub use models::config::{ExtractionConfig, OcrConfig, PreprocessConfig, ReceiptConfig};
pub use models::receipt::{
    FailureKind, Item, ParseFailure, ParseResponse, ParseResult, PartialReceipt, ReceiptDraft,
};
pub use ocr::{EngineLoader, EngineStatus, ImagePreprocessor, OcrAdapter, RecognitionEngine};
#[cfg(feature = "native")]
pub use ocr::{PureOcrEngine, PureOcrLoader};
pub use pipeline::ReceiptProcessor;
pub use receipt::rules::PatternTables;
pub use receipt::{ErrorScreenDetector, LineClassifier, ReceiptAssembler};
