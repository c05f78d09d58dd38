//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// OCR engine or preprocessing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to the OCR engine and its inputs.
///
/// Cloneable so a single initialization outcome can be handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// `recognize` was called before `initialize` completed.
    #[error("OCR engine is not initialized")]
    NotInitialized,

    /// The engine was terminated.
    #[error("OCR engine has been terminated")]
    Terminated,

    /// The engine did not release its resources in time.
    #[error("OCR engine did not shut down within {0}ms")]
    ShutdownTimeout(u64),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, ReceiptError>;
