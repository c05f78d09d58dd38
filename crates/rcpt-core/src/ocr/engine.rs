//! Seams between the OCR adapter and a concrete recognition engine.

use std::path::Path;

use crate::error::OcrError;

/// A loaded text-recognition engine.
///
/// Implementations are blocking; the adapter moves calls onto the blocking
/// thread pool and never issues two `recognize` calls at once.
pub trait RecognitionEngine: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Recognize all text in the image at `image_path`, one region per line
    /// in reading order.
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;

    /// Release engine resources. Must tolerate repeated calls.
    fn shutdown(&self) {}
}

/// Loads a [`RecognitionEngine`]; invoked at most once per initialization attempt.
pub trait EngineLoader: Send + Sync + 'static {
    type Engine: RecognitionEngine;

    fn load(&self) -> Result<Self::Engine, OcrError>;
}

