//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ReceiptError;

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Image preprocessing configuration.
    pub preprocessing: PreprocessConfig,

    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Receipt extraction configuration.
    pub extraction: ExtractionConfig,
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Run preprocessing at all. When off, the original image goes straight
    /// to the engine.
    pub enabled: bool,

    /// Longer side is bounded to this many pixels (aspect ratio preserved).
    pub max_dimension: u32,

    /// Stretch the gray histogram to the full 0-255 range.
    pub normalize_contrast: bool,

    /// Apply an unsharp mask.
    pub sharpen: bool,

    /// Gaussian sigma for the unsharp mask.
    pub sharpen_sigma: f32,

    /// Binarization threshold (0-255). Pixels above become white.
    pub binarize_threshold: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_dimension: 1800,
            normalize_contrast: true,
            sharpen: true,
            sharpen_sigma: 1.0,
            binarize_threshold: 128,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text instead of replacing them with spaces.
    pub keep_unk: bool,

    /// Upper bound on how long `terminate()` waits for the engine to release resources.
    pub shutdown_timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl OcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Receipt extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// How many leading lines are considered for the merchant name.
    pub merchant_scan_lines: usize,

    /// A merchant name must be longer than this many characters.
    pub min_merchant_length: usize,

    /// Dates further than this many months from today are rejected.
    pub date_window_months: u32,

    /// Distinct error signatures needed to call the text an error screen.
    pub error_signature_threshold: usize,

    /// Share of noise lines above which item-less text is an error screen.
    pub noise_line_ratio: f32,

    /// Split a trailing price off item lines.
    pub extract_prices: bool,

    /// Store name used when no merchant line is found.
    pub default_store_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merchant_scan_lines: 5,
            min_merchant_length: 3,
            date_window_months: 12,
            error_signature_threshold: 2,
            noise_line_ratio: 0.3,
            extract_prices: true,
            default_store_name: "Unknown Store".to_string(),
        }
    }
}

impl ReceiptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ReceiptError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ReceiptError::Config(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ReceiptError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ReceiptError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
