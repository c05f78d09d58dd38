//! End-to-end receipt processing: image in, [`ParseResult`] out.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::error::OcrError;
use crate::models::config::ReceiptConfig;
use crate::models::receipt::ParseResult;
use crate::ocr::{EngineLoader, EngineStatus, ImagePreprocessor, OcrAdapter, PreparedImage};
use crate::receipt::rules::PatternTables;
use crate::receipt::ReceiptAssembler;

/// Long-lived receipt service owning the shared OCR engine.
///
/// The host calls [`start`](Self::start) once (optional, the first image
/// initializes lazily) and [`shutdown`](Self::shutdown) once on exit.
pub struct ReceiptProcessor<L: EngineLoader, C: Clock = SystemClock> {
    preprocessor: ImagePreprocessor,
    adapter: Arc<OcrAdapter<L>>,
    assembler: ReceiptAssembler,
    clock: C,
}

impl<L: EngineLoader> ReceiptProcessor<L, SystemClock> {
    pub fn new(loader: L, config: &ReceiptConfig) -> Self {
        let adapter =
            OcrAdapter::new(loader).with_shutdown_timeout(config.ocr.shutdown_timeout());

        Self {
            preprocessor: ImagePreprocessor::new().with_config(config.preprocessing.clone()),
            adapter: Arc::new(adapter),
            assembler: ReceiptAssembler::new(
                PatternTables::shared_default(),
                config.extraction.clone(),
            ),
            clock: SystemClock,
        }
    }
}

impl<L: EngineLoader, C: Clock> ReceiptProcessor<L, C> {
    /// Replace the source of "today".
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ReceiptProcessor<L, C2> {
        ReceiptProcessor {
            preprocessor: self.preprocessor,
            adapter: self.adapter,
            assembler: self.assembler,
            clock,
        }
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.adapter.status()
    }

    /// Eagerly initialize the OCR engine.
    pub async fn start(&self) -> Result<(), OcrError> {
        self.adapter.initialize().await
    }

    /// Release the OCR engine, waiting at most the configured shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), OcrError> {
        info!("Shutting down receipt processor");
        self.adapter.terminate().await
    }

    /// Run the text heuristics over already-recognized text.
    pub fn parse_text(&self, raw_text: &str) -> ParseResult {
        self.assembler.assemble(raw_text, self.clock.today())
    }

    /// Preprocess, recognize and parse one receipt image. Never fails: engine
    /// faults come back as an `engine_error` failure.
    pub async fn process_image(&self, image_path: &Path) -> ParseResult {
        let today = self.clock.today();
        info!("Processing receipt {}", image_path.display());

        let prepared = self.preprocessor.prepare(image_path);
        if let PreparedImage::Degraded { reason, .. } = &prepared {
            debug!("Continuing with original image ({})", reason);
        }

        let recognized = self.recognize(prepared.path()).await;
        // Temporary image is removed here on every path.
        drop(prepared);

        let raw_text = match recognized {
            Ok(text) => text,
            Err(e) => {
                error!("OCR failed for {}: {}", image_path.display(), e);
                return self.assembler.engine_failure(e, "", today);
            }
        };

        debug!("Recognized {} characters", raw_text.len());

        let result = self.assembler.assemble(&raw_text, today);
        match result.failure_kind() {
            None => info!("Parsed receipt {}", image_path.display()),
            Some(kind) => info!("Receipt {} rejected: {}", image_path.display(), kind),
        }
        result
    }

    async fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        self.adapter.initialize().await?;
        self.adapter.recognize(image_path).await
    }
}
