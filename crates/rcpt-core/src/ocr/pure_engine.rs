//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use image::GenericImageView;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::engine::{EngineLoader, RecognitionEngine};

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    /// `None` once shut down.
    engine: Mutex<Option<pure_onnx_ocr::engine::OcrEngine>>,
    keep_unk: bool,
}

impl PureOcrEngine {
    /// Create an engine from the model files named in `config`.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!(
            "Loaded pure-onnx-ocr engine from {}",
            config.model_dir.display()
        );

        Ok(Self {
            engine: Mutex::new(Some(engine)),
            keep_unk: config.keep_unk,
        })
    }
}

impl RecognitionEngine for PureOcrEngine {
    fn name(&self) -> &'static str {
        "pure-onnx-ocr"
    }

    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let start = Instant::now();
        let image = image::open(image_path)
            .map_err(|e| OcrError::InvalidImage(format!("{}: {}", image_path.display(), e)))?;
        let (width, height) = image.dimensions();

        debug!("Processing image: {}x{}", width, height);

        let guard = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let engine = guard.as_ref().ok_or(OcrError::Terminated)?;

        let results = engine
            .run_from_image(&image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;
        drop(guard);

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut regions: Vec<TextRegion> = results
            .iter()
            .map(|r| TextRegion {
                bbox: polygon_to_rect(&r.bounding_box),
                text: if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                },
            })
            .collect();

        sort_by_reading_order(&mut regions);

        let text = join_rows(&regions);

        info!(
            "OCR complete: {} text regions in {}ms",
            regions.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    fn shutdown(&self) {
        let released = self
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!("Released pure-onnx-ocr sessions");
        }
    }
}

/// Loads [`PureOcrEngine`] from the configured model directory.
#[derive(Debug, Clone)]
pub struct PureOcrLoader {
    config: OcrConfig,
}

impl PureOcrLoader {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl EngineLoader for PureOcrLoader {
    type Engine = PureOcrEngine;

    fn load(&self) -> Result<PureOcrEngine, OcrError> {
        PureOcrEngine::from_config(&self.config)
    }
}

struct TextRegion {
    /// Axis-aligned (min_x, min_y, max_x, max_y).
    bbox: (f32, f32, f32, f32),
    text: String,
}

const ROW_HEIGHT: f32 = 20.0;

fn row_of(region: &TextRegion) -> i32 {
    (region.bbox.1 / ROW_HEIGHT) as i32
}

/// Top-to-bottom in 20px rows, then left-to-right.
fn sort_by_reading_order(regions: &mut [TextRegion]) {
    regions.sort_by(|a, b| {
        let row_a = row_of(a);
        let row_b = row_of(b);
        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            a.bbox
                .0
                .partial_cmp(&b.bbox.0)
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

/// One output line per row, regions within a row separated by a space.
/// Expects `regions` already in reading order.
fn join_rows(regions: &[TextRegion]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_row = None;

    for region in regions {
        let text = region.text.trim();
        if text.is_empty() {
            continue;
        }

        let row = row_of(region);
        match lines.last_mut() {
            Some(line) if current_row == Some(row) => {
                line.push(' ');
                line.push_str(text);
            }
            _ => lines.push(text.to_string()),
        }
        current_row = Some(row);
    }

    lines.join("\n")
}

fn polygon_to_rect(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32, f32, f32) {
    let mut rect = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for coord in polygon.exterior().coords().take(4) {
        let (x, y) = (coord.x as f32, coord.y as f32);
        rect.0 = rect.0.min(x);
        rect.1 = rect.1.min(y);
        rect.2 = rect.2.max(x);
        rect.3 = rect.3.max(y);
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, text: &str) -> TextRegion {
        TextRegion {
            bbox: (x, y, x + 50.0, y + 15.0),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reading_order() {
        let mut regions = vec![
            region(200.0, 45.0, "3.49"),
            region(10.0, 5.0, "FreshMart"),
            region(10.0, 48.0, "Milk"),
        ];

        sort_by_reading_order(&mut regions);

        let texts: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["FreshMart", "Milk", "3.49"]);

        assert_eq!(join_rows(&regions), "FreshMart\nMilk 3.49");
    }

    #[test]
    fn test_rows_feed_totals_and_prices() {
        let mut regions = vec![
            region(220.0, 62.0, "2.19"),
            region(10.0, 60.0, "Bread"),
            region(10.0, 81.0, "TOTAL"),
            region(220.0, 84.0, "5.68"),
            region(10.0, 2.0, "FreshMart"),
            region(120.0, 64.0, " "),
        ];

        sort_by_reading_order(&mut regions);

        assert_eq!(join_rows(&regions), "FreshMart\nBread 2.19\nTOTAL 5.68");
    }

    #[test]
    fn test_missing_models_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = OcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let err = PureOcrLoader::new(config).load().err().unwrap();
        assert!(matches!(err, OcrError::ModelLoad(msg) if msg.contains("det.onnx")));
    }
}
