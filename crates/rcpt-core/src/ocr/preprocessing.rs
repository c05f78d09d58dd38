//! Image preprocessing for OCR.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::OcrError;
use crate::models::config::PreprocessConfig;

/// Image handed to the OCR engine after preprocessing.
///
/// A processed image lives in a temporary file that is deleted when this
/// value is dropped, whichever way the pipeline exits.
#[derive(Debug)]
pub enum PreparedImage {
    /// Preprocessed copy in a temporary file.
    Processed(TempPath),
    /// Preprocessing is disabled; the original is used as-is.
    Unchanged(PathBuf),
    /// Preprocessing failed; the original is used and the reason kept for logging.
    Degraded { original: PathBuf, reason: String },
}

impl PreparedImage {
    /// Path the OCR engine should read.
    pub fn path(&self) -> &Path {
        match self {
            PreparedImage::Processed(temp) => temp,
            PreparedImage::Unchanged(original) => original,
            PreparedImage::Degraded { original, .. } => original,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PreparedImage::Degraded { .. })
    }
}

/// Image preprocessor for the OCR pipeline.
///
/// Bounds the longer side, converts to gray, stretches contrast, sharpens,
/// and binarizes with a fixed threshold.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PreprocessConfig) -> Self {
        self.config = config;
        self
    }

    /// Best-effort preprocessing. Never fails: on any error the original path
    /// is returned as [`PreparedImage::Degraded`].
    pub fn prepare(&self, image_path: &Path) -> PreparedImage {
        if !self.config.enabled {
            return PreparedImage::Unchanged(image_path.to_path_buf());
        }

        match self.transform(image_path) {
            Ok(temp) => PreparedImage::Processed(temp),
            Err(e) => {
                warn!(
                    "Preprocessing failed for {}, using original: {}",
                    image_path.display(),
                    e
                );
                PreparedImage::Degraded {
                    original: image_path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Transform the image at `image_path` into a new temporary PNG.
    pub fn transform(&self, image_path: &Path) -> Result<TempPath, OcrError> {
        let image = image::open(image_path)
            .map_err(|e| OcrError::InvalidImage(format!("{}: {}", image_path.display(), e)))?;

        let processed = self.process(&image);

        let temp = tempfile::Builder::new()
            .prefix("rcpt-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Preprocessing(format!("failed to create temp file: {}", e)))?
            .into_temp_path();

        processed
            .save_with_format(&temp, ImageFormat::Png)
            .map_err(|e| OcrError::Preprocessing(format!("failed to write image: {}", e)))?;

        debug!(
            "Preprocessed {} -> {}",
            image_path.display(),
            temp.display()
        );

        Ok(temp)
    }

    /// Apply the configured pixel transforms.
    pub fn process(&self, image: &DynamicImage) -> GrayImage {
        let (orig_width, orig_height) = image.dimensions();
        let (new_width, new_height) =
            calculate_resize_dimensions(orig_width, orig_height, self.config.max_dimension);

        let resized = if (new_width, new_height) == (orig_width, orig_height) {
            image.clone()
        } else {
            debug!(
                "Resizing {}x{} -> {}x{}",
                orig_width, orig_height, new_width, new_height
            );
            image.resize_exact(new_width, new_height, FilterType::Lanczos3)
        };

        let mut gray = resized.to_luma8();

        if self.config.normalize_contrast {
            normalize_contrast(&mut gray);
        }

        if self.config.sharpen {
            gray = imageops::unsharpen(&gray, self.config.sharpen_sigma, 0);
        }

        binarize(&mut gray, self.config.binarize_threshold);
        gray
    }
}

fn calculate_resize_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    let max_dim = width.max(height);

    if max_dim <= target_size || target_size == 0 {
        return (width, height);
    }

    let scale = target_size as f32 / max_dim as f32;
    let new_width = (width as f32 * scale).round() as u32;
    let new_height = (height as f32 * scale).round() as u32;

    (new_width.max(1), new_height.max(1))
}

/// Stretch gray levels so the darkest pixel becomes 0 and the brightest 255.
fn normalize_contrast(image: &mut GrayImage) {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max <= min {
        return;
    }

    let range = (max - min) as u32;
    for pixel in image.pixels_mut() {
        let stretched = (pixel[0] - min) as u32 * 255 / range;
        *pixel = Luma([stretched as u8]);
    }
}

fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        let output = if pixel[0] > threshold { 255 } else { 0 };
        *pixel = Luma([output]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_gradient(dir: &Path, width: u32, height: u32) -> PathBuf {
        let image = RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 200 / width.max(1)) as u8 + 20;
            Rgb([v, v, v])
        });
        let path = dir.join("receipt.png");
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn test_resize_dimensions() {
        // Image smaller than target
        assert_eq!(calculate_resize_dimensions(500, 300, 960), (500, 300));

        // Image larger than target
        let (w, h) = calculate_resize_dimensions(1920, 1080, 960);
        assert_eq!(w, 960);
        assert_eq!(h, 540);

        // Portrait receipt
        assert_eq!(calculate_resize_dimensions(1000, 4000, 1800), (450, 1800));
    }

    #[test]
    fn test_prepare_writes_binarized_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_gradient(dir.path(), 3000, 1000);

        let prepared = ImagePreprocessor::new().prepare(&input);
        assert!(matches!(prepared, PreparedImage::Processed(_)));

        let output_path = prepared.path().to_path_buf();
        let output = image::open(&output_path).unwrap().to_luma8();
        assert_eq!(output.dimensions(), (1800, 600));
        assert!(output.pixels().all(|p| p[0] == 0 || p[0] == 255));

        drop(prepared);
        assert!(!output_path.exists());
        assert!(input.exists());
    }

    #[test]
    fn test_prepare_degrades_on_unreadable_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");

        let prepared = ImagePreprocessor::new().prepare(&missing);

        assert!(prepared.is_degraded());
        assert_eq!(prepared.path(), missing.as_path());
    }

    #[test]
    fn test_disabled_passes_original_through() {
        let config = PreprocessConfig {
            enabled: false,
            ..Default::default()
        };
        let path = Path::new("receipt.jpg");

        let prepared = ImagePreprocessor::new().with_config(config).prepare(path);
        assert!(matches!(prepared, PreparedImage::Unchanged(_)));
        assert_eq!(prepared.path(), path);
    }

    #[test]
    fn test_normalize_contrast_stretches_range() {
        let mut image = GrayImage::from_fn(4, 1, |x, _| Luma([100 + x as u8 * 10]));
        normalize_contrast(&mut image);

        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(3, 0)[0], 255);
    }
}
