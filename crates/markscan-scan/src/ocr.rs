// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR text extractor for the identifier box, backed by `ocrs` with models
// executed via `rten`. Only compiled with the `ocr` feature.
//
// The engine needs `text-detection.rten` and `text-recognition.rten`. By
// default they are looked up in `$XDG_CACHE_HOME/ocrs` (usually
// `~/.cache/ocrs`), which is where `ocrs-cli` downloads them.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use markscan_core::error::{MarkscanError, Result};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::identifier::TextExtractor;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the OCR models.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `dir` to hold both model files under their standard names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(MarkscanError::TextExtraction(format!(
                    "OCR model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Reads student codes with the `ocrs` engine.
///
/// Model loading is the expensive step; build one extractor per process and
/// reuse it for every sheet.
pub struct OcrTextExtractor {
    engine: OcrEngine,
}

impl OcrTextExtractor {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        config.validate()?;

        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                MarkscanError::TextExtraction(format!(
                    "failed to load model from {}: {err}",
                    path.display()
                ))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| MarkscanError::TextExtraction(format!("failed to initialise OCR: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(&OcrConfig::default())
    }
}

impl TextExtractor for OcrTextExtractor {
    fn extract_text(&self, region: &GrayImage) -> Result<String> {
        let rgb = DynamicImage::ImageLuma8(region.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            MarkscanError::TextExtraction(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| MarkscanError::TextExtraction(format!("preprocessing failed: {err}")))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| MarkscanError::TextExtraction(format!("recognition failed: {err}")))?;

        debug!(chars = text.len(), "OCR complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
        assert_eq!(
            config.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
    }

    #[test]
    fn missing_models_are_a_text_extraction_error() {
        let config = OcrConfig::from_dir("/nonexistent/path/ocr-models");
        assert!(matches!(
            OcrTextExtractor::new(&config),
            Err(MarkscanError::TextExtraction(_))
        ));
    }
}
