// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neural OCR backed by the `ocrs` crate, with models executed via `rten`.
//
// The engine needs two model files:
//
// - `text-detection.rten` locates text regions in the image.
// - `text-recognition.rten` decodes characters from detected regions.
//
// Running `ocrs-cli` once downloads both into the default cache directory,
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`). `EPHEMERA_OCR_MODELS`
// points at a different directory.
//
// `ocrs` and `rten` must be built in release mode; debug builds are 10-100x
// slower.

use std::path::{Path, PathBuf};

use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::OcrText;
use ephemera_core::traits::OcrBackend;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use super::normalize_language;
use crate::image::ImageProcessor;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Environment variable naming the model directory.
pub const ENV_OCR_MODELS: &str = "EPHEMERA_OCR_MODELS";

fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_OCR_MODELS) {
        PathBuf::from(dir)
    } else if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where the two model files live.
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
    /// Expects `dir` to contain `text-detection.rten` and
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Both model files must exist.
    pub fn validate(&self) -> Result<()> {
        for (what, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(EphemeraError::OcrFailed(format!(
                    "{what} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Text recognition over PNG/JPEG payloads.
///
/// Model loading is the expensive step: build one engine and share it.
pub struct OcrEngine {
    engine: OcrsEngine,
}

impl OcrEngine {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            EphemeraError::OcrFailed(format!("failed to load detection model: {err}"))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model =
            Model::load_file(&config.recognition_model_path).map_err(|err| {
                EphemeraError::OcrFailed(format!("failed to load recognition model: {err}"))
            })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| EphemeraError::OcrFailed(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    /// Load models from the default directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }
}

impl OcrBackend for OcrEngine {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    fn recognize(&self, image: &[u8], language: Option<&str>) -> Result<OcrText> {
        let language = normalize_language(language)?;
        if image.starts_with(b"%PDF") {
            return Err(EphemeraError::UnsupportedFormat(
                "OCR accepts PNG or JPEG images, not PDF".into(),
            ));
        }

        let decoded = ImageProcessor::from_bytes(image)
            .map_err(|err| EphemeraError::OcrFailed(format!("cannot decode image: {err}")))?;
        let rgb = decoded.as_dynamic().to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            EphemeraError::OcrFailed(format!("failed to create image source ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| EphemeraError::OcrFailed(format!("OCR preprocessing failed: {err}")))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| EphemeraError::OcrFailed(format!("OCR recognition failed: {err}")))?;

        debug!(lines = text.lines().count(), chars = text.len(), "OCR complete");
        Ok(OcrText {
            text,
            language: language.to_string(),
        })
    }
}
