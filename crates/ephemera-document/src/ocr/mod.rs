// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optical character recognition.
//
// The neural engine lives behind the `ocr` feature gate. Without it,
// `UnavailableOcr` answers every request with `NotImplemented`.

#[cfg(feature = "ocr")]
pub mod engine;

use std::sync::Arc;

use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::OcrText;
use ephemera_core::traits::OcrBackend;

#[cfg(feature = "ocr")]
pub use engine::{OcrConfig, OcrEngine};

/// The only language the bundled recognition model reads.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Map a requested language onto the model's language code.
///
/// `None`, `en` and `eng` (any case) select English; anything else is
/// `UnsupportedFormat`.
pub fn normalize_language(language: Option<&str>) -> Result<&'static str> {
    match language.map(str::trim) {
        None => Ok(DEFAULT_LANGUAGE),
        Some(code) if code.eq_ignore_ascii_case("en") || code.eq_ignore_ascii_case("eng") => {
            Ok(DEFAULT_LANGUAGE)
        }
        Some(code) => Err(EphemeraError::UnsupportedFormat(format!(
            "OCR language '{code}' is not supported (only 'eng')"
        ))),
    }
}

/// Backend used when the crate is built without the `ocr` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOcr;

impl OcrBackend for UnavailableOcr {
    fn recognize(&self, _image: &[u8], language: Option<&str>) -> Result<OcrText> {
        normalize_language(language)?;
        Err(EphemeraError::NotImplemented(
            "OCR support was not compiled in (enable the `ocr` feature)".into(),
        ))
    }
}

/// The backend this build offers: the neural engine with models from the
/// default directory when the `ocr` feature is on, [`UnavailableOcr`]
/// otherwise.
pub fn default_backend() -> Result<Arc<dyn OcrBackend>> {
    #[cfg(feature = "ocr")]
    {
        Ok(Arc::new(OcrEngine::with_defaults()?))
    }
    #[cfg(not(feature = "ocr"))]
    {
        Ok(Arc::new(UnavailableOcr))
    }
}
