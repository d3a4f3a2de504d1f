// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ephemera-document — byte-level document processing for Ephemera.
//
// PDF page operations (merge, split, compress, redact, sign, form fill) over
// lopdf, text and image rendering through printpdf, raster re-encoding via
// image, and OCR through ocrs behind the `ocr` feature. Everything here takes
// bytes and returns new bytes; storage is the caller's business.

pub mod convert;
pub mod engine;
pub mod image;
pub mod ocr;
pub mod pdf;

#[cfg(test)]
mod test_support;

pub use convert::{DocumentConverter, SUPPORTED_CONVERSIONS};
pub use engine::DocumentProcessor;
pub use image::ImageProcessor;
pub use ocr::UnavailableOcr;
pub use pdf::{PdfReader, PdfWriter};

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;
