// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator seams.
//
// The pipeline never touches document bytes itself. It hands them to a
// `DocumentEngine` (and an `OcrBackend` for text recognition) so the byte-level
// libraries can be swapped or stubbed in tests.

use crate::error::Result;
use crate::ops::{
    FilledForm, FormFill, OcrText, PageRange, Quality, RedactRegion, SignatureStamp, TargetFormat,
};
use crate::types::DocumentType;

/// Byte-level document processing.
///
/// Every method takes raw bytes and returns new bytes; inputs are never
/// modified. Page indices are 0-based. Implementations report bad page
/// indices or field names as `Validation`, inputs they cannot parse as
/// `TransformFailed`, and conversions they do not offer as
/// `UnsupportedFormat`.
pub trait DocumentEngine: Send + Sync {
    /// Number of pages in a PDF.
    fn page_count(&self, pdf: &[u8]) -> Result<u32>;

    /// Concatenate all pages of every document, in slice order.
    fn merge(&self, documents: &[&[u8]]) -> Result<Vec<u8>>;

    /// One output document per range, in range order.
    fn split(&self, pdf: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>>;

    /// Output is never larger than the input.
    fn compress(&self, pdf: &[u8], quality: Quality) -> Result<Vec<u8>>;

    fn convert(&self, input: &[u8], from: DocumentType, to: TargetFormat) -> Result<Vec<u8>>;

    /// The fixed set of (source, target) pairs `convert` accepts.
    fn supported_conversions(&self) -> Vec<(DocumentType, TargetFormat)>;

    fn redact(&self, pdf: &[u8], regions: &[RedactRegion]) -> Result<Vec<u8>>;

    fn sign(&self, pdf: &[u8], stamp: &SignatureStamp) -> Result<Vec<u8>>;

    /// Fill AcroForm text fields. Unknown names are handled per
    /// [`FormFill::policy`](crate::ops::FormFill).
    fn fill_form(&self, pdf: &[u8], form: &FormFill) -> Result<FilledForm>;
}

/// Optical character recognition.
pub trait OcrBackend: Send + Sync {
    /// Recognise text in a PNG or JPEG image. `language` is an ISO 639 code;
    /// `None` selects the backend's default.
    fn recognize(&self, image: &[u8], language: Option<&str>) -> Result<OcrText>;
}
