// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format conversion.
//
// The set of conversions is fixed and enumerable; anything outside it is an
// `UnsupportedFormat` error, never a pass-through.

use ephemera_core::PaperSize;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::TargetFormat;
use ephemera_core::types::DocumentType;
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::{PdfReader, PdfWriter};

/// JPEG quality used when converting PNG to JPEG.
const JPEG_QUALITY: u8 = 90;

/// Every (source, target) pair [`DocumentConverter::convert`] accepts.
pub const SUPPORTED_CONVERSIONS: [(DocumentType, TargetFormat); 6] = [
    (DocumentType::Pdf, TargetFormat::Text),
    (DocumentType::PlainText, TargetFormat::Pdf),
    (DocumentType::Png, TargetFormat::Pdf),
    (DocumentType::Jpeg, TargetFormat::Pdf),
    (DocumentType::Png, TargetFormat::Jpeg),
    (DocumentType::Jpeg, TargetFormat::Png),
];

/// Converts payloads between the supported formats.
pub struct DocumentConverter {
    paper_size: PaperSize,
}

impl DocumentConverter {
    /// `paper_size` is used when rendering text or images to PDF.
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    pub fn is_supported(from: DocumentType, to: TargetFormat) -> bool {
        SUPPORTED_CONVERSIONS.contains(&(from, to))
    }

    #[instrument(skip(self, input), fields(input_bytes = input.len(), from = %from, to = %to))]
    pub fn convert(&self, input: &[u8], from: DocumentType, to: TargetFormat) -> Result<Vec<u8>> {
        if !Self::is_supported(from, to) {
            return Err(EphemeraError::UnsupportedFormat(format!(
                "conversion from {} to {} is not supported",
                from.mime_type(),
                to.document_type().mime_type()
            )));
        }

        let output = match (from, to) {
            (DocumentType::Pdf, TargetFormat::Text) => extract_text(input)?.into_bytes(),
            (DocumentType::PlainText, TargetFormat::Pdf) => {
                let text = String::from_utf8_lossy(input);
                PdfWriter::new(self.paper_size).create_from_text(&text)?
            }
            (DocumentType::Png | DocumentType::Jpeg, TargetFormat::Pdf) => {
                PdfWriter::new(self.paper_size).create_from_image(input)?
            }
            (_, TargetFormat::Jpeg) => ImageProcessor::from_bytes(input)?.to_jpeg_bytes(JPEG_QUALITY)?,
            (_, TargetFormat::Png) => ImageProcessor::from_bytes(input)?.to_png_bytes()?,
            _ => {
                return Err(EphemeraError::UnsupportedFormat(format!(
                    "conversion from {} to {} is not supported",
                    from.mime_type(),
                    to.document_type().mime_type()
                )));
            }
        };

        info!(output_bytes = output.len(), "Conversion complete");
        Ok(output)
    }
}

/// Plain text of every page, pages separated by a blank line.
///
/// Pages whose text cannot be extracted (unusual font encodings, image-only
/// pages) contribute nothing instead of failing the whole document.
fn extract_text(pdf: &[u8]) -> Result<String> {
    let reader = PdfReader::from_bytes(pdf)?;
    let document = reader.document();

    let mut pages = Vec::new();
    for number in document.get_pages().into_keys() {
        match document.extract_text(&[number]) {
            Ok(text) => pages.push(text.trim_end().to_string()),
            Err(err) => {
                warn!(page = number - 1, %err, "No extractable text on page");
                pages.push(String::new());
            }
        }
    }

    debug!(pages = pages.len(), "Text extracted");
    Ok(pages.join("\n\n"))
}
