// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `DocumentEngine` implementation over lopdf, printpdf and image.

use ephemera_core::PaperSize;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::{
    FilledForm, FormFill, PageRange, Quality, RedactRegion, SignatureStamp, TargetFormat,
};
use ephemera_core::traits::DocumentEngine;
use ephemera_core::types::DocumentType;

use crate::convert::{DocumentConverter, SUPPORTED_CONVERSIONS};
use crate::pdf::{PdfReader, annotate, compress, forms};

/// The production document engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor {
    paper_size: PaperSize,
}

impl DocumentProcessor {
    /// `paper_size` applies to PDFs rendered from text or images.
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }
}

impl DocumentEngine for DocumentProcessor {
    fn page_count(&self, pdf: &[u8]) -> Result<u32> {
        Ok(PdfReader::from_bytes(pdf)?.page_count())
    }

    fn merge(&self, documents: &[&[u8]]) -> Result<Vec<u8>> {
        if documents.len() < 2 {
            return Err(EphemeraError::Validation(format!(
                "merge needs at least 2 documents, got {}",
                documents.len()
            )));
        }
        PdfReader::merge(documents)
    }

    fn split(&self, pdf: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>> {
        PdfReader::from_bytes(pdf)?.extract_ranges(ranges)
    }

    fn compress(&self, pdf: &[u8], quality: Quality) -> Result<Vec<u8>> {
        compress::compress(pdf, quality)
    }

    fn convert(&self, input: &[u8], from: DocumentType, to: TargetFormat) -> Result<Vec<u8>> {
        DocumentConverter::new(self.paper_size).convert(input, from, to)
    }

    fn supported_conversions(&self) -> Vec<(DocumentType, TargetFormat)> {
        SUPPORTED_CONVERSIONS.to_vec()
    }

    fn redact(&self, pdf: &[u8], regions: &[RedactRegion]) -> Result<Vec<u8>> {
        annotate::redact(pdf, regions)
    }

    fn sign(&self, pdf: &[u8], stamp: &SignatureStamp) -> Result<Vec<u8>> {
        annotate::sign(pdf, stamp)
    }

    fn fill_form(&self, pdf: &[u8], form: &FormFill) -> Result<FilledForm> {
        forms::fill(pdf, form)
    }
}
