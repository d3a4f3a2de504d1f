// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF operations — page copying (merge/split), size reduction, overlays
// (redact/sign), AcroForm filling, and rendering new PDFs from text or images.

pub mod annotate;
pub mod compress;
pub mod forms;
pub mod reader;
pub mod writer;

pub use reader::PdfReader;
pub use writer::PdfWriter;
