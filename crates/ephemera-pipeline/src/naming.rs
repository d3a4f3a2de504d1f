// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Names and content types for derived artifacts.
//
//   report.pdf  --merge-->     report_merged.pdf
//   report.pdf  --split-->     report_split_1.pdf, report_split_2.pdf, ...
//   report.pdf  --convert-->   report.txt
//   report.pdf  --encrypt-->   report_protected.pdf.age
//   x.pdf.age   --decrypt-->   x.pdf

use ephemera_core::types::DocumentType;

const AGE_EXTENSION: &str = ".age";

/// File name without its last extension. Leading-dot names keep the dot.
pub fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// `<stem><suffix>.<ext>` with `ext` taken from the output type.
pub fn with_suffix(name: &str, suffix: &str, output: DocumentType) -> String {
    format!("{}{suffix}.{}", stem(name), output.extension())
}

/// Name of the `ordinal`-th (1-based) split output.
pub fn split_part(name: &str, ordinal: usize) -> String {
    format!("{}_split_{ordinal}.{}", stem(name), DocumentType::Pdf.extension())
}

/// Same stem, new extension.
pub fn converted(name: &str, output: DocumentType) -> String {
    format!("{}.{}", stem(name), output.extension())
}

/// `<stem>_protected.<ext>.age`, keeping the inner type recoverable.
pub fn encrypted(name: &str, input: DocumentType) -> String {
    format!(
        "{}_protected.{}{AGE_EXTENSION}",
        stem(name),
        input.extension()
    )
}

/// Strip a trailing `.age` and infer the inner type, from the remaining
/// extension or, failing that, from the payload's magic bytes.
pub fn decrypted(name: &str, plaintext: &[u8]) -> (String, Option<DocumentType>) {
    let inner = name.strip_suffix(AGE_EXTENSION).unwrap_or(name);
    let inner = if inner.is_empty() { "document" } else { inner };

    let from_name = inner
        .rsplit_once('.')
        .and_then(|(_, ext)| DocumentType::from_extension(ext))
        .filter(|t| *t != DocumentType::AgeEncrypted);

    (inner.to_string(), from_name.or_else(|| sniff(plaintext)))
}

fn sniff(bytes: &[u8]) -> Option<DocumentType> {
    if bytes.starts_with(b"%PDF-") {
        Some(DocumentType::Pdf)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(DocumentType::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(DocumentType::Jpeg)
    } else {
        None
    }
}
