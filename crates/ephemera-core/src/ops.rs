// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transformation operations and their parameters.
//
// Page numbers are 0-based everywhere in this module. Ranges are inclusive on
// both ends.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EphemeraError, Result};
use crate::types::DocumentType;

/// Inclusive, 0-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Check the range is well-formed and, when the document size is known,
    /// that it lies inside a document of `page_count` pages.
    pub fn validate(&self, page_count: Option<u32>) -> Result<()> {
        if self.start > self.end {
            return Err(EphemeraError::Validation(format!(
                "page range {}-{} starts after it ends",
                self.start, self.end
            )));
        }
        if let Some(count) = page_count
            && self.end >= count
        {
            return Err(EphemeraError::Validation(format!(
                "page range {}-{} is outside a {count}-page document (pages are 0-based)",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

impl FromStr for PageRange {
    type Err = EphemeraError;

    /// Accepts `"3"` or `"0-4"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim().parse::<u32>().map_err(|_| {
                EphemeraError::Validation(format!("invalid page number '{}'", part.trim()))
            })
        };
        match s.split_once('-') {
            Some((start, end)) => Ok(Self::new(parse(start)?, parse(end)?)),
            None => {
                let page = parse(s)?;
                Ok(Self::new(page, page))
            }
        }
    }
}

/// Compression tier. `High` keeps the most quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

impl FromStr for Quality {
    type Err = EphemeraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(EphemeraError::Validation(format!(
                "unknown quality '{other}' (expected high, medium or low)"
            ))),
        }
    }
}

/// Output format requested from `convert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Text,
    Png,
    Jpeg,
    Docx,
}

impl TargetFormat {
    pub fn document_type(&self) -> DocumentType {
        match self {
            Self::Pdf => DocumentType::Pdf,
            Self::Text => DocumentType::PlainText,
            Self::Png => DocumentType::Png,
            Self::Jpeg => DocumentType::Jpeg,
            Self::Docx => DocumentType::Docx,
        }
    }
}

impl FromStr for TargetFormat {
    type Err = EphemeraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" | "pdf-to-text" => Ok(Self::Text),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "docx" | "word" | "pdf-to-word" => Ok(Self::Docx),
            other => Err(EphemeraError::UnsupportedFormat(format!(
                "unknown conversion target '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.document_type().extension())
    }
}

/// Opaque black box painted over part of a page. Coordinates are PDF points
/// from the bottom-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactRegion {
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A signature image placed on one page.
#[derive(Clone, PartialEq)]
pub struct SignatureStamp {
    pub page: u32,
    pub x: f32,
    pub y: f32,
    /// Multiplier applied to the image's pixel size (1 px = 1 pt at 1.0).
    pub scale: f32,
    /// PNG or JPEG bytes.
    pub image: Vec<u8>,
}

impl std::fmt::Debug for SignatureStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureStamp")
            .field("page", &self.page)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("scale", &self.scale)
            .field("image_bytes", &self.image.len())
            .finish()
    }
}

/// What to do with form fields that do not exist in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Fill what exists and report the rest as skipped.
    #[default]
    BestEffort,
    /// Refuse the whole fill if any field is unknown.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormFill {
    /// Field name to value.
    pub values: BTreeMap<String, String>,
    pub policy: FieldPolicy,
}

/// Result of a form fill, including fields that were not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledForm {
    pub bytes: Vec<u8>,
    pub filled: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectAction {
    Encrypt,
    Decrypt,
}

impl FromStr for ProtectAction {
    type Err = EphemeraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "encrypt" | "protect" => Ok(Self::Encrypt),
            "decrypt" | "unprotect" => Ok(Self::Decrypt),
            other => Err(EphemeraError::Validation(format!(
                "unknown protect action '{other}'"
            ))),
        }
    }
}

/// Passphrase that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Text recognised by OCR. Not stored as an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrText {
    pub text: String,
    pub language: String,
}

/// How many inputs an operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

/// A transformation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge {
        /// Permutation of the input indices. `None` keeps input order.
        order: Option<Vec<usize>>,
    },
    Split {
        ranges: Vec<PageRange>,
    },
    Compress {
        quality: Quality,
    },
    Convert {
        target: TargetFormat,
    },
    Sign {
        stamp: SignatureStamp,
    },
    Redact {
        regions: Vec<RedactRegion>,
    },
    FillForm(FormFill),
    Protect {
        action: ProtectAction,
        password: Password,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge { .. } => "merge",
            Self::Split { .. } => "split",
            Self::Compress { .. } => "compress",
            Self::Convert { .. } => "convert",
            Self::Sign { .. } => "sign",
            Self::Redact { .. } => "redact",
            Self::FillForm(_) => "fill_form",
            Self::Protect { .. } => "protect",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Merge { .. } => Arity::AtLeast(2),
            _ => Arity::Exactly(1),
        }
    }

    /// Suffix appended to the input's file stem for derived names.
    /// `None` for operations that rename differently (convert, split, decrypt).
    pub fn name_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Merge { .. } => Some("_merged"),
            Self::Compress { .. } => Some("_compressed"),
            Self::Sign { .. } => Some("_signed"),
            Self::Redact { .. } => Some("_redacted"),
            Self::FillForm(_) => Some("_filled"),
            Self::Protect {
                action: ProtectAction::Encrypt,
                ..
            } => Some("_protected"),
            Self::Split { .. } | Self::Convert { .. } | Self::Protect { .. } => None,
        }
    }

    /// Whether the operation only accepts PDF input.
    pub fn requires_pdf(&self) -> bool {
        matches!(
            self,
            Self::Merge { .. }
                | Self::Split { .. }
                | Self::Compress { .. }
                | Self::Sign { .. }
                | Self::Redact { .. }
                | Self::FillForm(_)
        )
    }

    /// Parameter checks that need nothing but the request itself.
    ///
    /// Checks that depend on the document (page bounds, field names) are the
    /// document engine's job.
    pub fn validate(&self, input_count: usize) -> Result<()> {
        match self.arity() {
            Arity::Exactly(n) if input_count != n => {
                return Err(EphemeraError::Validation(format!(
                    "{} takes exactly {n} input(s), got {input_count}",
                    self.name()
                )));
            }
            Arity::AtLeast(n) if input_count < n => {
                return Err(EphemeraError::Validation(format!(
                    "{} needs at least {n} inputs, got {input_count}",
                    self.name()
                )));
            }
            _ => {}
        }

        match self {
            Self::Merge { order: Some(order) } => validate_permutation(order, input_count),
            Self::Merge { order: None } | Self::Compress { .. } | Self::Convert { .. } => Ok(()),
            Self::Split { ranges } => {
                if ranges.is_empty() {
                    return Err(EphemeraError::Validation(
                        "split needs at least one page range".into(),
                    ));
                }
                ranges.iter().try_for_each(|r| r.validate(None))
            }
            Self::Sign { stamp } => {
                if stamp.image.is_empty() {
                    return Err(EphemeraError::Validation("signature image is empty".into()));
                }
                if !(stamp.scale.is_finite() && stamp.scale > 0.0) {
                    return Err(EphemeraError::Validation(
                        "signature scale must be a positive number".into(),
                    ));
                }
                check_coordinates(stamp.x, stamp.y)
            }
            Self::Redact { regions } => {
                if regions.is_empty() {
                    return Err(EphemeraError::Validation(
                        "redact needs at least one region".into(),
                    ));
                }
                regions.iter().try_for_each(|r| {
                    check_coordinates(r.x, r.y)?;
                    if r.width.is_finite() && r.height.is_finite() && r.width > 0.0 && r.height > 0.0
                    {
                        Ok(())
                    } else {
                        Err(EphemeraError::Validation(format!(
                            "redaction on page {} must have positive width and height",
                            r.page
                        )))
                    }
                })
            }
            Self::FillForm(form) => {
                if form.values.is_empty() {
                    return Err(EphemeraError::Validation("no form values given".into()));
                }
                Ok(())
            }
            Self::Protect { password, .. } => {
                if password.is_empty() {
                    return Err(EphemeraError::Validation("password must not be empty".into()));
                }
                Ok(())
            }
        }
    }
}

fn check_coordinates(x: f32, y: f32) -> Result<()> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(EphemeraError::Validation(
            "coordinates must be finite numbers".into(),
        ))
    }
}

fn validate_permutation(order: &[usize], input_count: usize) -> Result<()> {
    let mut seen = vec![false; input_count];
    if order.len() != input_count {
        return Err(EphemeraError::Validation(format!(
            "merge order has {} entries for {input_count} inputs",
            order.len()
        )));
    }
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(EphemeraError::Validation(format!(
                    "merge order is not a permutation of 0..{input_count}"
                )));
            }
        }
    }
    Ok(())
}
