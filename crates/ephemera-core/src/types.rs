// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Ephemera artifact store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EphemeraError;

/// Current on-disk metadata format.
pub const METADATA_FORMAT_VERSION: u32 = 1;

/// Opaque handle for a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = EphemeraError;

    /// A string that is not a well-formed id cannot name any artifact, so it
    /// is reported as `NotFound` rather than a validation failure.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| EphemeraError::not_found(s))
    }
}

/// Content types the store knows about.
///
/// Serialised as the MIME string so metadata records stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "application/vnd.openxmlformats-officedocument.wordprocessingml.document")]
    Docx,
    #[serde(rename = "application/vnd.openxmlformats-officedocument.presentationml.presentation")]
    Pptx,
    #[serde(rename = "image/jpeg", alias = "image/jpg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    PlainText,
    /// Passphrase-protected payload produced by `protect`.
    #[serde(rename = "application/age-encrypted")]
    AgeEncrypted,
}

impl DocumentType {
    pub const ALL: [DocumentType; 8] = [
        Self::Pdf,
        Self::Docx,
        Self::Pptx,
        Self::Jpeg,
        Self::Png,
        Self::Html,
        Self::PlainText,
        Self::AgeEncrypted,
    ];

    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Html => "text/html",
            Self::PlainText => "text/plain",
            Self::AgeEncrypted => "application/age-encrypted",
        }
    }

    /// Parse a MIME type, ignoring case and parameters (`; charset=...`).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence == "image/jpg" {
            return Some(Self::Jpeg);
        }
        Self::ALL.into_iter().find(|t| t.mime_type() == essence)
    }

    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "htm" | "html" => Some(Self::Html),
            "txt" => Some(Self::PlainText),
            "age" => Some(Self::AgeEncrypted),
            _ => None,
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Html => "html",
            Self::PlainText => "txt",
            Self::AgeEncrypted => "age",
        }
    }

    /// Whether clients may upload this type directly.
    pub fn is_ingestible(&self) -> bool {
        !matches!(self, Self::AgeEncrypted)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Metadata record for one stored artifact.
///
/// Written once at creation and never modified. The payload it describes is
/// immutable for the artifact's whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// On-disk schema version, see [`METADATA_FORMAT_VERSION`].
    pub format_version: u32,
    pub id: ArtifactId,
    pub original_name: String,
    pub size_bytes: u64,
    pub content_type: DocumentType,
    /// Drives retention. Non-decreasing in creation order within one store.
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the payload.
    pub sha256: String,
    /// Payload file name relative to the storage root. Owned by the store.
    pub storage_location: String,
}

impl Artifact {
    /// Age of this artifact relative to `now`. Negative ages clamp to zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// Standard paper sizes used when rendering text or images to PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}
