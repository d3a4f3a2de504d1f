// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-facing error taxonomy.
//
// Every internal error collapses to a stable machine-readable kind plus a
// message that is safe to show to whoever asked: no filesystem paths, no
// library internals, no payload contents.

use serde::{Deserialize, Serialize};

use crate::error::EphemeraError;

/// Stable machine-readable error kinds.
///
/// The string form (see [`ErrorKind::as_str`]) is part of the external
/// contract and must not change once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    PayloadTooLarge,
    UnsupportedFormat,
    TransformFailed,
    StorageError,
    Timeout,
    NotImplemented,
    OcrFailed,
}

impl ErrorKind {
    /// Wire identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
            Self::PayloadTooLarge => "payload_too_large",
            Self::UnsupportedFormat => "unsupported_format",
            Self::TransformFailed => "transform_failed",
            Self::StorageError => "storage_error",
            Self::Timeout => "timeout",
            Self::NotImplemented => "not_implemented",
            Self::OcrFailed => "ocr_failed",
        }
    }

    /// HTTP status a transport layer should answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ValidationError => 400,
            Self::PayloadTooLarge => 413,
            Self::UnsupportedFormat => 415,
            Self::TransformFailed | Self::OcrFailed => 422,
            Self::StorageError => 500,
            Self::Timeout => 504,
            Self::NotImplemented => 501,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sanitised error ready to be serialised to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EphemeraError {
    /// Classify this error into its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::Decryption(_) => ErrorKind::ValidationError,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::TransformFailed(_) | Self::Encryption(_) => ErrorKind::TransformFailed,
            Self::StorageWrite(_)
            | Self::IntegrityMismatch { .. }
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::StorageError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::OcrFailed(_) => ErrorKind::OcrFailed,
        }
    }

    /// Build the client-facing form of this error.
    ///
    /// Request-shaped errors (validation, unsupported format, not implemented)
    /// echo their own detail because it was derived from the caller's input.
    /// Everything that originates below the API boundary gets a fixed message.
    pub fn public_error(&self) -> PublicError {
        let message = match self {
            Self::NotFound(id) => format!("artifact {id} not found"),
            Self::Validation(detail)
            | Self::UnsupportedFormat(detail)
            | Self::NotImplemented(detail) => detail.clone(),
            Self::PayloadTooLarge { limit, .. } => {
                format!("payload exceeds the maximum size of {limit} bytes")
            }
            Self::Decryption(_) => "could not decrypt: wrong password or damaged input".into(),
            Self::Timeout(after) => format!("operation timed out after {} ms", after.as_millis()),
            Self::TransformFailed(_) | Self::Encryption(_) => {
                "the document could not be processed".into()
            }
            Self::OcrFailed(_) => "text recognition failed for this document".into(),
            Self::StorageWrite(_)
            | Self::IntegrityMismatch { .. }
            | Self::Io(_)
            | Self::Serialization(_) => "internal storage error".into(),
        };

        PublicError {
            kind: self.kind(),
            message,
        }
    }
}
