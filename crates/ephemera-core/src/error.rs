// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ephemera.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all Ephemera operations.
///
/// Messages may carry internal detail (paths, library errors) for logs. Use
/// [`EphemeraError::public_error`] for anything shown to a client.
#[derive(Debug, Error)]
pub enum EphemeraError {
    // -- Store errors --
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Request errors --
    #[error("invalid parameters: {0}")]
    Validation(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    // -- Collaborator errors --
    #[error("document transformation failed: {0}")]
    TransformFailed(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EphemeraError {
    /// Shorthand for a `NotFound` naming an artifact id.
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Whether this error means the artifact (or its payload) is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EphemeraError>;
