// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retrieval gateway — upload ingestion with the content-type allow-list, and
// downloads with a suggested file name.

use std::fmt::Write as _;
use std::io::Read;
use std::sync::Arc;

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::types::{Artifact, ArtifactId, DocumentType};
use tracing::{info, instrument, warn};

use crate::store::ArtifactStore;

/// What happens to an artifact after it has been served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServePolicy {
    /// Keep it; it may be fetched again (preview, then download).
    #[default]
    Retain,
    /// Delete it once its bytes are in hand.
    DeleteAfterServe,
}

impl ServePolicy {
    pub fn from_config(config: &EphemeraConfig) -> Self {
        if config.delete_after_serve {
            Self::DeleteAfterServe
        } else {
            Self::Retain
        }
    }
}

/// A resolved artifact, ready to hand to a client.
#[derive(Debug, Clone)]
pub struct Download {
    pub artifact: Artifact,
    pub bytes: Vec<u8>,
    pub content_type: DocumentType,
    pub suggested_filename: String,
}

impl Download {
    /// `Content-Disposition` value for this download.
    pub fn content_disposition(&self) -> String {
        content_disposition(&self.suggested_filename)
    }
}

pub struct RetrievalGateway {
    store: Arc<ArtifactStore>,
    policy: ServePolicy,
}

impl RetrievalGateway {
    pub fn new(store: Arc<ArtifactStore>, policy: ServePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn policy(&self) -> ServePolicy {
        self.policy
    }

    /// Accept an upload. `content_type` is a MIME string checked against the
    /// upload allow-list; `image/jpg` is accepted as `image/jpeg`.
    #[instrument(skip(self, reader))]
    pub fn ingest(
        &self,
        reader: impl Read,
        original_name: &str,
        content_type: &str,
    ) -> Result<Artifact> {
        let document_type = DocumentType::from_mime(content_type)
            .filter(DocumentType::is_ingestible)
            .ok_or_else(|| {
                EphemeraError::UnsupportedFormat(format!(
                    "content type '{content_type}' is not accepted for upload"
                ))
            })?;
        self.store
            .create_from_reader(reader, original_name, document_type)
    }

    /// Bytes, content type and file name for `id`. Fails with `NotFound`
    /// exactly when [`ArtifactStore::read_payload`] would.
    #[instrument(skip(self))]
    pub fn resolve(&self, id: ArtifactId) -> Result<Download> {
        let (artifact, bytes) = self.store.read_artifact(id)?;

        if self.policy == ServePolicy::DeleteAfterServe {
            match self.store.delete(id) {
                Ok(_) => info!(artifact_id = %id, "Deleted after serve"),
                Err(err) => warn!(artifact_id = %id, %err, "Delete after serve failed"),
            }
        }

        Ok(Download {
            content_type: artifact.content_type,
            suggested_filename: artifact.original_name.clone(),
            artifact,
            bytes,
        })
    }
}

/// RFC 6266 `attachment` disposition with an RFC 5987 UTF-8 file name.
pub fn content_disposition(filename: &str) -> String {
    let mut value = String::from("attachment; filename*=UTF-8''");
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            value.push(byte as char);
        } else {
            // Writing to a String cannot fail.
            let _ = write!(value, "%{byte:02X}");
        }
    }
    value
}
