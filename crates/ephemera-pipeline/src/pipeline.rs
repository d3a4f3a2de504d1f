// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transformation pipeline.
//
// `apply` validates the request, resolves the inputs, runs the engine and
// stores the outputs, all inside one `spawn_blocking` task bounded by the
// transform timeout. Store, engine and cipher are synchronous.
//
// A blocking task cannot be cancelled. When the deadline passes while it is
// still running, the caller gets `Timeout` at once and a reaper waits for the
// task and deletes whatever it stored. The task itself also checks the
// deadline before and after persisting, so late work is rarely written at all.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::{OcrText, Operation, ProtectAction};
use ephemera_core::traits::{DocumentEngine, OcrBackend};
use ephemera_core::types::{Artifact, ArtifactId, DocumentType};
use ephemera_security::PassphraseCipher;
use ephemera_store::ArtifactStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::naming;

/// Result of [`Pipeline::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    /// New artifacts, in output order. Exactly one for every operation except
    /// split, which yields one per range.
    pub artifacts: Vec<Artifact>,
    /// Form fields that were requested but not filled (best-effort fills).
    pub skipped_fields: Vec<String>,
}

impl TransformOutcome {
    /// The first (for most operations, the only) output.
    pub fn primary(&self) -> Option<&Artifact> {
        self.artifacts.first()
    }
}

/// Result of [`Pipeline::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub artifact: Artifact,
    /// Page count, for PDFs.
    pub page_count: Option<u32>,
}

/// Bytes produced by the engine, not yet stored.
struct Output {
    bytes: Vec<u8>,
    name: String,
    content_type: DocumentType,
}

pub struct Pipeline {
    store: Arc<ArtifactStore>,
    engine: Arc<dyn DocumentEngine>,
    ocr: Arc<dyn OcrBackend>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<ArtifactStore>,
        engine: Arc<dyn DocumentEngine>,
        ocr: Arc<dyn OcrBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            ocr,
            timeout,
        }
    }

    /// Build with the configured transform timeout.
    pub fn from_config(
        store: Arc<ArtifactStore>,
        engine: Arc<dyn DocumentEngine>,
        ocr: Arc<dyn OcrBackend>,
        config: &EphemeraConfig,
    ) -> Self {
        Self::new(store, engine, ocr, config.transform_timeout())
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The conversions `apply(Operation::Convert { .. })` accepts.
    pub fn supported_conversions(&self) -> Vec<(DocumentType, ephemera_core::ops::TargetFormat)> {
        self.engine.supported_conversions()
    }

    /// Apply `operation` to `inputs` and store the result.
    #[instrument(skip(self, operation), fields(op = operation.name(), input_count = inputs.len()))]
    pub async fn apply(
        &self,
        operation: Operation,
        inputs: &[ArtifactId],
    ) -> Result<TransformOutcome> {
        operation.validate(inputs.len())?;

        let job = Job {
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            operation,
            inputs: inputs.to_vec(),
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
        };
        let mut handle = tokio::task::spawn_blocking(move || job.run());

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => {
                let outcome = joined.map_err(|err| {
                    EphemeraError::TransformFailed(format!("transformation task failed: {err}"))
                })??;
                info!(
                    outputs = outcome.artifacts.len(),
                    skipped_fields = outcome.skipped_fields.len(),
                    "Transformation complete"
                );
                Ok(outcome)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Transformation timed out");
                tokio::spawn(reap_late_outputs(handle, Arc::clone(&self.store)));
                Err(EphemeraError::Timeout(self.timeout))
            }
        }
    }

    /// Recognise text in an image artifact. Produces no artifact.
    #[instrument(skip(self))]
    pub async fn ocr(&self, id: ArtifactId, language: Option<&str>) -> Result<OcrText> {
        let artifact = self.store.get(id)?;
        if !artifact.content_type.is_image() {
            return Err(EphemeraError::UnsupportedFormat(format!(
                "OCR needs a PNG or JPEG image, got {}",
                artifact.content_type
            )));
        }

        let store = Arc::clone(&self.store);
        let backend = Arc::clone(&self.ocr);
        let language = language.map(str::to_string);
        let task = tokio::task::spawn_blocking(move || {
            let image = store.read_payload(id)?;
            backend.recognize(&image, language.as_deref())
        });

        let text = self.bounded(task).await?;
        debug!(chars = text.text.len(), "OCR text returned");
        Ok(text)
    }

    /// Metadata plus the page count for PDFs.
    #[instrument(skip(self))]
    pub async fn inspect(&self, id: ArtifactId) -> Result<Inspection> {
        let artifact = self.store.get(id)?;
        if artifact.content_type != DocumentType::Pdf {
            return Ok(Inspection {
                artifact,
                page_count: None,
            });
        }

        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || {
            let pdf = store.read_payload(id)?;
            engine.page_count(&pdf)
        });
        let page_count = self.bounded(task).await?;

        Ok(Inspection {
            artifact,
            page_count: Some(page_count),
        })
    }

    /// Await a blocking task that stores nothing, under the timeout.
    async fn bounded<T>(&self, task: JoinHandle<Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined.map_err(|err| {
                EphemeraError::TransformFailed(format!("processing task failed: {err}"))
            })?,
            Err(_) => Err(EphemeraError::Timeout(self.timeout)),
        }
    }
}

/// Delete the outputs of a transformation whose caller already got `Timeout`.
async fn reap_late_outputs(handle: JoinHandle<Result<TransformOutcome>>, store: Arc<ArtifactStore>) {
    let Ok(Ok(outcome)) = handle.await else {
        return;
    };
    let ids: Vec<ArtifactId> = outcome.artifacts.iter().map(|a| a.id).collect();
    let cleanup = tokio::task::spawn_blocking(move || discard(&store, &ids)).await;
    if let Err(err) = cleanup {
        warn!(%err, "Cleanup of timed-out outputs failed");
    }
}

/// Best-effort delete of artifacts that must not outlive a failed operation.
fn discard(store: &ArtifactStore, ids: &[ArtifactId]) {
    for id in ids {
        match store.delete(*id) {
            Ok(_) => info!(artifact_id = %id, "Discarded output of failed transformation"),
            Err(err) => warn!(artifact_id = %id, %err, "Could not discard output"),
        }
    }
}

/// Everything one `apply` needs on the blocking pool.
struct Job {
    store: Arc<ArtifactStore>,
    engine: Arc<dyn DocumentEngine>,
    operation: Operation,
    inputs: Vec<ArtifactId>,
    deadline: Instant,
    timeout: Duration,
}

impl Job {
    fn run(self) -> Result<TransformOutcome> {
        let artifacts = self
            .inputs
            .iter()
            .map(|id| self.store.get(*id))
            .collect::<Result<Vec<_>>>()?;
        self.check_input_types(&artifacts)?;

        let payloads = artifacts
            .iter()
            .map(|a| self.store.read_payload(a.id))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            bytes = payloads.iter().map(Vec::len).sum::<usize>(),
            "Inputs loaded"
        );
        self.check_deadline()?;

        let (outputs, skipped_fields) = self.transform(&artifacts, &payloads)?;
        self.check_deadline()?;

        let stored = self.persist(outputs)?;
        if Instant::now() > self.deadline {
            let ids: Vec<ArtifactId> = stored.iter().map(|a| a.id).collect();
            discard(&self.store, &ids);
            return Err(EphemeraError::Timeout(self.timeout));
        }

        Ok(TransformOutcome {
            artifacts: stored,
            skipped_fields,
        })
    }

    fn check_deadline(&self) -> Result<()> {
        if Instant::now() > self.deadline {
            Err(EphemeraError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }

    /// Type checks that need metadata only, so they run before any payload
    /// is read.
    fn check_input_types(&self, artifacts: &[Artifact]) -> Result<()> {
        if self.operation.requires_pdf()
            && let Some(other) = artifacts
                .iter()
                .find(|a| a.content_type != DocumentType::Pdf)
        {
            return Err(EphemeraError::UnsupportedFormat(format!(
                "{} needs PDF input, got {}",
                self.operation.name(),
                other.content_type
            )));
        }

        match &self.operation {
            Operation::Convert { target } => {
                let from = artifacts[0].content_type;
                if !self.engine.supported_conversions().contains(&(from, *target)) {
                    return Err(EphemeraError::UnsupportedFormat(format!(
                        "conversion from {from} to {} is not supported",
                        target.document_type()
                    )));
                }
            }
            Operation::Protect {
                action: ProtectAction::Decrypt,
                ..
            } => match artifacts[0].content_type {
                DocumentType::AgeEncrypted => {}
                DocumentType::Pdf => {
                    return Err(EphemeraError::NotImplemented(
                        "removing native PDF password protection is not implemented".into(),
                    ));
                }
                other => {
                    return Err(EphemeraError::UnsupportedFormat(format!(
                        "decrypt needs an age-encrypted artifact, got {other}"
                    )));
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn transform(
        &self,
        artifacts: &[Artifact],
        payloads: &[Vec<u8>],
    ) -> Result<(Vec<Output>, Vec<String>)> {
        let first = &artifacts[0];
        let pdf = |bytes: Vec<u8>, suffix: &str| Output {
            bytes,
            name: naming::with_suffix(&first.original_name, suffix, DocumentType::Pdf),
            content_type: DocumentType::Pdf,
        };
        let suffix = self.operation.name_suffix().unwrap_or_default();

        let outputs = match &self.operation {
            Operation::Merge { order } => {
                let order: Vec<usize> = order.clone().unwrap_or_else(|| (0..payloads.len()).collect());
                let documents: Vec<&[u8]> = order.iter().map(|&i| payloads[i].as_slice()).collect();
                let merged = self.engine.merge(&documents)?;
                let lead = &artifacts[order[0]];
                vec![Output {
                    bytes: merged,
                    name: naming::with_suffix(&lead.original_name, suffix, DocumentType::Pdf),
                    content_type: DocumentType::Pdf,
                }]
            }
            Operation::Split { ranges } => self
                .engine
                .split(&payloads[0], ranges)?
                .into_iter()
                .enumerate()
                .map(|(i, bytes)| Output {
                    bytes,
                    name: naming::split_part(&first.original_name, i + 1),
                    content_type: DocumentType::Pdf,
                })
                .collect(),
            Operation::Compress { quality } => {
                vec![pdf(self.engine.compress(&payloads[0], *quality)?, suffix)]
            }
            Operation::Convert { target } => {
                let output_type = target.document_type();
                vec![Output {
                    bytes: self
                        .engine
                        .convert(&payloads[0], first.content_type, *target)?,
                    name: naming::converted(&first.original_name, output_type),
                    content_type: output_type,
                }]
            }
            Operation::Sign { stamp } => vec![pdf(self.engine.sign(&payloads[0], stamp)?, suffix)],
            Operation::Redact { regions } => {
                vec![pdf(self.engine.redact(&payloads[0], regions)?, suffix)]
            }
            Operation::FillForm(form) => {
                let filled = self.engine.fill_form(&payloads[0], form)?;
                return Ok((vec![pdf(filled.bytes, suffix)], filled.skipped));
            }
            Operation::Protect { action, password } => {
                let cipher = PassphraseCipher::new(password)?;
                match action {
                    ProtectAction::Encrypt => vec![Output {
                        bytes: cipher.encrypt(&payloads[0])?,
                        name: naming::encrypted(&first.original_name, first.content_type),
                        content_type: DocumentType::AgeEncrypted,
                    }],
                    ProtectAction::Decrypt => {
                        let plaintext = cipher.decrypt(&payloads[0])?;
                        let (name, content_type) =
                            naming::decrypted(&first.original_name, &plaintext);
                        let content_type = content_type.ok_or_else(|| {
                            EphemeraError::UnsupportedFormat(
                                "cannot tell the content type of the decrypted payload".into(),
                            )
                        })?;
                        vec![Output {
                            bytes: plaintext,
                            name,
                            content_type,
                        }]
                    }
                }
            }
        };
        Ok((outputs, Vec::new()))
    }

    /// Store every output, or none: a failure deletes what was already
    /// stored.
    fn persist(&self, outputs: Vec<Output>) -> Result<Vec<Artifact>> {
        let mut stored: Vec<Artifact> = Vec::with_capacity(outputs.len());
        for output in outputs {
            match self
                .store
                .create(&output.bytes, &output.name, output.content_type)
            {
                Ok(artifact) => stored.push(artifact),
                Err(err) => {
                    let ids: Vec<ArtifactId> = stored.iter().map(|a| a.id).collect();
                    discard(&self.store, &ids);
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }
}
