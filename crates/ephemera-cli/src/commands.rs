// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers. Each one opens the store described by the effective
// configuration, runs a single operation and prints the result.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::{FieldPolicy, FormFill, Operation, Password, SignatureStamp};
use ephemera_core::traits::OcrBackend;
use ephemera_core::types::{Artifact, ArtifactId, DocumentType};
use ephemera_document::{DocumentProcessor, UnavailableOcr};
use ephemera_pipeline::{Pipeline, TransformOutcome};
use ephemera_store::{ArtifactStore, RetentionSweeper, RetrievalGateway, ServePolicy, SweepReport};
use serde_json::json;
use tracing::info;

use crate::paths;
use crate::{Cli, Command};

/// Store and configuration shared by every subcommand.
struct Services {
    config: EphemeraConfig,
    config_path: PathBuf,
    store: Arc<ArtifactStore>,
}

impl Services {
    fn open(config: EphemeraConfig, config_path: PathBuf) -> Result<Self> {
        let store = Arc::new(ArtifactStore::from_config(&config)?);
        Ok(Self {
            config,
            config_path,
            store,
        })
    }

    fn gateway(&self) -> RetrievalGateway {
        RetrievalGateway::new(
            Arc::clone(&self.store),
            ServePolicy::from_config(&self.config),
        )
    }

    fn pipeline(&self) -> Pipeline {
        self.pipeline_with(Arc::new(UnavailableOcr))
    }

    fn pipeline_with(&self, ocr: Arc<dyn OcrBackend>) -> Pipeline {
        Pipeline::from_config(
            Arc::clone(&self.store),
            Arc::new(DocumentProcessor::new(self.config.paper_size)),
            ocr,
            &self.config,
        )
    }
}

/// File, then environment, then `--root`.
fn load_config(cli: &Cli) -> Result<(EphemeraConfig, PathBuf)> {
    let path = cli.config.clone().unwrap_or_else(paths::default_config_file);
    let mut config = EphemeraConfig::load(&path)?.with_env_overrides()?;
    if let Some(root) = &cli.root {
        config.storage_root = root.clone();
    }
    config.validate()?;
    Ok((config, path))
}

pub async fn run(cli: Cli) -> Result<()> {
    let (config, config_path) = load_config(&cli)?;
    let services = Services::open(config, config_path)?;

    match cli.command {
        Command::Put {
            file,
            name,
            content_type,
        } => put(&services, &file, name, content_type),
        Command::Info { id, verify } => info(&services, id, verify).await,
        Command::Ls => ls(&services),
        Command::Get { id, output } => get(&services, id, output),
        Command::Rm { id } => {
            let removed = services.store.delete(id)?;
            println!("{}", if removed { "removed" } else { "absent" });
            Ok(())
        }
        Command::Merge { ids, order } => apply(&services, Operation::Merge { order }, &ids).await,
        Command::Split { id, ranges } => apply(&services, Operation::Split { ranges }, &[id]).await,
        Command::Compress { id, quality } => {
            apply(&services, Operation::Compress { quality }, &[id]).await
        }
        Command::Convert { id, to } => {
            apply(&services, Operation::Convert { target: to }, &[id]).await
        }
        Command::Sign {
            id,
            image,
            page,
            x,
            y,
            scale,
        } => {
            let stamp = SignatureStamp {
                page,
                x,
                y,
                scale,
                image: std::fs::read(&image)?,
            };
            apply(&services, Operation::Sign { stamp }, &[id]).await
        }
        Command::Redact { id, regions } => {
            apply(&services, Operation::Redact { regions }, &[id]).await
        }
        Command::Fill { id, fields, strict } => {
            let fill = FormFill {
                values: fields.into_iter().collect(),
                policy: if strict {
                    FieldPolicy::Strict
                } else {
                    FieldPolicy::BestEffort
                },
            };
            apply(&services, Operation::FillForm(fill), &[id]).await
        }
        Command::Protect {
            id,
            action,
            password,
        } => {
            let op = Operation::Protect {
                action,
                password: Password::new(password),
            };
            apply(&services, op, &[id]).await
        }
        Command::Ocr { id, language } => ocr(&services, id, language.as_deref()).await,
        Command::Sweep => {
            let sweeper = RetentionSweeper::new(Arc::clone(&services.store), services.config.ttl());
            print_report(&sweeper.sweep_once().await?);
            Ok(())
        }
        Command::Serve => serve(&services).await,
        Command::Config { write } => {
            if write {
                services.config.persist(&services.config_path)?;
            }
            print_json(&services.config)
        }
    }
}

fn put(
    services: &Services,
    file: &Path,
    name: Option<String>,
    content_type: Option<String>,
) -> Result<()> {
    let name = name
        .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let content_type = content_type
        .or_else(|| {
            file.extension()
                .and_then(|ext| DocumentType::from_extension(&ext.to_string_lossy()))
                .map(|t| t.mime_type().to_string())
        })
        .ok_or_else(|| {
            EphemeraError::UnsupportedFormat(format!(
                "cannot infer a content type for '{}', pass --type",
                file.display()
            ))
        })?;

    let artifact = services
        .gateway()
        .ingest(File::open(file)?, &name, &content_type)?;
    print_json(&artifact)
}

async fn info(services: &Services, id: ArtifactId, verify: bool) -> Result<()> {
    if verify {
        let store = Arc::clone(&services.store);
        tokio::task::spawn_blocking(move || store.verify(id))
            .await
            .map_err(|err| EphemeraError::StorageWrite(format!("verify task failed: {err}")))??;
    }
    let inspection = services.pipeline().inspect(id).await?;
    print_json(&json!({
        "artifact": inspection.artifact,
        "page_count": inspection.page_count,
        "verified": verify,
    }))
}

fn ls(services: &Services) -> Result<()> {
    let listing = services.store.list()?;
    for artifact in &listing.artifacts {
        print_row(artifact);
    }
    if !listing.strays.is_empty() {
        eprintln!(
            "{} stray file(s) awaiting the sweeper",
            listing.strays.len()
        );
    }
    Ok(())
}

fn get(services: &Services, id: ArtifactId, output: Option<PathBuf>) -> Result<()> {
    let download = services.gateway().resolve(id)?;
    match output {
        Some(path) if path.as_os_str() == "-" => {
            std::io::stdout().write_all(&download.bytes)?;
        }
        output => {
            let path = output.unwrap_or_else(|| PathBuf::from(&download.suggested_filename));
            std::fs::write(&path, &download.bytes)?;
            info!(path = %path.display(), size_bytes = download.bytes.len(), "Artifact written");
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn apply(services: &Services, op: Operation, inputs: &[ArtifactId]) -> Result<()> {
    let outcome = services.pipeline().apply(op, inputs).await?;
    print_outcome(&outcome);
    Ok(())
}

async fn ocr(services: &Services, id: ArtifactId, language: Option<&str>) -> Result<()> {
    let backend = ephemera_document::ocr::default_backend()?;
    let text = services.pipeline_with(backend).ocr(id, language).await?;
    print_json(&text)
}

async fn serve(services: &Services) -> Result<()> {
    let mut sweeper = RetentionSweeper::new(Arc::clone(&services.store), services.config.ttl());
    let report = sweeper.start(services.config.sweep_interval()).await?;
    print_report(&report);

    info!(root = %services.store.root().display(), "Serving; press Ctrl-C to stop");
    let signal = tokio::signal::ctrl_c().await;
    sweeper.stop().await;
    signal?;
    Ok(())
}

fn print_outcome(outcome: &TransformOutcome) {
    for artifact in &outcome.artifacts {
        print_row(artifact);
    }
    if !outcome.skipped_fields.is_empty() {
        eprintln!("skipped fields: {}", outcome.skipped_fields.join(", "));
    }
}

fn print_row(artifact: &Artifact) {
    println!(
        "{}  {}  {:>10}  {:<16}  {}",
        artifact.id,
        artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
        artifact.size_bytes,
        artifact.content_type.extension(),
        artifact.original_name
    );
}

fn print_report(report: &SweepReport) {
    println!(
        "scanned {} evicted {} orphans {} failures {}",
        report.scanned, report.evicted, report.orphans_removed, report.failures
    );
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
