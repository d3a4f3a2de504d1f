// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact store — one payload file plus one JSON metadata record per
// artifact, both named after the artifact id.
//
// Layout under the storage root:
//
//   <id>.part           payload being streamed in (never read)
//   <id>.payload        committed payload bytes
//   <id>.meta.json.tmp  metadata being written (never read)
//   <id>.meta.json      committed metadata record
//
// A create writes the payload first and the metadata last, each through a
// rename, so an artifact exists exactly when its `.meta.json` does. All
// methods are synchronous; async callers wrap them in
// `tokio::task::spawn_blocking`.

use std::fs::{self, File};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::types::{Artifact, ArtifactId, DocumentType, METADATA_FORMAT_VERSION};
use ephemera_security::{StreamDigest, hash_reader};
use tracing::{debug, info, instrument, warn};

const PAYLOAD_SUFFIX: &str = ".payload";
const STAGING_SUFFIX: &str = ".part";
const METADATA_SUFFIX: &str = ".meta.json";
const METADATA_STAGING_SUFFIX: &str = ".meta.json.tmp";

/// Longest original name kept, in bytes.
const MAX_NAME_BYTES: usize = 255;
const FALLBACK_NAME: &str = "document";
const COPY_CHUNK: usize = 64 * 1024;

/// A file in the storage root that does not belong to a committed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrayFile {
    pub file_name: String,
    pub kind: StrayKind,
    /// Last modification time, if the filesystem reports one.
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrayKind {
    /// A `.meta.json` that does not parse as a record.
    CorruptMetadata,
    /// A committed payload with no metadata record.
    Payload,
    /// A `.part` or `.meta.json.tmp` left behind by an interrupted create.
    Staging,
}

impl StrayFile {
    /// Time since the file was last modified. Unknown or future mtimes
    /// count as zero.
    pub fn age_at(&self, now: SystemTime) -> std::time::Duration {
        self.modified
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default()
    }
}

/// Everything found in the storage root by [`ArtifactStore::list`].
#[derive(Debug, Default)]
pub struct Listing {
    /// Committed metadata records, oldest first.
    pub artifacts: Vec<Artifact>,
    pub strays: Vec<StrayFile>,
}

/// Filesystem-backed artifact store.
pub struct ArtifactStore {
    root: PathBuf,
    max_payload_bytes: u64,
    /// Timestamp handed to the previous create, for monotonic `created_at`.
    last_created: Mutex<DateTime<Utc>>,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    #[instrument(skip_all, fields(root = %root.as_ref().display(), max_payload_bytes = max_payload_bytes))]
    pub fn open(root: impl AsRef<Path>, max_payload_bytes: u64) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| {
            EphemeraError::StorageWrite(format!("cannot create storage root: {err}"))
        })?;
        info!("Artifact store opened");
        Ok(Self {
            root,
            max_payload_bytes,
            last_created: Mutex::new(DateTime::<Utc>::MIN_UTC),
        })
    }

    pub fn from_config(config: &EphemeraConfig) -> Result<Self> {
        Self::open(&config.storage_root, config.max_payload_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_bytes
    }

    /// Store `payload` as a new artifact.
    ///
    /// Oversized payloads are rejected before anything touches the disk.
    pub fn create(
        &self,
        payload: &[u8],
        original_name: &str,
        content_type: DocumentType,
    ) -> Result<Artifact> {
        let size = payload.len() as u64;
        if size > self.max_payload_bytes {
            warn!(size, limit = self.max_payload_bytes, "Payload rejected");
            return Err(EphemeraError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        self.create_from_reader(payload, original_name, content_type)
    }

    /// Stream `reader` into a new artifact, enforcing the size limit while
    /// copying. At most `max_payload_bytes + 1` bytes are ever read.
    #[instrument(skip(self, reader), fields(artifact_id))]
    pub fn create_from_reader(
        &self,
        mut reader: impl Read,
        original_name: &str,
        content_type: DocumentType,
    ) -> Result<Artifact> {
        let id = ArtifactId::new();
        tracing::Span::current().record("artifact_id", tracing::field::display(id));

        let staging = self.staging_path(id);
        let (sha256, size_bytes) = match self.stream_to(&staging, &mut reader) {
            Ok(written) => written,
            Err(err) => {
                remove_quietly(&staging);
                return Err(err);
            }
        };

        let payload = self.payload_path(id);
        if let Err(err) = fs::rename(&staging, &payload) {
            remove_quietly(&staging);
            return Err(EphemeraError::StorageWrite(format!("cannot commit payload: {err}")));
        }

        let artifact = Artifact {
            format_version: METADATA_FORMAT_VERSION,
            id,
            original_name: sanitize_name(original_name),
            size_bytes,
            content_type,
            created_at: self.next_timestamp(),
            sha256,
            storage_location: payload_file_name(id),
        };

        if let Err(err) = self.write_metadata(&artifact) {
            remove_quietly(&payload);
            return Err(err);
        }

        info!(
            name = %artifact.original_name,
            size_bytes,
            content_type = %content_type,
            "Artifact created"
        );
        Ok(artifact)
    }

    /// Metadata for `id`. Does not check that the payload exists.
    pub fn get(&self, id: ArtifactId) -> Result<Artifact> {
        let path = self.metadata_path(id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                return Err(EphemeraError::not_found(id));
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<Artifact>(&raw) {
            Ok(artifact) if artifact.id == id => Ok(artifact),
            Ok(artifact) => {
                warn!(artifact_id = %id, recorded = %artifact.id, "Metadata names another artifact");
                Err(EphemeraError::not_found(id))
            }
            Err(err) => {
                warn!(artifact_id = %id, %err, "Unreadable metadata record");
                Err(EphemeraError::not_found(id))
            }
        }
    }

    /// Metadata plus an open handle on the payload.
    ///
    /// A record whose payload is missing, or whose payload length disagrees
    /// with the record, is corrupt and reported as `NotFound`.
    pub fn open_payload(&self, id: ArtifactId) -> Result<(Artifact, File)> {
        let artifact = self.get(id)?;
        let file = match File::open(self.payload_path(id)) {
            Ok(file) => file,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                warn!(artifact_id = %id, "Metadata record without payload");
                return Err(EphemeraError::not_found(id));
            }
            Err(err) => return Err(err.into()),
        };

        let on_disk = file.metadata()?.len();
        if on_disk != artifact.size_bytes {
            warn!(
                artifact_id = %id,
                recorded = artifact.size_bytes,
                on_disk,
                "Payload length disagrees with metadata"
            );
            return Err(EphemeraError::not_found(id));
        }
        Ok((artifact, file))
    }

    /// The full payload of `id`.
    pub fn read_payload(&self, id: ArtifactId) -> Result<Vec<u8>> {
        self.read_artifact(id).map(|(_, bytes)| bytes)
    }

    /// Metadata and full payload of `id`, from a single metadata read.
    #[instrument(skip(self))]
    pub fn read_artifact(&self, id: ArtifactId) -> Result<(Artifact, Vec<u8>)> {
        let (artifact, mut file) = self.open_payload(id)?;
        let mut bytes = Vec::with_capacity(artifact.size_bytes as usize);
        file.read_to_end(&mut bytes)?;
        if bytes.len() as u64 != artifact.size_bytes {
            warn!(artifact_id = %id, "Payload changed while reading");
            return Err(EphemeraError::not_found(id));
        }
        debug!(size_bytes = bytes.len(), "Payload read");
        Ok((artifact, bytes))
    }

    /// Re-hash the payload and compare it with the recorded digest.
    #[instrument(skip(self))]
    pub fn verify(&self, id: ArtifactId) -> Result<Artifact> {
        let (artifact, file) = self.open_payload(id)?;
        let (actual, _) = hash_reader(file)?;
        if !actual.eq_ignore_ascii_case(&artifact.sha256) {
            warn!(artifact_id = %id, "Payload digest mismatch");
            return Err(EphemeraError::IntegrityMismatch {
                expected: artifact.sha256,
                actual,
            });
        }
        Ok(artifact)
    }

    /// Whether the payload file for `artifact` is present.
    pub fn payload_exists(&self, artifact: &Artifact) -> bool {
        self.payload_path(artifact.id).is_file()
    }

    /// Remove an artifact. Metadata goes first so the artifact stops
    /// existing before its bytes do.
    ///
    /// Returns whether anything was removed; deleting an unknown id is not
    /// an error.
    #[instrument(skip(self))]
    pub fn delete(&self, id: ArtifactId) -> Result<bool> {
        let mut removed = remove_if_present(&self.metadata_path(id))?;
        removed |= remove_if_present(&self.payload_path(id))?;
        if removed {
            info!(artifact_id = %id, "Artifact deleted");
        } else {
            debug!(artifact_id = %id, "Nothing to delete");
        }
        Ok(removed)
    }

    /// Enumerate the storage root.
    pub fn list(&self) -> Result<Listing> {
        let mut listing = Listing::default();
        let mut payload_ids = Vec::new();
        let mut staging = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some((id, suffix)) = parse_file_name(&file_name) else {
                continue;
            };
            let modified = entry.metadata().and_then(|m| m.modified()).ok();

            match suffix {
                METADATA_SUFFIX => match self.get(id) {
                    Ok(artifact) => listing.artifacts.push(artifact),
                    Err(err) if err.is_not_found() && !self.metadata_path(id).exists() => {
                        // Deleted between read_dir and get.
                    }
                    Err(_) => listing.strays.push(StrayFile {
                        file_name,
                        kind: StrayKind::CorruptMetadata,
                        modified,
                    }),
                },
                PAYLOAD_SUFFIX => payload_ids.push((id, file_name, modified)),
                _ => staging.push(StrayFile {
                    file_name,
                    kind: StrayKind::Staging,
                    modified,
                }),
            }
        }

        let committed: std::collections::HashSet<ArtifactId> = listing
            .artifacts
            .iter()
            .map(|a| a.id)
            .chain(listing.strays.iter().filter_map(|s| {
                parse_file_name(&s.file_name).map(|(id, _)| id)
            }))
            .collect();
        listing.strays.extend(
            payload_ids
                .into_iter()
                .filter(|(id, _, _)| !committed.contains(id) && !self.metadata_path(*id).exists())
                .map(|(_, file_name, modified)| StrayFile {
                    file_name,
                    kind: StrayKind::Payload,
                    modified,
                }),
        );
        listing.strays.extend(staging);

        listing
            .artifacts
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(listing)
    }

    /// Remove a stray file found by [`list`](Self::list). A corrupt metadata
    /// record takes its payload with it.
    pub fn remove_stray(&self, stray: &StrayFile) -> Result<()> {
        let Some((id, _)) = parse_file_name(&stray.file_name) else {
            return Err(EphemeraError::Validation(format!(
                "'{}' is not a storage file",
                stray.file_name
            )));
        };
        remove_if_present(&self.root.join(&stray.file_name))?;
        if stray.kind == StrayKind::CorruptMetadata {
            remove_if_present(&self.payload_path(id))?;
        }
        info!(file = %stray.file_name, kind = ?stray.kind, "Stray file removed");
        Ok(())
    }

    fn payload_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(payload_file_name(id))
    }

    fn staging_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(format!("{id}{STAGING_SUFFIX}"))
    }

    fn metadata_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(format!("{id}{METADATA_SUFFIX}"))
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self
            .last_created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().max(*last);
        *last = now;
        now
    }

    /// Copy `reader` into a fresh file at `path`. Returns digest and length.
    fn stream_to(&self, path: &Path, reader: &mut impl Read) -> Result<(String, u64)> {
        let mut file = File::create_new(path)
            .map_err(|err| EphemeraError::StorageWrite(format!("cannot create payload: {err}")))?;
        let mut digest = StreamDigest::new();
        let mut buf = vec![0u8; COPY_CHUNK];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if digest.len() + n as u64 > self.max_payload_bytes {
                let size = digest.len() + n as u64;
                warn!(size, limit = self.max_payload_bytes, "Upload exceeded size limit");
                return Err(EphemeraError::PayloadTooLarge {
                    size,
                    limit: self.max_payload_bytes,
                });
            }
            file.write_all(&buf[..n])
                .map_err(|err| EphemeraError::StorageWrite(format!("payload write: {err}")))?;
            digest.update(&buf[..n]);
        }

        file.sync_all()
            .map_err(|err| EphemeraError::StorageWrite(format!("payload sync: {err}")))?;
        Ok(digest.finish())
    }

    fn write_metadata(&self, artifact: &Artifact) -> Result<()> {
        let staging = self
            .root
            .join(format!("{}{METADATA_STAGING_SUFFIX}", artifact.id));
        let json = serde_json::to_vec_pretty(artifact)?;

        let written = File::create(&staging)
            .and_then(|mut file| {
                file.write_all(&json)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&staging, self.metadata_path(artifact.id)));

        written.map_err(|err| {
            remove_quietly(&staging);
            EphemeraError::StorageWrite(format!("metadata write: {err}"))
        })
    }
}

fn payload_file_name(id: ArtifactId) -> String {
    format!("{id}{PAYLOAD_SUFFIX}")
}

/// Split `<id><suffix>` into its parts. Unknown files yield `None`.
fn parse_file_name(file_name: &str) -> Option<(ArtifactId, &'static str)> {
    // The staging suffix must be tried before the metadata suffix it ends with.
    [
        METADATA_STAGING_SUFFIX,
        METADATA_SUFFIX,
        PAYLOAD_SUFFIX,
        STAGING_SUFFIX,
    ]
    .into_iter()
    .find_map(|suffix| {
        let stem = file_name.strip_suffix(suffix)?;
        stem.parse::<ArtifactId>().ok().map(|id| (id, suffix))
    })
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(false),
        Err(err) => Err(EphemeraError::StorageWrite(format!("cannot remove file: {err}"))),
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != IoErrorKind::NotFound
    {
        warn!(%err, "Failed to clean up partial write");
    }
}

/// Reduce a client-supplied name to a bare file name: last path component,
/// no control characters, at most 255 bytes. Empty results become
/// `"document"`.
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    let mut end = cleaned.len().min(MAX_NAME_BYTES);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &cleaned[..end];

    if truncated.is_empty() || truncated == "." || truncated == ".." {
        FALLBACK_NAME.to_string()
    } else {
        truncated.to_string()
    }
}
