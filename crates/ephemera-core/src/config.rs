// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime configuration.
//
// Loaded from a JSON file when one exists, then overridden by `EPHEMERA_*`
// environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EphemeraError, Result};
use crate::types::PaperSize;

/// Hard ceiling on the sweeper tick period, whatever is configured.
pub const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60 * 60);

pub const ENV_STORAGE_ROOT: &str = "EPHEMERA_STORAGE_ROOT";
pub const ENV_MAX_PAYLOAD_BYTES: &str = "EPHEMERA_MAX_PAYLOAD_BYTES";
pub const ENV_TTL_MS: &str = "EPHEMERA_TTL_MS";
pub const ENV_SWEEP_INTERVAL_MS: &str = "EPHEMERA_SWEEP_INTERVAL_MS";
pub const ENV_TRANSFORM_TIMEOUT_MS: &str = "EPHEMERA_TRANSFORM_TIMEOUT_MS";

/// Store, pipeline and sweeper settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeraConfig {
    /// Directory holding payloads and metadata records.
    pub storage_root: PathBuf,
    /// Largest payload `create` accepts (default 50 MiB).
    pub max_payload_bytes: u64,
    /// Artifacts older than this are evicted (default 2 h).
    pub ttl_ms: u64,
    /// Sweeper tick. Clamped to [`MAX_SWEEP_PERIOD`] when used.
    pub sweep_interval_ms: u64,
    /// Upper bound on one transformation, including reads and the write.
    pub transform_timeout_ms: u64,
    /// Delete an artifact once the gateway has served it.
    pub delete_after_serve: bool,
    /// Page size used when rendering text or images to PDF.
    pub paper_size: PaperSize,
}

impl Default for EphemeraConfig {
    fn default() -> Self {
        Self {
            storage_root: std::env::temp_dir().join("ephemera"),
            max_payload_bytes: 50 * 1024 * 1024,
            ttl_ms: 2 * 60 * 60 * 1000,
            sweep_interval_ms: 2 * 60 * 60 * 1000,
            transform_timeout_ms: 120_000,
            delete_after_serve: false,
            paper_size: PaperSize::A4,
        }
    }
}

impl EphemeraConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Configured interval, before the ceiling is applied.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                debug!(path = %path.display(), "loading configuration");
                Ok(serde_json::from_str(&data)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write this configuration as pretty JSON.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Apply `EPHEMERA_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(root) = lookup(ENV_STORAGE_ROOT).filter(|v| !v.trim().is_empty()) {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(v) = lookup(ENV_MAX_PAYLOAD_BYTES) {
            self.max_payload_bytes = parse_number(ENV_MAX_PAYLOAD_BYTES, &v)?;
        }
        if let Some(v) = lookup(ENV_TTL_MS) {
            self.ttl_ms = parse_number(ENV_TTL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SWEEP_INTERVAL_MS) {
            self.sweep_interval_ms = parse_number(ENV_SWEEP_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_TRANSFORM_TIMEOUT_MS) {
            self.transform_timeout_ms = parse_number(ENV_TRANSFORM_TIMEOUT_MS, &v)?;
        }
        Ok(self)
    }

    /// Reject settings the store and sweeper cannot run with.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("max_payload_bytes", self.max_payload_bytes),
            ("ttl_ms", self.ttl_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("transform_timeout_ms", self.transform_timeout_ms),
        ]
        .into_iter()
        .find(|(_, v)| *v == 0);

        if let Some((name, _)) = zero {
            return Err(EphemeraError::Validation(format!("{name} must be greater than zero")));
        }
        if self.storage_root.as_os_str().is_empty() {
            return Err(EphemeraError::Validation("storage_root must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| EphemeraError::Validation(format!("{key} must be an unsigned integer")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EphemeraConfig::default();
        assert_eq!(config.max_payload_bytes, 52_428_800);
        assert_eq!(config.ttl(), Duration::from_secs(7200));
        assert_eq!(config.sweep_interval(), Duration::from_secs(7200));
        assert!(!config.delete_after_serve);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            (ENV_STORAGE_ROOT, "/srv/ephemera"),
            (ENV_TTL_MS, "100"),
            (ENV_SWEEP_INTERVAL_MS, " 50 "),
        ]
        .into_iter()
        .collect();

        let config = EphemeraConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/srv/ephemera"));
        assert_eq!(config.ttl_ms, 100);
        assert_eq!(config.sweep_interval_ms, 50);
        assert_eq!(config.max_payload_bytes, 52_428_800);
    }

    #[test]
    fn unparseable_override_is_rejected() {
        let result = EphemeraConfig::default().with_overrides(|k| {
            (k == ENV_MAX_PAYLOAD_BYTES).then(|| "fifty megs".to_string())
        });
        assert!(matches!(result, Err(EphemeraError::Validation(_))));
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let config = EphemeraConfig {
            ttl_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_and_persist_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ephemera.json");

        let missing = EphemeraConfig::load(&path).unwrap();
        assert_eq!(missing, EphemeraConfig::default());

        let config = EphemeraConfig {
            ttl_ms: 1234,
            delete_after_serve: true,
            ..Default::default()
        };
        config.persist(&path).unwrap();
        assert_eq!(EphemeraConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephemera.json");
        std::fs::write(&path, r#"{ "ttl_ms": 5000 }"#).unwrap();

        let config = EphemeraConfig::load(&path).unwrap();
        assert_eq!(config.ttl_ms, 5000);
        assert_eq!(config.max_payload_bytes, 52_428_800);
    }
}
