// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retention sweeper — a background task that evicts artifacts older than
// the TTL.
//
// Each tick lists the store and removes:
//
//   - artifacts whose age exceeds the TTL,
//   - metadata records whose payload is gone (whatever their age),
//   - stray files (corrupt records, payloads without metadata, staging
//     leftovers) whose mtime is older than the TTL.
//
// Young strays are left alone: a concurrent create may sit between its
// payload rename and its metadata write. A failure on one item is logged and
// the sweep carries on.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use ephemera_core::config::MAX_SWEEP_PERIOD;
use ephemera_core::error::{EphemeraError, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::store::ArtifactStore;

/// Shortest tick the loop will run at.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

/// Outcome of one sweep tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Committed metadata records examined.
    pub scanned: usize,
    /// Artifacts removed for exceeding the TTL.
    pub evicted: usize,
    /// Orphan metadata and stray files removed.
    pub orphans_removed: usize,
    /// Removals that failed and were skipped.
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    Stopped,
    Running,
}

/// Owns the periodic sweep task.
pub struct RetentionSweeper {
    store: Arc<ArtifactStore>,
    ttl: Duration,
    state: SweeperState,
    /// Signals the running loop to exit. Fresh for every run.
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    /// Created in `Stopped` state.
    pub fn new(store: Arc<ArtifactStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: SweeperState::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn state(&self) -> SweeperState {
        self.state
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sweep once now, then keep sweeping every `interval` (capped at one
    /// hour) until [`stop`](Self::stop).
    ///
    /// Starting a running sweeper restarts it with the new interval. The
    /// returned report is the immediate sweep's.
    pub async fn start(&mut self, interval: Duration) -> Result<SweepReport> {
        if self.state == SweeperState::Running {
            debug!("Sweeper already running, restarting");
            self.stop().await;
        }

        let report = self.sweep_once().await?;

        let period = effective_period(interval);
        let shutdown = Arc::new(Notify::new());
        self.shutdown_signal = Arc::clone(&shutdown);

        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        self.task_handle = Some(tokio::spawn(async move {
            Self::sweep_loop(store, ttl, period, shutdown).await;
        }));
        self.state = SweeperState::Running;

        info!(
            period_ms = period.as_millis() as u64,
            ttl_ms = self.ttl.as_millis() as u64,
            "Retention sweeper started"
        );
        Ok(report)
    }

    /// Stop the loop and wait for it to exit. Safe to call at any time,
    /// including before `start` and repeatedly.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            self.shutdown_signal.notify_one();
            if let Err(err) = handle.await {
                warn!(%err, "Sweeper task ended abnormally");
            }
            info!("Retention sweeper stopped");
        }
        self.state = SweeperState::Stopped;
    }

    /// Run one sweep tick on the blocking pool.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        run_blocking(Arc::clone(&self.store), self.ttl).await
    }

    async fn sweep_loop(
        store: Arc<ArtifactStore>,
        ttl: Duration,
        period: Duration,
        shutdown: Arc<Notify>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes at once; `start` already swept.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("Sweeper shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = run_blocking(Arc::clone(&store), ttl).await {
                        error!(%err, "Sweep tick failed");
                    }
                }
            }
        }
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// The tick period actually used for a configured interval.
pub fn effective_period(interval: Duration) -> Duration {
    interval.clamp(MIN_SWEEP_PERIOD, MAX_SWEEP_PERIOD)
}

async fn run_blocking(store: Arc<ArtifactStore>, ttl: Duration) -> Result<SweepReport> {
    tokio::task::spawn_blocking(move || sweep(&store, ttl, Utc::now()))
        .await
        .map_err(|err| EphemeraError::StorageWrite(format!("sweep task failed: {err}")))?
}

/// One sweep of `store` as of `now`.
#[instrument(skip(store), fields(ttl_ms = ttl.as_millis() as u64))]
pub fn sweep(store: &ArtifactStore, ttl: Duration, now: DateTime<Utc>) -> Result<SweepReport> {
    let listing = store.list()?;
    let mut report = SweepReport {
        scanned: listing.artifacts.len(),
        ..SweepReport::default()
    };

    for artifact in &listing.artifacts {
        let expired = artifact.age_at(now) > ttl;
        let orphaned = !expired && !store.payload_exists(artifact);
        if !expired && !orphaned {
            continue;
        }

        match store.delete(artifact.id) {
            Ok(_) if expired => report.evicted += 1,
            Ok(_) => {
                warn!(artifact_id = %artifact.id, "Removed metadata without payload");
                report.orphans_removed += 1;
            }
            Err(err) => {
                error!(artifact_id = %artifact.id, %err, "Eviction failed");
                report.failures += 1;
            }
        }
    }

    let now_sys = SystemTime::from(now);
    for stray in &listing.strays {
        if stray.age_at(now_sys) <= ttl {
            continue;
        }
        match store.remove_stray(stray) {
            Ok(()) => report.orphans_removed += 1,
            Err(err) => {
                error!(file = %stray.file_name, %err, "Stray removal failed");
                report.failures += 1;
            }
        }
    }

    if report.evicted + report.orphans_removed + report.failures > 0 {
        info!(
            scanned = report.scanned,
            evicted = report.evicted,
            orphans_removed = report.orphans_removed,
            failures = report.failures,
            "Sweep complete"
        );
    } else {
        debug!(scanned = report.scanned, "Sweep found nothing to evict");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Duration as ChronoDuration;
    use ephemera_core::types::{ArtifactId, DocumentType};

    use super::*;

    fn store() -> (tempfile::TempDir, Arc<ArtifactStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path(), 1 << 20).unwrap());
        (dir, store)
    }

    #[test]
    fn period_is_capped_at_one_hour() {
        assert_eq!(
            effective_period(Duration::from_secs(2 * 60 * 60)),
            MAX_SWEEP_PERIOD
        );
        assert_eq!(
            effective_period(Duration::from_millis(50)),
            Duration::from_millis(50)
        );
        assert_eq!(effective_period(Duration::ZERO), MIN_SWEEP_PERIOD);
    }

    #[test]
    fn ttl_boundary() {
        let (_dir, store) = store();
        let artifact = store.create(b"x", "a.txt", DocumentType::PlainText).unwrap();
        let ttl = Duration::from_secs(60);
        let created = artifact.created_at;

        let before = sweep(&store, ttl, created + ChronoDuration::seconds(59)).unwrap();
        assert_eq!(before.evicted, 0);
        assert!(store.get(artifact.id).is_ok());

        let after = sweep(&store, ttl, created + ChronoDuration::seconds(61)).unwrap();
        assert_eq!(after.evicted, 1);
        assert!(store.get(artifact.id).unwrap_err().is_not_found());
    }

    #[test]
    fn orphan_metadata_goes_regardless_of_age() {
        let (dir, store) = store();
        let artifact = store.create(b"x", "a.txt", DocumentType::PlainText).unwrap();
        fs::remove_file(dir.path().join(&artifact.storage_location)).unwrap();

        let report = sweep(&store, Duration::from_secs(3600), Utc::now()).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert_eq!(report.evicted, 0);
        assert!(store.list().unwrap().artifacts.is_empty());
    }

    #[test]
    fn young_strays_survive_old_ones_do_not() {
        let (dir, store) = store();
        let orphan = ArtifactId::new();
        fs::write(dir.path().join(format!("{orphan}.payload")), b"lost").unwrap();
        let ttl = Duration::from_secs(60);

        let report = sweep(&store, ttl, Utc::now()).unwrap();
        assert_eq!(report.orphans_removed, 0);

        let later = Utc::now() + ChronoDuration::seconds(120);
        let report = sweep(&store, ttl, later).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert!(!dir.path().join(format!("{orphan}.payload")).exists());
    }

    #[test]
    fn one_failed_eviction_does_not_stop_the_sweep() {
        let (dir, store) = store();
        let kept = store.create(b"a", "a.txt", DocumentType::PlainText).unwrap();
        let stuck = store.create(b"b", "b.txt", DocumentType::PlainText).unwrap();

        // A non-empty directory where the payload should be: remove_file fails.
        let payload = dir.path().join(&stuck.storage_location);
        fs::remove_file(&payload).unwrap();
        fs::create_dir(&payload).unwrap();
        fs::write(payload.join("pin"), b"x").unwrap();

        let later = stuck.created_at + ChronoDuration::seconds(120);
        let report = sweep(&store, Duration::from_secs(60), later).unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.failures, 1);
        assert!(store.get(kept.id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn stop_is_safe_before_start_and_twice() {
        let (_dir, store) = store();
        let mut sweeper = RetentionSweeper::new(store, Duration::from_secs(60));
        sweeper.stop().await;
        sweeper.stop().await;
        assert_eq!(sweeper.state(), SweeperState::Stopped);
    }

    #[tokio::test]
    async fn restart_replaces_the_running_loop() {
        let (_dir, store) = store();
        let mut sweeper = RetentionSweeper::new(store, Duration::from_secs(60));
        sweeper.start(Duration::from_millis(20)).await.unwrap();
        sweeper.start(Duration::from_millis(20)).await.unwrap();
        assert_eq!(sweeper.state(), SweeperState::Running);
        sweeper.stop().await;
        assert_eq!(sweeper.state(), SweeperState::Stopped);
    }
}
