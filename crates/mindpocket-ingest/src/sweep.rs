//! Periodic reconciliation of orphaned ingest records.
//!
//! A record can be left `pending` or `processing` if the process exits while
//! its background task is still running. The sweep fails such records once
//! they have not been touched for `stale_after`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use mindpocket_core::defaults::{
    SWEEP_FAILURE_MESSAGE, SWEEP_INTERVAL_SECS, SWEEP_STALE_AFTER_SECS,
};
use mindpocket_core::{BookmarkRepository, Error, Result};

const EVENT_CAPACITY: usize = 64;

/// Configuration for the sweep worker.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Minimum age of a non-terminal record before it is failed.
    pub stale_after: Duration,
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(SWEEP_STALE_AFTER_SECS),
            enabled: true,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_ENABLED` | `true` | Enable/disable the sweep |
    /// | `SWEEP_INTERVAL_SECS` | `60` | Seconds between sweeps |
    /// | `SWEEP_STALE_AFTER_SECS` | `900` | Age before a record is reconciled |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_INTERVAL_SECS)
            .max(1);

        let stale_after = std::env::var("SWEEP_STALE_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_STALE_AFTER_SECS);

        Self {
            interval: Duration::from_secs(interval),
            stale_after: Duration::from_secs(stale_after),
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweep worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    WorkerStarted,
    /// A sweep failed this many orphaned records.
    Reconciled { count: usize },
    SweepFailed { error: String },
    WorkerStopped,
}

/// Handle for controlling a running sweep worker.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SweepEvent>,
}

impl SweepHandle {
    /// Signal the worker to stop after the current sweep.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<SweepEvent> {
        self.event_rx.resubscribe()
    }
}

/// Background worker that fails stale `pending`/`processing` records.
pub struct SweepWorker {
    bookmarks: Arc<dyn BookmarkRepository>,
    config: SweepConfig,
    event_tx: broadcast::Sender<SweepEvent>,
}

impl SweepWorker {
    pub fn new(bookmarks: Arc<dyn BookmarkRepository>, config: SweepConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            bookmarks,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweepHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Fail every record older than `stale_after` that never finished.
    pub async fn sweep_once(&self) -> Result<Vec<Uuid>> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|e| Error::Config(format!("Invalid sweep stale_after: {}", e)))?;
        let cutoff = Utc::now() - stale_after;
        self.bookmarks
            .fail_stale(cutoff, SWEEP_FAILURE_MESSAGE)
            .await
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "ingest", component = "sweep", "Sweep worker is disabled, not starting");
            return;
        }

        info!(
            subsystem = "ingest",
            component = "sweep",
            interval_secs = self.config.interval.as_secs(),
            stale_after_secs = self.config.stale_after.as_secs(),
            "Sweep worker started"
        );
        let _ = self.event_tx.send(SweepEvent::WorkerStarted);

        loop {
            match self.sweep_once().await {
                Ok(ids) if ids.is_empty() => {
                    debug!(subsystem = "ingest", component = "sweep", "No orphaned records");
                }
                Ok(ids) => {
                    warn!(
                        subsystem = "ingest",
                        component = "sweep",
                        op = "reconcile",
                        count = ids.len(),
                        bookmark_ids = ?ids,
                        "Failed orphaned ingest records"
                    );
                    let _ = self
                        .event_tx
                        .send(SweepEvent::Reconciled { count: ids.len() });
                }
                Err(e) => {
                    error!(
                        subsystem = "ingest",
                        component = "sweep",
                        error = %e,
                        "Sweep failed"
                    );
                    let _ = self.event_tx.send(SweepEvent::SweepFailed {
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "ingest", component = "sweep", "Sweep worker received shutdown signal");
                    break;
                }
                _ = sleep(self.config.interval) => {}
            }
        }

        let _ = self.event_tx.send(SweepEvent::WorkerStopped);
        info!(subsystem = "ingest", component = "sweep", "Sweep worker stopped");
    }
}
