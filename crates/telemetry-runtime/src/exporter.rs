//! Periodic export of metrics snapshots.
//!
//! [`ExportScheduler`] runs in a tokio task, taking a snapshot of the shared
//! aggregator on every tick and handing it to a [`MetricsSink`]. Shutting the
//! scheduler down performs one final export so nothing recorded since the
//! last tick is lost.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::shared::SharedAggregator;
use crate::sink::MetricsSink;

// ── ExportScheduler ───────────────────────────────────────────────────────────

/// Background exporter configuration.
pub struct ExportScheduler {
    interval: Duration,
    aggregator: SharedAggregator,
    sink: Box<dyn MetricsSink>,
}

impl ExportScheduler {
    /// `interval` is clamped to at least one millisecond.
    pub fn new(interval: Duration, aggregator: SharedAggregator, sink: Box<dyn MetricsSink>) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            aggregator,
            sink,
        }
    }

    /// Spawn the export loop.
    ///
    /// The first export happens one full interval after start. Dropping the
    /// returned handle without calling [`ExportHandle::abort`] ends the loop
    /// the same way [`ExportHandle::shutdown`] does.
    pub fn start(self) -> ExportHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(self.export_loop(shutdown_rx));
        ExportHandle {
            handle,
            shutdown: Some(shutdown_tx),
        }
    }

    // ── Private implementation ────────────────────────────────────────────

    /// Returns the number of snapshots the sink accepted.
    async fn export_loop(mut self, mut shutdown: oneshot::Receiver<()>) -> usize {
        let mut exported = 0usize;
        let mut interval = time::interval(self.interval);
        // The first tick fires immediately; skip it.
        interval.tick().await;

        tracing::info!(
            sink = self.sink.name(),
            interval_secs = self.interval.as_secs_f64(),
            "export scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.export_once() {
                        exported += 1;
                    }
                }
                _ = &mut shutdown => {
                    if self.export_once() {
                        exported += 1;
                    }
                    tracing::info!(exported, "export scheduler stopped");
                    break;
                }
            }
        }

        exported
    }

    /// Take one snapshot and hand it to the sink. Failures are logged, not
    /// propagated, so one bad write does not stop later exports.
    fn export_once(&mut self) -> bool {
        let snapshot = self.aggregator.export_metrics();
        match self.sink.export(&snapshot) {
            Ok(()) => {
                tracing::debug!(
                    sink = self.sink.name(),
                    events = snapshot.events.len(),
                    steps = snapshot.journey.len(),
                    "metrics snapshot exported"
                );
                true
            }
            Err(e) => {
                tracing::warn!(sink = self.sink.name(), error = %e, "metrics export failed");
                false
            }
        }
    }
}

// ── ExportHandle ──────────────────────────────────────────────────────────────

/// Handle to the background export task.
pub struct ExportHandle {
    handle: JoinHandle<usize>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ExportHandle {
    /// Stop immediately without a final export.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Stop after one final export; returns the total number of snapshots
    /// the sink accepted.
    pub async fn shutdown(mut self) -> usize {
        if let Some(tx) = self.shutdown.take() {
            // The loop may already be gone; that is fine.
            let _ = tx.send(());
        }
        match self.handle.await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "export task ended abnormally");
                0
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
