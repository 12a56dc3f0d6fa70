//! Mutex-guarded aggregator handle for multi-threaded hosts.
//!
//! Running-average updates do not commute under interleaving, so every
//! operation goes through one lock around the whole aggregator.

use std::sync::{Arc, Mutex};

use telemetry_data::{MetricsExport, TelemetryAggregator};

/// Cloneable handle to one [`TelemetryAggregator`].
#[derive(Clone)]
pub struct SharedAggregator {
    inner: Arc<Mutex<TelemetryAggregator>>,
}

impl SharedAggregator {
    pub fn new(aggregator: TelemetryAggregator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(aggregator)),
        }
    }

    /// Run `f` with exclusive access.
    ///
    /// A poisoned lock is recovered: aggregator operations leave the state
    /// consistent between statements, so the data stays usable.
    pub fn with<R>(&self, f: impl FnOnce(&mut TelemetryAggregator) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("aggregator lock was poisoned; recovering");
            poisoned.into_inner()
        });
        f(&mut guard)
    }

    pub fn export_metrics(&self) -> MetricsExport {
        self.with(|agg| agg.export_metrics())
    }

    pub fn session_id(&self) -> String {
        self.with(|agg| agg.session_id().to_string())
    }
}

impl Default for SharedAggregator {
    fn default() -> Self {
        Self::new(TelemetryAggregator::new())
    }
}
