//! Destinations for exported metrics snapshots.
//!
//! The aggregator only builds [`MetricsExport`] values; where they go is up
//! to the injected [`MetricsSink`].

use std::io::Write;
use std::path::{Path, PathBuf};

use telemetry_core::error::{Result, TelemetryError};
use telemetry_data::MetricsExport;

/// Accepts exported snapshots.
pub trait MetricsSink: Send {
    fn export(&mut self, snapshot: &MetricsExport) -> Result<()>;

    /// Short label used in log lines.
    fn name(&self) -> &str;
}

// ── JsonFileSink ──────────────────────────────────────────────────────────────

/// Keeps the latest snapshot as a pretty-printed JSON file.
///
/// Each export replaces the file atomically (temp file then rename).
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonFileSink {
    fn export(&mut self, snapshot: &MetricsExport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = snapshot.to_json_pretty()?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "snapshot written");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

// ── JsonlSink ─────────────────────────────────────────────────────────────────

/// Appends one compact snapshot per line.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsSink for JsonlSink {
    fn export(&mut self, snapshot: &MetricsExport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = snapshot.to_json_line()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                TelemetryError::Export(format!("cannot open {}: {}", self.path.display(), e))
            })?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Collects snapshots in memory; the handle can be cloned and inspected
/// while a scheduler owns the sink.
#[derive(Clone, Default)]
pub struct MemorySink {
    snapshots: std::sync::Arc<std::sync::Mutex<Vec<MetricsExport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<MetricsExport> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for MemorySink {
    fn export(&mut self, snapshot: &MetricsExport) -> Result<()> {
        self.snapshots
            .lock()
            .map_err(|_| TelemetryError::Export("memory sink lock poisoned".to_string()))?
            .push(snapshot.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Pick a file sink from a format name (`"json"` or `"jsonl"`).
pub fn file_sink(format: &str, path: &Path) -> Result<Box<dyn MetricsSink>> {
    match format {
        "json" => Ok(Box::new(JsonFileSink::new(path))),
        "jsonl" => Ok(Box::new(JsonlSink::new(path))),
        other => Err(TelemetryError::Config(format!(
            "unknown export format: {}",
            other
        ))),
    }
}
