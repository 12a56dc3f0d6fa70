//! Telemetry aggregation layer.
//!
//! Owns the in-memory [`aggregator::TelemetryAggregator`], the derived
//! journey analysis, the export snapshot handed to sinks, and the reader
//! for recorded JSONL session scripts.

pub mod aggregator;
pub mod analysis;
pub mod export;
pub mod reader;

pub use aggregator::TelemetryAggregator;
pub use export::MetricsExport;
pub use telemetry_core as core;
