//! Runtime layer for journey telemetry.
//!
//! Shares one aggregator across threads, exports snapshots on a schedule,
//! tracks authentication state and replays recorded client scripts.

pub mod auth;
pub mod exporter;
pub mod replay;
pub mod shared;
pub mod sink;

pub use shared::SharedAggregator;
pub use telemetry_core as core;
pub use telemetry_data as data;
