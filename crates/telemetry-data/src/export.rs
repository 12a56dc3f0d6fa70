//! The export snapshot handed to metrics sinks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry_core::models::{ChokePoint, MetricEvent, UserJourneyStep};

use crate::analysis::JourneyAnalysis;

/// Everything the aggregator knows about the current session, as one
/// serializable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Milliseconds since the session started (or was last cleared).
    pub session_duration: i64,
    pub exported_at: DateTime<Utc>,
    pub events: Vec<MetricEvent>,
    pub journey: Vec<UserJourneyStep>,
    pub chokepoints: BTreeMap<String, ChokePoint>,
    pub analysis: JourneyAnalysis,
}

impl MetricsExport {
    /// Compact single-line JSON, as written by line-oriented sinks.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
