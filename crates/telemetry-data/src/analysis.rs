//! Derived journey analysis.
//!
//! Computed on demand from the journey log and the chokepoint catalog; never
//! cached.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use telemetry_core::models::{ChokePoint, UserJourneyStep};

/// Number of transitions reported in [`JourneyAnalysis::common_paths`].
pub const COMMON_PATH_LIMIT: usize = 5;

/// A step is a drop-off when it took longer than this multiple of the mean.
const DROPOFF_FACTOR: f64 = 2.0;

/// Read-only report over the current journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyAnalysis {
    /// Milliseconds since the session started.
    pub session_duration: i64,
    pub total_steps: usize,
    /// Mean of every defined `time_from_previous`, in milliseconds; `0.0`
    /// when no step has a predecessor.
    pub average_step_time: f64,
    /// Most frequent `"a->b"` transitions, most frequent first.
    pub common_paths: Vec<String>,
    /// Steps that took more than twice the mean, first occurrence order.
    pub dropoff_points: Vec<String>,
    pub chokepoint_performance: BTreeMap<String, ChokePoint>,
}

/// Build a [`JourneyAnalysis`] from the journey log and catalog.
pub fn analyze_journey(
    journey: &[UserJourneyStep],
    chokepoints: &BTreeMap<String, ChokePoint>,
    session_duration: i64,
) -> JourneyAnalysis {
    let average_step_time = average_step_time(journey);

    JourneyAnalysis {
        session_duration,
        total_steps: journey.len(),
        average_step_time,
        common_paths: common_paths(journey, COMMON_PATH_LIMIT),
        dropoff_points: dropoff_points(journey, average_step_time),
        chokepoint_performance: chokepoints.clone(),
    }
}

/// Mean of the defined step-to-step gaps. Steps without a predecessor are
/// excluded rather than counted as zero.
pub fn average_step_time(journey: &[UserJourneyStep]) -> f64 {
    let timed: Vec<i64> = journey.iter().filter_map(|s| s.time_from_previous).collect();
    if timed.is_empty() {
        return 0.0;
    }
    timed.iter().sum::<i64>() as f64 / timed.len() as f64
}

/// The `limit` most frequent transitions.
///
/// Counts are kept in first-encounter order and sorted stably, so equal
/// counts keep the order in which the transitions first appeared.
pub fn common_paths(journey: &[UserJourneyStep], limit: usize) -> Vec<String> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for transition in journey.iter().filter_map(UserJourneyStep::transition) {
        match index.get(&transition) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(transition.clone(), order.len());
                order.push((transition, 1));
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.into_iter().take(limit).map(|(path, _)| path).collect()
}

/// Step names whose gap exceeds twice `average`, deduplicated in first
/// occurrence order. Nothing qualifies when `average` is zero.
pub fn dropoff_points(journey: &[UserJourneyStep], average: f64) -> Vec<String> {
    if average <= 0.0 {
        return Vec::new();
    }
    let threshold = average * DROPOFF_FACTOR;
    let mut seen = HashSet::new();
    journey
        .iter()
        .filter(|s| s.time_from_previous.is_some_and(|t| t as f64 > threshold))
        .filter(|s| seen.insert(s.step.clone()))
        .map(|s| s.step.clone())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
