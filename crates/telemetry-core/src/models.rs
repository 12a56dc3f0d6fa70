use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single recorded client-side occurrence.
///
/// Events are appended in insertion order and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEvent {
    /// Unique identifier generated at record time.
    pub id: String,
    /// Event name, e.g. `"journey_step_open_chat"` or `"chokepoint_auth_check"`.
    pub event: String,
    /// Logical UI location the event was recorded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// UTC creation time.
    pub timestamp: DateTime<Utc>,
    /// Elapsed time in milliseconds, when the caller measured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Free-form payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Owning session.
    pub session_id: String,
    /// User identifier known at record time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One named, screen-scoped action in the linear user journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJourneyStep {
    pub step: String,
    pub screen: String,
    pub timestamp: DateTime<Utc>,
    /// Name of the immediately preceding step, `None` for the first step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_step: Option<String>,
    /// Milliseconds since the immediately preceding step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from_previous: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl UserJourneyStep {
    /// The `"previous->current"` transition this step completes, if any.
    pub fn transition(&self) -> Option<String> {
        self.previous_step
            .as_ref()
            .map(|prev| format!("{}->{}", prev, self.step))
    }
}

/// Running statistics for one pre-registered critical interaction point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChokePoint {
    pub name: String,
    pub screen: String,
    pub description: String,
    /// Fraction of successful attempts, in `[0, 1]`.
    pub success_rate: f64,
    /// Running mean of the supplied durations, in milliseconds.
    pub average_time: f64,
    pub total_attempts: u64,
    /// Attempts that supplied a duration; the divisor of `average_time`.
    #[serde(default)]
    pub timed_attempts: u64,
    /// Error strings from failed attempts, in arrival order.
    pub failure_reasons: Vec<String>,
}

impl ChokePoint {
    /// A zeroed entry, as seeded into the catalog.
    pub fn new(
        name: impl Into<String>,
        screen: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            screen: screen.into(),
            description: description.into(),
            success_rate: 0.0,
            average_time: 0.0,
            total_attempts: 0,
            timed_attempts: 0,
            failure_reasons: Vec::new(),
        }
    }

    /// Fold one attempt into the running statistics.
    ///
    /// Both averages are updated incrementally from the previous value and
    /// the post-increment count; history is never revisited.
    pub fn record_attempt(
        &mut self,
        success: bool,
        duration: Option<f64>,
        error_message: Option<&str>,
    ) {
        self.total_attempts += 1;
        let n = self.total_attempts as f64;
        let hit = if success { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * (n - 1.0) + hit) / n;

        if let Some(duration) = duration {
            self.timed_attempts += 1;
            let t = self.timed_attempts as f64;
            self.average_time = (self.average_time * (t - 1.0) + duration) / t;
        }

        if !success {
            if let Some(reason) = error_message {
                self.failure_reasons.push(reason.to_string());
            }
        }
    }
}

/// Severity assigned to a tracked error by keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Ordered keyword rules; the first rule with a matching keyword wins.
    const RULES: &'static [(&'static [&'static str], ErrorSeverity)] = &[
        (&["network", "timeout"], ErrorSeverity::Medium),
        (&["auth", "permission"], ErrorSeverity::High),
        (&["crash", "fatal"], ErrorSeverity::Critical),
    ];

    /// Classify an error message. Matching is plain substring containment.
    pub fn classify(error: &str) -> Self {
        Self::RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| error.contains(k)))
            .map(|(_, severity)| *severity)
            .unwrap_or(ErrorSeverity::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
