//! In-memory telemetry aggregation for one application session.
//!
//! [`TelemetryAggregator`] owns the event log, the linear user journey and
//! the running statistics of the fixed chokepoint catalog. Every operation is
//! a synchronous in-memory mutation and cannot fail.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use telemetry_core::catalog::seed_catalog;
use telemetry_core::clock::{Clock, SystemClock};
use telemetry_core::models::{ChokePoint, ErrorSeverity, MetricEvent, UserJourneyStep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{analyze_journey, JourneyAnalysis};
use crate::export::MetricsExport;

/// Length of the random suffix appended to session ids.
const SESSION_SUFFIX_LEN: usize = 9;

// ── EventDraft ────────────────────────────────────────────────────────────────

/// Caller-supplied parts of a [`MetricEvent`]; the aggregator fills in id,
/// timestamp and identity.
#[derive(Debug, Default)]
struct EventDraft {
    event: String,
    screen: Option<String>,
    data: Option<Value>,
    duration: Option<f64>,
    success: Option<bool>,
    error_message: Option<String>,
}

impl EventDraft {
    fn named(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    fn on_screen(mut self, screen: Option<&str>) -> Self {
        self.screen = screen.map(str::to_string);
        self
    }

    fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }
}

// ── TelemetryAggregator ───────────────────────────────────────────────────────

/// Accumulates client events, journey steps and chokepoint statistics.
///
/// Construct one per running application and pass it to call sites; wrap it
/// in a mutex when it must be shared across threads.
pub struct TelemetryAggregator {
    clock: Arc<dyn Clock>,
    session_id: String,
    session_start: DateTime<Utc>,
    user_id: Option<String>,
    events: Vec<MetricEvent>,
    journey: Vec<UserJourneyStep>,
    chokepoints: BTreeMap<String, ChokePoint>,
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryAggregator {
    /// A fresh session on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A fresh session reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let session_id = generate_session_id(now);
        debug!(session_id = %session_id, "telemetry session started");
        Self {
            clock,
            session_id,
            session_start: now,
            user_id: None,
            events: Vec::new(),
            journey: Vec::new(),
            chokepoints: seed_catalog(),
        }
    }

    // ── Recording ─────────────────────────────────────────────────────────

    /// Append a journey step, linking it to the step recorded just before
    /// it, and emit a `journey_step_<step>` event.
    pub fn track_journey_step(&mut self, step: &str, screen: &str, data: Option<Value>) {
        let now = self.clock.now();
        let (previous_step, time_from_previous) = match self.journey.last() {
            Some(prev) => (
                Some(prev.step.clone()),
                Some((now - prev.timestamp).num_milliseconds()),
            ),
            None => (None, None),
        };

        let payload = json!({
            "previousStep": previous_step,
            "timeFromPrevious": time_from_previous,
            "data": data,
        });

        self.journey.push(UserJourneyStep {
            step: step.to_string(),
            screen: screen.to_string(),
            timestamp: now,
            previous_step,
            time_from_previous,
            data,
        });

        self.track_event(
            format!("journey_step_{}", step),
            Some(screen),
            Some(payload),
            None,
        );
    }

    /// Append a generic event.
    pub fn track_event(
        &mut self,
        event: impl Into<String>,
        screen: Option<&str>,
        data: Option<Value>,
        duration: Option<f64>,
    ) -> &MetricEvent {
        let mut draft = EventDraft::named(event).on_screen(screen).with_data(data);
        draft.duration = duration;
        self.record(draft)
    }

    /// Fold one attempt into the named chokepoint's statistics and emit a
    /// `chokepoint_<name>` event carrying the updated figures.
    ///
    /// Names outside the catalog change nothing and emit nothing; the call
    /// is logged and `false` is returned.
    pub fn track_chokepoint_attempt(
        &mut self,
        name: &str,
        success: bool,
        duration: Option<f64>,
        error_message: Option<&str>,
    ) -> bool {
        let Some(chokepoint) = self.chokepoints.get_mut(name) else {
            warn!(chokepoint = name, "attempt against unregistered chokepoint ignored");
            return false;
        };

        chokepoint.record_attempt(success, duration, error_message);
        let screen = chokepoint.screen.clone();
        let payload = json!({
            "success": success,
            "duration": duration,
            "errorMessage": error_message,
            "successRate": chokepoint.success_rate,
            "averageTime": chokepoint.average_time,
            "totalAttempts": chokepoint.total_attempts,
        });

        let mut draft = EventDraft::named(format!("chokepoint_{}", name))
            .on_screen(Some(&screen))
            .with_data(Some(payload));
        draft.duration = duration;
        draft.success = Some(success);
        draft.error_message = error_message.map(str::to_string);
        self.record(draft);
        true
    }

    /// Record a satisfaction rating. The rating scale is the caller's.
    pub fn track_user_satisfaction(&mut self, screen: &str, rating: f64, feedback: Option<&str>) {
        let payload = json!({ "rating": rating, "feedback": feedback });
        self.track_event("user_satisfaction", Some(screen), Some(payload), None);
    }

    pub fn track_conversion(&mut self, conversion_type: &str, screen: &str, data: Option<Value>) {
        let payload = json!({ "conversionType": conversion_type, "data": data });
        self.track_event(
            format!("conversion_{}", conversion_type),
            Some(screen),
            Some(payload),
            None,
        );
    }

    /// Record an error event with a keyword-derived severity.
    pub fn track_error(
        &mut self,
        error: &str,
        screen: &str,
        context: Option<Value>,
    ) -> ErrorSeverity {
        let severity = ErrorSeverity::classify(error);
        let payload = json!({
            "error": error,
            "severity": severity,
            "context": context,
        });

        let mut draft = EventDraft::named("error")
            .on_screen(Some(screen))
            .with_data(Some(payload));
        draft.success = Some(false);
        draft.error_message = Some(error.to_string());
        self.record(draft);
        severity
    }

    /// Attach a user to the session. Only events recorded from now on carry
    /// the id.
    pub fn set_user_id(&mut self, user_id: &str) {
        self.user_id = Some(user_id.to_string());
        self.track_event(
            "user_identified",
            None,
            Some(json!({ "userId": user_id })),
            None,
        );
    }

    /// Drop all events and journey steps, reseed the catalog and restart the
    /// session clock. The session id is kept.
    pub fn clear_metrics(&mut self) {
        self.events.clear();
        self.journey.clear();
        self.chokepoints = seed_catalog();
        self.session_start = self.clock.now();
        debug!(session_id = %self.session_id, "telemetry metrics cleared");
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn journey_analysis(&self) -> JourneyAnalysis {
        analyze_journey(&self.journey, &self.chokepoints, self.session_duration_ms())
    }

    /// One catalog entry, or `None` for unregistered names.
    pub fn chokepoint(&self, name: &str) -> Option<&ChokePoint> {
        self.chokepoints.get(name)
    }

    pub fn chokepoints(&self) -> &BTreeMap<String, ChokePoint> {
        &self.chokepoints
    }

    /// Events whose name contains `event_type` and whose screen equals
    /// `screen`; absent filters match everything.
    pub fn events(&self, event_type: Option<&str>, screen: Option<&str>) -> Vec<&MetricEvent> {
        self.events
            .iter()
            .filter(|e| event_type.map_or(true, |t| e.event.contains(t)))
            .filter(|e| screen.map_or(true, |s| e.screen.as_deref() == Some(s)))
            .collect()
    }

    pub fn journey_steps(&self, screen: Option<&str>) -> Vec<&UserJourneyStep> {
        self.journey
            .iter()
            .filter(|s| screen.map_or(true, |sc| s.screen == sc))
            .collect()
    }

    /// Full snapshot for an external collector.
    pub fn export_metrics(&self) -> MetricsExport {
        MetricsExport {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            session_duration: self.session_duration_ms(),
            exported_at: self.clock.now(),
            events: self.events.clone(),
            journey: self.journey.clone(),
            chokepoints: self.chokepoints.clone(),
            analysis: self.journey_analysis(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn session_duration_ms(&self) -> i64 {
        (self.clock.now() - self.session_start).num_milliseconds()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn journey_len(&self) -> usize {
        self.journey.len()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn record(&mut self, draft: EventDraft) -> &MetricEvent {
        let event = MetricEvent {
            id: Uuid::new_v4().to_string(),
            event: draft.event,
            screen: draft.screen,
            timestamp: self.clock.now(),
            duration: draft.duration,
            data: draft.data,
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            success: draft.success,
            error_message: draft.error_message,
        };
        debug!(event = %event.event, screen = ?event.screen, "telemetry event recorded");
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }
}

/// `session_<unix millis>_<random hex>`, unique across installs in practice.
fn generate_session_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        now.timestamp_millis(),
        &suffix[..SESSION_SUFFIX_LEN]
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemetry_core::catalog::CHOKEPOINT_CATALOG;
    use telemetry_core::clock::ManualClock;

    fn manual() -> (TelemetryAggregator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        (TelemetryAggregator::with_clock(clock.clone()), clock)
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn test_new_session_has_full_zeroed_catalog() {
        let (agg, _) = manual();
        let export = agg.export_metrics();

        let names: Vec<&str> = export.chokepoints.keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = CHOKEPOINT_CATALOG.iter().map(|(n, _, _)| *n).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert!(export.events.is_empty());
        assert!(export.journey.is_empty());
    }

    #[test]
    fn test_session_id_format_and_uniqueness() {
        let (a, _) = manual();
        let (b, _) = manual();
        assert!(a.session_id().starts_with("session_1714564800000_"));
        assert_eq!(a.session_id().len(), "session_1714564800000_".len() + 9);
        assert_ne!(a.session_id(), b.session_id());
    }

    // ── journey ───────────────────────────────────────────────────────────

    #[test]
    fn test_journey_steps_link_to_previous() {
        let (mut agg, clock) = manual();
        agg.track_journey_step("open_chat", "Chat", None);
        clock.advance_millis(500);
        agg.track_journey_step("send_message", "Chat", None);

        let steps = agg.journey_steps(None);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].previous_step.is_none());
        assert!(steps[0].time_from_previous.is_none());
        assert_eq!(steps[1].previous_step.as_deref(), Some("open_chat"));
        assert_eq!(steps[1].time_from_previous, Some(500));
    }

    #[test]
    fn test_journey_uses_immediate_predecessor_not_same_name() {
        let (mut agg, clock) = manual();
        agg.track_journey_step("a", "Chat", None);
        clock.advance_millis(100);
        agg.track_journey_step("b", "Chat", None);
        clock.advance_millis(250);
        agg.track_journey_step("a", "Chat", None);

        let steps = agg.journey_steps(None);
        assert_eq!(steps[2].previous_step.as_deref(), Some("b"));
        assert_eq!(steps[2].time_from_previous, Some(250));
    }

    #[test]
    fn test_journey_step_emits_event() {
        let (mut agg, _) = manual();
        agg.track_journey_step("open_chat", "Chat", Some(json!({ "from": "push" })));

        let events = agg.events(Some("journey_step_"), None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "journey_step_open_chat");
        assert_eq!(events[0].screen.as_deref(), Some("Chat"));
        assert_eq!(events[0].data.as_ref().unwrap()["data"]["from"], "push");
    }

    #[test]
    fn test_journey_steps_filter_by_screen() {
        let (mut agg, _) = manual();
        agg.track_journey_step("open_app", "App", None);
        agg.track_journey_step("open_chat", "Chat", None);
        agg.track_journey_step("view_insights", "Insights", None);

        let chat = agg.journey_steps(Some("Chat"));
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].step, "open_chat");
        // Filtering does not change linkage.
        assert_eq!(chat[0].previous_step.as_deref(), Some("open_app"));
    }

    // ── chokepoints ───────────────────────────────────────────────────────

    #[test]
    fn test_chokepoint_scenario() {
        let (mut agg, _) = manual();
        assert!(agg.track_chokepoint_attempt("message_sending", true, Some(120.0), None));
        assert!(agg.track_chokepoint_attempt(
            "message_sending",
            false,
            Some(300.0),
            Some("timeout")
        ));

        let cp = agg.chokepoint("message_sending").unwrap();
        assert_eq!(cp.total_attempts, 2);
        assert!((cp.success_rate - 0.5).abs() < 1e-9);
        assert!((cp.average_time - 210.0).abs() < 1e-9);
        assert_eq!(cp.failure_reasons, vec!["timeout".to_string()]);
    }

    #[test]
    fn test_chokepoint_success_rate_matches_fraction() {
        let (mut agg, _) = manual();
        let outcomes = [true, false, true, true, false, true, true];
        for ok in outcomes {
            agg.track_chokepoint_attempt("auth_check", ok, None, None);
        }
        let cp = agg.chokepoint("auth_check").unwrap();
        assert_eq!(cp.total_attempts, outcomes.len() as u64);
        assert!((cp.success_rate - 5.0 / 7.0).abs() < 1e-9);
        assert_eq!(cp.average_time, 0.0);
    }

    #[test]
    fn test_chokepoint_average_is_mean_of_supplied_durations() {
        let (mut agg, _) = manual();
        agg.track_chokepoint_attempt("insights_data_loading", true, Some(40.0), None);
        agg.track_chokepoint_attempt("insights_data_loading", true, None, None);
        agg.track_chokepoint_attempt("insights_data_loading", true, Some(80.0), None);
        agg.track_chokepoint_attempt("insights_data_loading", true, Some(30.0), None);

        let cp = agg.chokepoint("insights_data_loading").unwrap();
        assert!((cp.average_time - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_chokepoint_emits_event_with_stats() {
        let (mut agg, _) = manual();
        agg.track_chokepoint_attempt("signin_form_submission", false, Some(900.0), Some("bad password"));

        let events = agg.events(Some("chokepoint_"), None);
        assert_eq!(events.len(), 1);
        let e = events[0];
        assert_eq!(e.event, "chokepoint_signin_form_submission");
        assert_eq!(e.screen.as_deref(), Some("SignIn"));
        assert_eq!(e.success, Some(false));
        assert_eq!(e.error_message.as_deref(), Some("bad password"));
        assert_eq!(e.duration, Some(900.0));
        let data = e.data.as_ref().unwrap();
        assert_eq!(data["totalAttempts"], 1);
        assert_eq!(data["successRate"], 0.0);
        assert_eq!(data["averageTime"], 900.0);
    }

    #[test]
    fn test_unknown_chokepoint_is_noop() {
        let (mut agg, _) = manual();
        let before = agg.chokepoints().clone();

        assert!(!agg.track_chokepoint_attempt("mesage_sending", true, Some(10.0), None));

        assert_eq!(agg.chokepoints(), &before);
        assert_eq!(agg.event_count(), 0);
        assert!(agg.chokepoint("mesage_sending").is_none());
    }

    // ── specialised events ────────────────────────────────────────────────

    #[test]
    fn test_track_error_classifies_auth_as_high() {
        let (mut agg, _) = manual();
        let severity = agg.track_error("auth token expired", "Chat", None);
        assert_eq!(severity, ErrorSeverity::High);

        let events = agg.events(Some("error"), Some("Chat"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.as_ref().unwrap()["severity"], "high");
        assert_eq!(events[0].success, Some(false));
        assert_eq!(events[0].error_message.as_deref(), Some("auth token expired"));
    }

    #[test]
    fn test_track_error_keeps_context() {
        let (mut agg, _) = manual();
        agg.track_error("renderer crash", "Insights", Some(json!({ "chart": "radar" })));
        let events = agg.events(Some("error"), None);
        let data = events[0].data.as_ref().unwrap();
        assert_eq!(data["severity"], "critical");
        assert_eq!(data["context"]["chart"], "radar");
    }

    #[test]
    fn test_satisfaction_and_conversion_events() {
        let (mut agg, _) = manual();
        agg.track_user_satisfaction("Chat", 4.0, Some("quick replies"));
        agg.track_conversion("premium_upgrade", "Insights", Some(json!({ "plan": "annual" })));

        let satisfaction = agg.events(Some("user_satisfaction"), None);
        let sat = satisfaction[0];
        assert_eq!(sat.data.as_ref().unwrap()["rating"], 4.0);
        assert_eq!(sat.data.as_ref().unwrap()["feedback"], "quick replies");

        let conversions = agg.events(Some("conversion_"), None);
        let conv = conversions[0];
        assert_eq!(conv.event, "conversion_premium_upgrade");
        assert_eq!(conv.screen.as_deref(), Some("Insights"));
        assert_eq!(conv.data.as_ref().unwrap()["data"]["plan"], "annual");
    }

    // ── event queries ─────────────────────────────────────────────────────

    #[test]
    fn test_events_filters_are_conjunctive() {
        let (mut agg, _) = manual();
        agg.track_event("tap_send", Some("Chat"), None, None);
        agg.track_event("tap_send", Some("Connections"), None, None);
        agg.track_event("tap_profile", Some("Chat"), None, Some(12.0));

        assert_eq!(agg.events(None, None).len(), 3);
        assert_eq!(agg.events(Some("tap_"), None).len(), 3);
        assert_eq!(agg.events(Some("send"), None).len(), 2);
        assert_eq!(agg.events(None, Some("Chat")).len(), 2);
        assert_eq!(agg.events(Some("send"), Some("Chat")).len(), 1);
        assert!(agg.events(Some("send"), Some("Insights")).is_empty());
    }

    #[test]
    fn test_events_keep_insertion_order_and_unique_ids() {
        let (mut agg, _) = manual();
        for name in ["first", "second", "third"] {
            agg.track_event(name, None, None, None);
        }
        let events = agg.events(None, None);
        let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_ne!(events[0].id, events[1].id);
        assert_ne!(events[1].id, events[2].id);
    }

    // ── identity ──────────────────────────────────────────────────────────

    #[test]
    fn test_set_user_id_is_not_retroactive() {
        let (mut agg, _) = manual();
        agg.track_event("before", None, None, None);
        agg.set_user_id("user-42");
        agg.track_event("after", None, None, None);

        let events = agg.events(None, None);
        assert_eq!(events[0].user_id, None);
        assert_eq!(events[1].event, "user_identified");
        assert_eq!(events[1].user_id.as_deref(), Some("user-42"));
        assert_eq!(events[2].user_id.as_deref(), Some("user-42"));
        assert_eq!(agg.user_id(), Some("user-42"));
    }

    // ── clear ─────────────────────────────────────────────────────────────

    #[test]
    fn test_clear_resets_everything_but_session_id() {
        let (mut agg, clock) = manual();
        let session_id = agg.session_id().to_string();
        agg.track_journey_step("open_chat", "Chat", None);
        agg.track_chokepoint_attempt("message_sending", true, Some(50.0), None);
        agg.track_chokepoint_attempt("message_sending", false, None, Some("offline"));
        clock.advance_millis(10_000);

        agg.clear_metrics();

        assert_eq!(agg.session_id(), session_id);
        assert_eq!(agg.event_count(), 0);
        assert_eq!(agg.journey_len(), 0);
        assert_eq!(agg.session_duration_ms(), 0);
        assert_eq!(agg.chokepoints(), &seed_catalog());
        for cp in agg.chokepoints().values() {
            assert_eq!(cp.total_attempts, 0);
            assert_eq!(cp.success_rate, 0.0);
            assert_eq!(cp.average_time, 0.0);
        }
    }

    // ── analysis & export ─────────────────────────────────────────────────

    #[test]
    fn test_analysis_has_no_dropoffs_with_one_timed_step() {
        let (mut agg, clock) = manual();
        agg.track_journey_step("a", "Chat", None);
        clock.advance_millis(60_000);
        agg.track_journey_step("b", "Chat", None);
        assert!(agg.journey_analysis().dropoff_points.is_empty());
    }

    #[test]
    fn test_analysis_detects_slow_step() {
        let (mut agg, clock) = manual();
        agg.track_journey_step("open_chat", "Chat", None);
        for _ in 0..3 {
            clock.advance_millis(100);
            agg.track_journey_step("type", "Chat", None);
        }
        clock.advance_millis(5_000);
        agg.track_journey_step("send_message", "Chat", None);

        let analysis = agg.journey_analysis();
        assert_eq!(analysis.total_steps, 5);
        assert!((analysis.average_step_time - 1_325.0).abs() < 1e-9);
        assert_eq!(analysis.dropoff_points, vec!["send_message".to_string()]);
        assert_eq!(analysis.common_paths[0], "type->type");
        assert_eq!(analysis.session_duration, 5_300);
    }

    #[test]
    fn test_export_snapshot_contents() {
        let (mut agg, clock) = manual();
        agg.set_user_id("u1");
        agg.track_journey_step("open_chat", "Chat", None);
        agg.track_chokepoint_attempt("message_display", true, Some(16.0), None);
        clock.advance_millis(2_000);

        let export = agg.export_metrics();
        assert_eq!(export.session_id, agg.session_id());
        assert_eq!(export.user_id.as_deref(), Some("u1"));
        assert_eq!(export.session_duration, 2_000);
        assert_eq!(export.events.len(), 3);
        assert_eq!(export.journey.len(), 1);
        assert_eq!(export.chokepoints["message_display"].total_attempts, 1);
        assert_eq!(export.analysis, agg.journey_analysis());

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["chokepoints"].as_object().unwrap().len(), 17);
    }
}
