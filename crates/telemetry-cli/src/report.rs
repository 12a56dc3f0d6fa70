//! Plain-text reports printed after a replay.

use std::fmt::Write;

use telemetry_core::formatting::{format_duration_ms, format_number, format_rate};
use telemetry_core::models::MetricEvent;
use telemetry_core::time_utils::{format_display_timestamp, TimezoneHandler};
use telemetry_data::TelemetryAggregator;

/// How timestamps are shown.
pub struct DisplayOptions {
    pub timezone: TimezoneHandler,
    pub use_12h: bool,
}

impl DisplayOptions {
    fn timestamp(&self, dt: chrono::DateTime<chrono::Utc>) -> String {
        format_display_timestamp(dt, &self.timezone, self.use_12h)
    }
}

/// Session overview: identity, volume, analysis highlights and the
/// chokepoints that were actually exercised.
pub fn render_summary(agg: &TelemetryAggregator, opts: &DisplayOptions) -> String {
    let analysis = agg.journey_analysis();
    let mut out = String::new();

    let _ = writeln!(out, "Session   {}", agg.session_id());
    let _ = writeln!(out, "User      {}", agg.user_id().unwrap_or("-"));
    let _ = writeln!(out, "Started   {}", opts.timestamp(agg.session_start()));
    let _ = writeln!(
        out,
        "Duration  {}",
        format_duration_ms(analysis.session_duration as f64)
    );
    let _ = writeln!(
        out,
        "Events    {}",
        format_number(agg.event_count() as f64, 0)
    );
    let _ = writeln!(out, "Steps     {}", analysis.total_steps);
    let _ = writeln!(
        out,
        "Avg step  {}",
        format_duration_ms(analysis.average_step_time)
    );

    if !analysis.common_paths.is_empty() {
        let _ = writeln!(out, "\nCommon paths");
        for path in &analysis.common_paths {
            let _ = writeln!(out, "  {}", path);
        }
    }
    if !analysis.dropoff_points.is_empty() {
        let _ = writeln!(out, "\nDrop-off points");
        for step in &analysis.dropoff_points {
            let _ = writeln!(out, "  {}", step);
        }
    }

    let errors: Vec<&MetricEvent> = agg
        .events(Some("error"), None)
        .into_iter()
        .filter(|e| e.event == "error")
        .collect();
    if !errors.is_empty() {
        let _ = writeln!(out, "\nErrors    {}", errors.len());
        for event in errors {
            let severity = event
                .data
                .as_ref()
                .and_then(|d| d.get("severity"))
                .and_then(|s| s.as_str())
                .unwrap_or("low");
            let _ = writeln!(
                out,
                "  [{}] {}",
                severity,
                event.error_message.as_deref().unwrap_or("")
            );
        }
    }

    let exercised = agg
        .chokepoints()
        .values()
        .filter(|cp| cp.total_attempts > 0)
        .count();
    let _ = writeln!(
        out,
        "\nChokepoints exercised: {} of {}",
        exercised,
        agg.chokepoints().len()
    );
    out
}

/// The journey in recorded order, optionally restricted to one screen.
pub fn render_journey(
    agg: &TelemetryAggregator,
    screen: Option<&str>,
    opts: &DisplayOptions,
) -> String {
    let steps = agg.journey_steps(screen);
    if steps.is_empty() {
        return "No journey steps recorded.\n".to_string();
    }

    let mut out = String::new();
    for (idx, step) in steps.iter().enumerate() {
        let gap = step
            .time_from_previous
            .map(|ms| format!("+{}", format_duration_ms(ms as f64)))
            .unwrap_or_else(|| "start".to_string());
        let _ = writeln!(
            out,
            "{:>3}. {}  {:<24} {:<16} {}",
            idx + 1,
            opts.timestamp(step.timestamp),
            step.step,
            step.screen,
            gap
        );
    }
    out
}

/// Every catalog entry with its statistics; untouched entries are listed
/// last.
pub fn render_chokepoints(agg: &TelemetryAggregator) -> String {
    let mut rows: Vec<_> = agg.chokepoints().values().collect();
    rows.sort_by_key(|cp| std::cmp::Reverse(cp.total_attempts));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<16} {:>8} {:>8} {:>10}",
        "CHOKEPOINT", "SCREEN", "ATTEMPTS", "SUCCESS", "AVG TIME"
    );
    for cp in rows {
        let (rate, avg) = if cp.total_attempts == 0 {
            ("-".to_string(), "-".to_string())
        } else {
            (format_rate(cp.success_rate), format_duration_ms(cp.average_time))
        };
        let _ = writeln!(
            out,
            "{:<24} {:<16} {:>8} {:>8} {:>10}",
            cp.name, cp.screen, cp.total_attempts, rate, avg
        );
        if let Some(last) = cp.failure_reasons.last() {
            let _ = writeln!(
                out,
                "    last failure: {} ({} recorded)",
                last,
                cp.failure_reasons.len()
            );
        }
    }
    out
}

/// Event log, filtered by a name substring and/or screen.
pub fn render_events(
    agg: &TelemetryAggregator,
    name_filter: Option<&str>,
    screen: Option<&str>,
    opts: &DisplayOptions,
) -> String {
    let events = agg.events(name_filter, screen);
    if events.is_empty() {
        return "No matching events.\n".to_string();
    }

    let mut out = String::new();
    for event in events {
        let mut line = format!(
            "{}  {:<32} {}",
            opts.timestamp(event.timestamp),
            event.event,
            event.screen.as_deref().unwrap_or("-")
        );
        if let Some(duration) = event.duration {
            let _ = write!(line, "  {}", format_duration_ms(duration));
        }
        if event.success == Some(false) {
            line.push_str("  FAILED");
        }
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// The full export snapshot as pretty JSON.
pub fn render_export(agg: &TelemetryAggregator) -> anyhow::Result<String> {
    Ok(agg.export_metrics().to_json_pretty()?)
}
