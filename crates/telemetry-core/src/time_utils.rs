use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Result, TelemetryError};

/// Detect the IANA timezone name of the running system, falling back to
/// `"UTC"`.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Parses script timestamps and converts recorded UTC times for display.
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl TimezoneHandler {
    /// Unrecognised names fall back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(timezone = tz_name, "unrecognised timezone, falling back to UTC");
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]`
    /// interpreted in the handler's timezone.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>> {
        let trimmed = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        const NAIVE_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        NAIVE_FORMATS
            .iter()
            .filter_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .find_map(|naive| self.default_tz.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TelemetryError::TimestampParse(s.to_string()))
    }

    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.default_tz)
    }

    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }
}

// ── 12-hour / 24-hour format detection ───────────────────────────────────────

/// Timezone prefixes for regions that conventionally use the 12-hour clock.
const TWELVE_HOUR_ZONES: &[&str] = &[
    "america/",
    "australia/",
    "pacific/auckland",
    "pacific/chatham",
    "asia/manila",
    "asia/kolkata",
    "asia/calcutta",
    "asia/karachi",
    "asia/dhaka",
    "asia/kuala_lumpur",
    "asia/riyadh",
    "asia/dubai",
    "africa/cairo",
];

/// Decide whether to use the 12-hour clock.
///
/// An explicit `"12h"`/`"24h"` wins; otherwise the timezone (or the system
/// timezone) decides; otherwise 24-hour.
pub fn detect_time_format(timezone: Option<&str>, explicit: Option<&str>) -> bool {
    match explicit.map(|s| s.to_lowercase()).as_deref() {
        Some("12h") => return true,
        Some("24h") => return false,
        _ => {}
    }

    let tz = timezone
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| get_system_timezone().to_lowercase());
    TWELVE_HOUR_ZONES.iter().any(|prefix| tz.starts_with(prefix))
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` (or with `AM`/`PM`) in the
/// handler's timezone.
pub fn format_display_timestamp(
    dt: DateTime<Utc>,
    handler: &TimezoneHandler,
    use_12h: bool,
) -> String {
    let local = handler.to_local(dt);
    if use_12h {
        local.format("%Y-%m-%d %I:%M:%S %p").to_string()
    } else {
        local.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
