/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use telemetry_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let formatted = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a millisecond duration for humans.
///
/// # Examples
///
/// ```
/// use telemetry_core::formatting::format_duration_ms;
///
/// assert_eq!(format_duration_ms(850.0), "850ms");
/// assert_eq!(format_duration_ms(1_500.0), "1.5s");
/// assert_eq!(format_duration_ms(125_000.0), "2m 5s");
/// assert_eq!(format_duration_ms(3_720_000.0), "1h 2m");
/// ```
pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1_000.0 {
        return format!("{}ms", ms.round() as i64);
    }
    if ms < 60_000.0 {
        return format!("{:.1}s", ms / 1_000.0);
    }
    let total_secs = (ms / 1_000.0).round() as i64;
    let (hours, mins, secs) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m {}s", mins, secs)
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let factor = 10_f64.powi(decimal_places as i32);
    ((part / whole) * 100.0 * factor).round() / factor
}

/// Render a `[0, 1]` rate as a percentage string, e.g. `0.5` → `"50.0%"`.
pub fn format_rate(rate: f64) -> String {
    format!("{}%", format_number(percentage(rate, 1.0, 1), 1))
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    digits
        .chars()
        .enumerate()
        .fold(String::with_capacity(len + len / 3), |mut acc, (i, c)| {
            if i > 0 && (len - i) % 3 == 0 {
                acc.push(',');
            }
            acc.push(c);
            acc
        })
}
