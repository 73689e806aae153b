//! Display labels for timestamps and metric values.

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use smartmon_types::Metric;

/// Formats epoch-millisecond timestamps as 12-hour time-of-day labels.
///
/// ```
/// use smartmon_core::format::TimeFormatter;
///
/// let fmt = TimeFormatter::utc();
/// // 2024-01-01T14:05:00Z
/// assert_eq!(fmt.label(Some(1_704_117_900_000)), "02:05 PM");
/// assert_eq!(fmt.label(Some(0)), "");
/// assert_eq!(fmt.label(None), "");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFormatter {
    offset: UtcOffset,
}

impl TimeFormatter {
    /// Format in a fixed UTC offset.
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Format in UTC.
    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }

    /// Format in the system's local offset, falling back to UTC when it
    /// cannot be determined (e.g. in a multi-threaded process on Unix).
    pub fn local() -> Self {
        Self::new(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Time-of-day label for `timestamp_ms`.
    ///
    /// Missing, zero and unrepresentable timestamps yield an empty string,
    /// which means "unknown time" rather than an error.
    pub fn label(&self, timestamp_ms: Option<i64>) -> String {
        format_time_label(timestamp_ms, self.offset)
    }
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::local()
    }
}

/// Time-of-day label (`hh:mm AM`) for an epoch-millisecond timestamp.
pub fn format_time_label(timestamp_ms: Option<i64>, offset: UtcOffset) -> String {
    let Some(ms) = timestamp_ms.filter(|&ms| ms != 0) else {
        return String::new();
    };

    let Ok(utc) = OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000) else {
        return String::new();
    };
    let Some(local) = utc.checked_to_offset(offset) else {
        return String::new();
    };

    local
        .format(format_description!("[hour repr:12]:[minute] [period]"))
        .unwrap_or_default()
}

/// Value label with one decimal and the metric's unit; light levels are
/// whole numbers without a unit.
///
/// ```
/// use smartmon_core::format::format_value;
/// use smartmon_types::Metric;
///
/// assert_eq!(format_value(Metric::Temperature, 21.46), "21.5°C");
/// assert_eq!(format_value(Metric::Moisture, 40.0), "40.0%");
/// assert_eq!(format_value(Metric::Light, 1200.0), "1200");
/// ```
pub fn format_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::Light => format!("{:.0}", value),
        _ => format!("{:.1}{}", value, metric.unit()),
    }
}
