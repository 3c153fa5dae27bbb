//! Presentation helpers layered on top of `Statistics`
//!
//! Statistics carry raw counts. Charts scale each series against its own
//! maximum; that scaling lives here so aggregation stays count-only.

use crate::types::HOURS_PER_DAY;

/// Weekday names indexed like `Statistics::weekly_trend` (0 = Sunday)
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Scale a histogram to percentages of its largest slot
///
/// The divisor is at least 1, so an all-zero series stays all zero.
pub fn scale_series(series: &[usize]) -> Vec<f64> {
    let max = series.iter().copied().max().unwrap_or(0).max(1) as f64;
    series.iter().map(|&v| v as f64 / max * 100.0).collect()
}

/// Fixed-width text bar filled to `percentage` (0-100)
pub fn percentage_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

/// Label for an hourly slot, e.g. `07:00`
pub fn hour_label(hour: usize) -> String {
    format!("{:02}:00", hour % HOURS_PER_DAY)
}
