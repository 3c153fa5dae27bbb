//! Dashboard statistics over an observation set
//!
//! `AggregationEngine::compute` is pure: the result depends only on the
//! observations and the reference time, never on input order.
//!
//! Calendar attributes (hour of day, weekday, calendar day) are taken in each
//! observation's own recorded UTC offset, i.e. the local time at capture.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::FluxError;
use crate::types::{
    DistributionEntry, Emotion, EmotionMap, Observation, Source, Statistics, DAYS_PER_WEEK,
    HOURS_PER_DAY,
};

/// Length of the weekly trend window
const WEEKLY_WINDOW_DAYS: i64 = 7;

/// Aggregation engine for dashboard statistics
pub struct AggregationEngine;

impl AggregationEngine {
    /// Reduce `observations` into statistics relative to `reference` ("now")
    pub fn compute(observations: &[Observation], reference: DateTime<FixedOffset>) -> Statistics {
        if observations.is_empty() {
            return Statistics::empty();
        }

        let total = observations.len();
        let week_start = reference - Duration::days(WEEKLY_WINDOW_DAYS);

        let mut counts = EmotionMap::<usize>::default();
        let mut confidence_sum = 0.0;
        let mut today_detections = 0;
        let mut hourly_activity = [0usize; HOURS_PER_DAY];
        let mut weekly_trend = [0usize; DAYS_PER_WEEK];

        for observation in observations {
            counts[observation.emotion] += 1;
            confidence_sum += observation.confidence;

            let local = observation.timestamp;
            if is_same_local_day(local, reference) {
                today_detections += 1;
            }

            hourly_activity[local.hour() as usize] += 1;

            if local >= week_start {
                weekly_trend[local.weekday().num_days_from_sunday() as usize] += 1;
            }
        }

        let (dominant_emotion, _) = counts.dominant();

        Statistics {
            total_detections: total,
            today_detections,
            dominant_emotion,
            average_confidence: (confidence_sum / total as f64).round() as u32,
            emotion_distribution: compute_distribution(&counts, total),
            hourly_activity,
            weekly_trend,
        }
    }
}

/// Whether `timestamp` falls on the same calendar day as `reference`, both read
/// in the offset `timestamp` was recorded with
fn is_same_local_day(timestamp: DateTime<FixedOffset>, reference: DateTime<FixedOffset>) -> bool {
    let reference_local = reference.with_timezone(timestamp.offset());
    timestamp.date_naive() == reference_local.date_naive()
}

/// Per-label count and rounded share of `total`
fn compute_distribution(counts: &EmotionMap<usize>, total: usize) -> EmotionMap<DistributionEntry> {
    EmotionMap::from_fn(|emotion| {
        let count = counts[emotion];
        let percentage = if total == 0 {
            0
        } else {
            (count as f64 / total as f64 * 100.0).round() as u32
        };
        DistributionEntry { count, percentage }
    })
}

/// `reference` moved back by `days` whole days
///
/// Out-of-range day counts are an `InvalidTimestamp` error instead of a panic.
pub fn days_before(
    reference: DateTime<FixedOffset>,
    days: i64,
) -> Result<DateTime<FixedOffset>, FluxError> {
    Duration::try_days(days)
        .and_then(|delta| reference.checked_sub_signed(delta))
        .ok_or_else(|| {
            FluxError::InvalidTimestamp(format!("{} days before {} is out of range", days, reference))
        })
}

/// Subset selection applied before aggregation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationFilter {
    /// Keep only observations from this classifier
    pub source: Option<Source>,
    /// Keep only observations with this label
    pub emotion: Option<Emotion>,
    /// Keep only observations at or after this instant
    pub since: Option<DateTime<FixedOffset>>,
}

impl ObservationFilter {
    pub fn matches(&self, observation: &Observation) -> bool {
        self.source.map_or(true, |s| observation.source == s)
            && self.emotion.map_or(true, |e| observation.emotion == e)
            && self.since.map_or(true, |t| observation.timestamp >= t)
    }

    /// Observations passing the filter, in their original order
    pub fn apply(&self, observations: &[Observation]) -> Vec<Observation> {
        observations
            .iter()
            .filter(|o| self.matches(o))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.emotion.is_none() && self.since.is_none()
    }
}
