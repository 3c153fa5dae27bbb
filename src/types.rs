//! Core types for the Emoflux pipeline
//!
//! This module defines the data that flows through each stage: emotion labels,
//! observations persisted in the event log, transient classification results,
//! and derived statistics.

use chrono::{DateTime, FixedOffset};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::FluxError;

/// Lower bound of the confidence percentage scale
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Upper bound of the confidence percentage scale
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Emotion label from the fixed, closed label set
///
/// Variants are declared in precedence order. Whenever two labels tie for
/// "dominant", the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Stressed,
    Neutral,
}

impl Emotion {
    /// Number of labels in the set
    pub const COUNT: usize = 8;

    /// All labels in precedence order
    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Stressed,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Stressed => "stressed",
            Emotion::Neutral => "neutral",
        }
    }

    /// Position of this label in precedence order
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == needle)
            .ok_or_else(|| FluxError::UnknownEmotion(s.to_string()))
    }
}

/// Provenance of an observation (informational only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Camera,
    Text,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Camera => "camera",
            Source::Text => "text",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Source {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camera" => Ok(Source::Camera),
            "text" => Ok(Source::Text),
            _ => Err(FluxError::UnknownSource(s.to_string())),
        }
    }
}

/// One recorded emotion-detection event
///
/// Observations are immutable once created. The timestamp keeps the UTC offset
/// that was in effect at creation, and calendar bucketing uses that offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Opaque unique identifier
    pub id: String,
    /// Detected label
    pub emotion: Emotion,
    /// Confidence percentage (0-100)
    pub confidence: f64,
    /// Creation time, with the creator's UTC offset
    pub timestamp: DateTime<FixedOffset>,
    /// Which classifier produced it
    pub source: Source,
}

impl Observation {
    /// Create an observation with a fresh identifier and clamped confidence
    pub fn new(
        emotion: Emotion,
        confidence: f64,
        source: Source,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            emotion,
            confidence: clamp_confidence(confidence),
            timestamp,
            source,
        }
    }
}

/// Clamp a confidence value into `[0, 100]`; non-finite values become 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    } else {
        MIN_CONFIDENCE
    }
}

/// Fixed-size map with one slot per emotion label
///
/// Iteration and serialization follow precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmotionMap<T>([T; Emotion::COUNT]);

impl<T> EmotionMap<T> {
    pub fn from_fn(mut f: impl FnMut(Emotion) -> T) -> Self {
        Self(Emotion::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, &T)> {
        Emotion::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Copy + PartialOrd> EmotionMap<T> {
    /// Label with the strictly highest value, earliest label winning ties
    pub fn dominant(&self) -> (Emotion, T) {
        let mut best = (Emotion::ALL[0], self.0[0]);
        for (emotion, value) in self.iter().skip(1) {
            if *value > best.1 {
                best = (emotion, *value);
            }
        }
        best
    }
}

impl<T> Index<Emotion> for EmotionMap<T> {
    type Output = T;

    fn index(&self, emotion: Emotion) -> &T {
        &self.0[emotion.index()]
    }
}

impl<T> IndexMut<Emotion> for EmotionMap<T> {
    fn index_mut(&mut self, emotion: Emotion) -> &mut T {
        &mut self.0[emotion.index()]
    }
}

impl<T: Serialize> Serialize for EmotionMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::COUNT))?;
        for (emotion, value) in self.iter() {
            map.serialize_entry(emotion.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for EmotionMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = HashMap::<Emotion, T>::deserialize(deserializer)?;
        let mut map = EmotionMap::default();
        for (emotion, value) in entries {
            map[emotion] = value;
        }
        Ok(map)
    }
}

/// Output of the text classifier (transient, never persisted as-is)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Dominant label
    pub emotion: Emotion,
    /// Confidence percentage, rounded
    pub confidence: u32,
    /// Per-label score normalized against the top score (0-100)
    pub breakdown: EmotionMap<u32>,
    /// Per-label keyword hit counts before normalization
    pub raw_scores: EmotionMap<u32>,
    /// Number of whitespace-separated tokens scored
    pub token_count: usize,
}

/// Count and share of one label in a set of observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub count: usize,
    /// Rounded percentage of the total (0-100)
    pub percentage: u32,
}

/// Hour-of-day slots in the hourly histogram
pub const HOURS_PER_DAY: usize = 24;

/// Day-of-week slots in the weekly histogram (0 = Sunday)
pub const DAYS_PER_WEEK: usize = 7;

/// Dashboard statistics derived from a set of observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_detections: usize,
    pub today_detections: usize,
    pub dominant_emotion: Emotion,
    /// Mean confidence, rounded
    pub average_confidence: u32,
    pub emotion_distribution: EmotionMap<DistributionEntry>,
    /// Observations per local hour (0-23)
    pub hourly_activity: [usize; HOURS_PER_DAY],
    /// Observations per weekday over the trailing 7 days (0 = Sunday)
    pub weekly_trend: [usize; DAYS_PER_WEEK],
}

impl Statistics {
    /// Statistics of an empty observation set
    pub fn empty() -> Self {
        Self {
            total_detections: 0,
            today_detections: 0,
            dominant_emotion: Emotion::Neutral,
            average_confidence: 0,
            emotion_distribution: EmotionMap::default(),
            hourly_activity: [0; HOURS_PER_DAY],
            weekly_trend: [0; DAYS_PER_WEEK],
        }
    }
}
