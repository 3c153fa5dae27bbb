//! Facial-expression readings from the camera collaborator
//!
//! The external face model reports a probability (0-1) per expression label.
//! Only the strongest recognized label is recorded, as a confidence percentage.

use std::collections::HashMap;

use crate::types::{Emotion, EmotionMap};

/// Pick the dominant recognized expression and its confidence percentage
///
/// Labels outside the emotion set are ignored. Returns `None` when no
/// recognized label is present, i.e. no face was detected.
pub fn dominant_expression(probabilities: &HashMap<String, f64>) -> Option<(Emotion, f64)> {
    // Unreported labels stay `None`, which orders below any probability
    let mut scores = EmotionMap::<Option<f64>>::default();

    for (label, probability) in probabilities {
        match label.parse::<Emotion>() {
            Ok(emotion) if probability.is_finite() => {
                scores[emotion] = Some(probability.clamp(0.0, 1.0));
            }
            Ok(_) => {}
            Err(_) => log::debug!("ignoring unknown expression label '{}'", label),
        }
    }

    match scores.dominant() {
        (emotion, Some(probability)) => Some((emotion, (probability * 100.0).round())),
        (_, None) => None,
    }
}
