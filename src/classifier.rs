//! Keyword-based text emotion classification
//!
//! Scores free text against a fixed keyword table per emotion label. Matching is
//! substring containment: a token counts for a label when any of that label's
//! keywords occurs anywhere inside it, so "sadness" and "mad" inside "made"
//! both hit. This leniency is part of the scoring contract.

use crate::types::{ClassificationResult, Emotion, EmotionMap};

/// Confidence reported when no keyword matches
pub const FALLBACK_CONFIDENCE: u32 = 60;

/// Baseline added to keyword density when computing confidence
const CONFIDENCE_BASE: f64 = 40.0;

/// Ceiling for keyword-derived confidence
const CONFIDENCE_CEILING: f64 = 90.0;

const HAPPY_KEYWORDS: &[&str] = &[
    "happy", "joy", "excited", "wonderful", "amazing", "great", "fantastic", "love", "awesome",
    "perfect", "brilliant", "excellent", "delighted",
];

const SAD_KEYWORDS: &[&str] = &[
    "sad", "depressed", "down", "unhappy", "lonely", "disappointed", "heartbroken", "miserable",
    "gloomy", "blue", "melancholy",
];

const ANGRY_KEYWORDS: &[&str] = &[
    "angry", "mad", "furious", "annoyed", "irritated", "frustrated", "rage", "hate", "disgusted",
    "outraged", "livid",
];

const SURPRISED_KEYWORDS: &[&str] = &[
    "surprised", "shocked", "amazed", "astonished", "stunned", "wow", "unbelievable", "incredible",
    "unexpected",
];

const FEARFUL_KEYWORDS: &[&str] = &[
    "scared", "afraid", "terrified", "anxious", "worried", "nervous", "panic", "frightened",
    "concerned", "uneasy",
];

const DISGUSTED_KEYWORDS: &[&str] = &[
    "disgusted", "sick", "gross", "awful", "terrible", "horrible", "repulsed", "revolted", "nasty",
];

const STRESSED_KEYWORDS: &[&str] = &[
    "stressed", "overwhelmed", "pressure", "deadline", "busy", "exhausted", "burnout", "tired",
    "overworked",
];

const NEUTRAL_KEYWORDS: &[&str] = &[
    "okay", "fine", "normal", "regular", "usual", "average", "standard", "typical", "ordinary",
];

/// Keyword table for a label
pub fn keywords(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => HAPPY_KEYWORDS,
        Emotion::Sad => SAD_KEYWORDS,
        Emotion::Angry => ANGRY_KEYWORDS,
        Emotion::Surprised => SURPRISED_KEYWORDS,
        Emotion::Fearful => FEARFUL_KEYWORDS,
        Emotion::Disgusted => DISGUSTED_KEYWORDS,
        Emotion::Stressed => STRESSED_KEYWORDS,
        Emotion::Neutral => NEUTRAL_KEYWORDS,
    }
}

/// Deterministic keyword classifier for free text
pub struct TextClassifier;

impl TextClassifier {
    /// Classify `text` into a dominant label, confidence and per-label breakdown
    pub fn classify(text: &str) -> ClassificationResult {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();

        let raw_scores = score_tokens(&tokens);
        let (dominant, max_score) = raw_scores.dominant();

        if max_score == 0 {
            return ClassificationResult {
                emotion: Emotion::Neutral,
                confidence: FALLBACK_CONFIDENCE,
                breakdown: EmotionMap::default(),
                raw_scores,
                token_count: tokens.len(),
            };
        }

        ClassificationResult {
            emotion: dominant,
            confidence: compute_confidence(max_score, tokens.len()),
            breakdown: normalize_scores(&raw_scores, max_score),
            raw_scores,
            token_count: tokens.len(),
        }
    }
}

/// Count, per label, the tokens containing at least one of its keywords
fn score_tokens(tokens: &[&str]) -> EmotionMap<u32> {
    let mut scores = EmotionMap::<u32>::default();
    for token in tokens {
        for emotion in Emotion::ALL {
            if keywords(emotion).iter().any(|keyword| token.contains(keyword)) {
                scores[emotion] += 1;
            }
        }
    }
    scores
}

/// Compute confidence from keyword density
///
/// Formula: `min(90, max_score / token_count * 100 + 40)`, rounded
fn compute_confidence(max_score: u32, token_count: usize) -> u32 {
    let density = max_score as f64 / token_count.max(1) as f64 * 100.0;
    (density + CONFIDENCE_BASE).min(CONFIDENCE_CEILING).round() as u32
}

/// Normalize raw scores against the top score onto 0-100
fn normalize_scores(raw_scores: &EmotionMap<u32>, max_score: u32) -> EmotionMap<u32> {
    let denominator = max_score.max(1) as f64;
    EmotionMap::from_fn(|emotion| (raw_scores[emotion] as f64 / denominator * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_label_has_enough_keywords() {
        for emotion in Emotion::ALL {
            assert!(keywords(emotion).len() >= 9, "{emotion} table too small");
        }
    }

    #[test]
    fn test_happy_sentence() {
        let result =
            TextClassifier::classify("I am feeling absolutely wonderful today! Everything is amazing.");

        assert_eq!(result.emotion, Emotion::Happy);
        assert_eq!(result.token_count, 9);
        assert_eq!(result.raw_scores[Emotion::Happy], 2);
        // 2 / 9 * 100 + 40 = 62.2
        assert_eq!(result.confidence, 62);
        assert_eq!(result.breakdown[Emotion::Happy], 100);
        assert!(result.confidence > 40 && result.confidence <= 90);
    }

    #[test]
    fn test_no_matches_falls_back_to_neutral() {
        let result = TextClassifier::classify("the quick brown fox jumps");

        assert_eq!(result.emotion, Emotion::Neutral);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
        assert!(result.breakdown.values().all(|v| *v == 0));
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        for text in ["", "   \n\t  "] {
            let result = TextClassifier::classify(text);
            assert_eq!(result.emotion, Emotion::Neutral);
            assert_eq!(result.confidence, 60);
            assert_eq!(result.token_count, 0);
            assert_eq!(result.breakdown, EmotionMap::default());
        }
    }

    #[test]
    fn test_substring_matching_is_lenient() {
        // "made" contains "mad", "sadness" contains "sad"
        let result = TextClassifier::classify("sadness made me");

        assert_eq!(result.raw_scores[Emotion::Sad], 1);
        assert_eq!(result.raw_scores[Emotion::Angry], 1);
        // Tie between sad and angry goes to sad (declared first)
        assert_eq!(result.emotion, Emotion::Sad);
    }

    #[test]
    fn test_token_can_score_multiple_labels() {
        // "disgusted" is in both the angry and disgusted tables
        let result = TextClassifier::classify("disgusted");

        assert_eq!(result.raw_scores[Emotion::Angry], 1);
        assert_eq!(result.raw_scores[Emotion::Disgusted], 1);
        assert_eq!(result.emotion, Emotion::Angry);
        assert_eq!(result.breakdown[Emotion::Angry], 100);
        assert_eq!(result.breakdown[Emotion::Disgusted], 100);
    }

    #[test]
    fn test_label_scores_once_per_token() {
        // "happy" and "joy" both inside one token count once
        let result = TextClassifier::classify("happyjoy");
        assert_eq!(result.raw_scores[Emotion::Happy], 1);
    }

    #[test]
    fn test_confidence_is_capped() {
        let result = TextClassifier::classify("stressed overwhelmed exhausted");

        assert_eq!(result.emotion, Emotion::Stressed);
        assert_eq!(result.raw_scores[Emotion::Stressed], 3);
        assert_eq!(result.confidence, 90);
    }

    #[test]
    fn test_case_insensitive() {
        let result = TextClassifier::classify("FURIOUS and Livid");
        assert_eq!(result.emotion, Emotion::Angry);
        assert_eq!(result.raw_scores[Emotion::Angry], 2);
    }

    #[test]
    fn test_breakdown_is_relative_to_top_score() {
        let result = TextClassifier::classify(
            "I'm really stressed about this upcoming deadline and feeling overwhelmed.",
        );

        assert_eq!(result.emotion, Emotion::Stressed);
        assert_eq!(result.raw_scores[Emotion::Stressed], 3);
        assert_eq!(result.breakdown[Emotion::Stressed], 100);
        for value in result.breakdown.values() {
            assert!(*value <= 100);
        }
    }

    #[test]
    fn test_partial_breakdown_rounding() {
        // happy: 3 tokens, sad: 1 token -> sad normalizes to round(33.3) = 33
        let result = TextClassifier::classify("great love joy lonely");

        assert_eq!(result.emotion, Emotion::Happy);
        assert_eq!(result.breakdown[Emotion::Happy], 100);
        assert_eq!(result.breakdown[Emotion::Sad], 33);
        assert_eq!(result.breakdown[Emotion::Neutral], 0);
    }

    #[test]
    fn test_deterministic() {
        let text = "This is so frustrating! Nothing is working as it should.";
        assert_eq!(TextClassifier::classify(text), TextClassifier::classify(text));
    }
}
