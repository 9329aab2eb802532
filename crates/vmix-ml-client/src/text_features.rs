//! Caption text features: call-to-action presence and a coarse sentiment.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use vmix_models::FeatureMap;

static CTA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(follow|like|share|comment|save|subscribe|tag|duet|stitch|fyp|for you|cek|like dong|komen|tag temen|komen ya)\b",
    )
    .unwrap()
});

const POSITIVE_WORDS: &[&str] = &[
    "happy", "hype", "party", "dance", "love", "senang", "semangat", "mantap", "gas",
];

const NEGATIVE_WORDS: &[&str] = &[
    "sad", "cry", "hurt", "alone", "broken", "sedih", "kecewa", "patah", "galau", "nangis",
];

/// Sentiment bucket of a caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// Numeric code used as a model feature.
    pub fn code(self) -> f64 {
        match self {
            Sentiment::Negative => 0.0,
            Sentiment::Neutral => 1.0,
            Sentiment::Positive => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextFeatures {
    pub has_cta: bool,
    pub sentiment: Sentiment,
}

impl TextFeatures {
    pub fn extract(text: &str) -> Self {
        let lowered = text.to_lowercase();
        // Substring counts, so "gas" also matches inside longer words
        let positive = POSITIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();

        let sentiment = if positive > negative && positive > 0 {
            Sentiment::Positive
        } else if negative > positive && negative > 0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        Self {
            has_cta: CTA_PATTERN.is_match(&lowered),
            sentiment,
        }
    }

    pub fn to_feature_map(&self) -> FeatureMap {
        FeatureMap::from([
            ("has_cta".to_string(), if self.has_cta { 1.0 } else { 0.0 }),
            ("sentiment_code".to_string(), self.sentiment.code()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cta_detection() {
        assert!(TextFeatures::extract("Follow for more!").has_cta);
        assert!(TextFeatures::extract("jangan lupa komen ya").has_cta);
        assert!(TextFeatures::extract("masuk FYP dong").has_cta);
        // Word boundaries: "likely" is not "like"
        assert!(!TextFeatures::extract("likely a sunset").has_cta);
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(TextFeatures::extract("party time, hype!").sentiment, Sentiment::Positive);
        assert_eq!(TextFeatures::extract("sedih dan galau").sentiment, Sentiment::Negative);
        assert_eq!(TextFeatures::extract("love but broken").sentiment, Sentiment::Neutral);
        assert_eq!(TextFeatures::extract("a quiet street").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_feature_map() {
        let map = TextFeatures::extract("share this, mantap").to_feature_map();
        assert_eq!(map["has_cta"], 1.0);
        assert_eq!(map["sentiment_code"], 2.0);
    }
}
