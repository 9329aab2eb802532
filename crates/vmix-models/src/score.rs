//! Scoring context, oracle predictions and selection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::candidate::VideoCandidate;

/// Engine-agnostic numeric features keyed by name.
pub type FeatureMap = BTreeMap<String, f64>;

/// Maximum number of lyric/description characters folded into the target text.
pub const TARGET_TEXT_LYRICS_LIMIT: usize = 2000;

/// Neutral virality score returned when no model is loaded.
pub const NEUTRAL_VIRALITY_SCORE: f64 = 50.0;

/// Inputs shared by every candidate scored in one selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreContext {
    /// Base features merged under each candidate's own features
    #[serde(default)]
    pub base_features: FeatureMap,

    /// Creative brief summary used for semantic relevance only
    #[serde(default)]
    pub target_text: String,
}

impl ScoreContext {
    pub fn new(base_features: FeatureMap, target_text: impl Into<String>) -> Self {
        Self {
            base_features,
            target_text: target_text.into(),
        }
    }

    /// Build the target text from the brief's parts, one per line.
    ///
    /// Lyrics (or the description when there are none) are truncated to
    /// [`TARGET_TEXT_LYRICS_LIMIT`] characters.
    pub fn compose_target_text(
        platform: &str,
        mood: &str,
        caption_seed: Option<&str>,
        audio_style: Option<&str>,
        lyrics_or_description: &str,
    ) -> String {
        let lyrics: String = lyrics_or_description
            .chars()
            .take(TARGET_TEXT_LYRICS_LIMIT)
            .collect();
        format!(
            "{}\n{}\n{}\n{}\n{}",
            platform,
            mood,
            caption_seed.unwrap_or_default(),
            audio_style.unwrap_or_default(),
            lyrics
        )
    }

    /// Base features overlaid with candidate-specific ones.
    pub fn merged_features(&self, candidate_features: &FeatureMap) -> FeatureMap {
        let mut merged = self.base_features.clone();
        merged.extend(
            candidate_features
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        merged
    }
}

/// Output of the virality scoring oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViralityPrediction {
    /// Probability of the "viral" class scaled to [0, 100]
    pub virality_score: f64,
    #[serde(default = "unknown_id")]
    pub genre: i64,
    #[serde(default = "unknown_label")]
    pub genre_label: String,
    #[serde(default = "unknown_id")]
    pub audience: i64,
    #[serde(default = "unknown_label")]
    pub audience_label: String,
}

fn unknown_id() -> i64 {
    -1
}

fn unknown_label() -> String {
    "unknown".to_string()
}

impl ViralityPrediction {
    /// Prediction used when the model artifacts are missing.
    pub fn neutral() -> Self {
        Self {
            virality_score: NEUTRAL_VIRALITY_SCORE,
            genre: -1,
            genre_label: unknown_label(),
            audience: -1,
            audience_label: unknown_label(),
        }
    }

    /// Score clamped to [0, 100].
    pub fn clamped_score(&self) -> f64 {
        if self.virality_score.is_finite() {
            self.virality_score.clamp(0.0, 100.0)
        } else {
            NEUTRAL_VIRALITY_SCORE
        }
    }
}

/// How one candidate's composite score was assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreBreakdown {
    pub virality: f64,
    /// Cosine similarity in [0, 1] (0 when unavailable)
    pub relevance: f64,
    pub penalty: f64,
    pub total: f64,
}

/// Outcome of a selection over a candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionResult {
    /// Winning candidate, or none when nothing was materialized
    pub candidate: Option<VideoCandidate>,
    /// Resolved file backing the winner
    pub path: Option<std::path::PathBuf>,
    /// Composite score of the winner (negative infinity when none)
    pub score: f64,
    pub breakdown: Option<ScoreBreakdown>,
    /// Number of candidates actually scored
    pub scored: usize,
    /// Number of candidates skipped for lack of a file
    pub skipped: usize,
}

impl SelectionResult {
    /// Result for a selection where no candidate could be scored.
    pub fn none(skipped: usize) -> Self {
        Self {
            candidate: None,
            path: None,
            score: f64::NEG_INFINITY,
            breakdown: None,
            scored: 0,
            skipped,
        }
    }

    pub fn is_none(&self) -> bool {
        self.candidate.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_text_layout() {
        let text = ScoreContext::compose_target_text(
            "tiktok",
            "hype",
            Some("gas terus"),
            None,
            "la la la",
        );
        assert_eq!(text, "tiktok\nhype\ngas terus\n\nla la la");
    }

    #[test]
    fn test_target_text_truncates_lyrics() {
        let lyrics = "x".repeat(5000);
        let text = ScoreContext::compose_target_text("p", "m", None, None, &lyrics);
        // "p\nm\n\n\n" + truncated lyrics
        assert_eq!(text.len(), 6 + TARGET_TEXT_LYRICS_LIMIT);
    }

    #[test]
    fn test_candidate_features_override_base() {
        let mut base = FeatureMap::new();
        base.insert("bpm".to_string(), 120.0);
        base.insert("has_faces".to_string(), 0.0);
        let ctx = ScoreContext::new(base, "");

        let mut own = FeatureMap::new();
        own.insert("has_faces".to_string(), 1.0);

        let merged = ctx.merged_features(&own);
        assert_eq!(merged["bpm"], 120.0);
        assert_eq!(merged["has_faces"], 1.0);
    }

    #[test]
    fn test_neutral_prediction() {
        let p = ViralityPrediction::neutral();
        assert_eq!(p.virality_score, 50.0);
        assert_eq!(p.genre_label, "unknown");

        let partial: ViralityPrediction =
            serde_json::from_str(r#"{"virality_score": 140.0}"#).unwrap();
        assert_eq!(partial.genre, -1);
        assert_eq!(partial.clamped_score(), 100.0);
    }

    #[test]
    fn test_empty_selection() {
        let result = SelectionResult::none(3);
        assert!(result.is_none());
        assert_eq!(result.skipped, 3);
        assert!(result.score.is_infinite());
    }
}
