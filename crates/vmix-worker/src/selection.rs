//! Candidate scoring and best-candidate selection.
//!
//! Composite score per candidate:
//!
//! ```text
//! total = 0.70 * virality + 0.30 * (100 * relevance) - penalty
//! ```
//!
//! where virality comes from the scoring oracle over base features merged
//! with the candidate's own video features, relevance is the semantic
//! similarity of the candidate prompt to the brief, and the penalty applies
//! when the prompt mentions a deny-listed term.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vmix_media::features::VideoFeatureExtractor;
use vmix_ml_client::{SemanticRelevance, ViralityOracle};
use vmix_models::{FeatureMap, ScoreBreakdown, ScoreContext, SelectionResult, VideoCandidate};

use crate::locate::CandidateLocator;
use crate::metrics;

pub const VIRALITY_WEIGHT: f64 = 0.70;
pub const RELEVANCE_WEIGHT: f64 = 0.30;
pub const DEFAULT_DENY_PENALTY: f64 = 80.0;

/// Prompt terms that mark a candidate as off-brief.
#[derive(Debug, Clone, PartialEq)]
pub struct DenyList {
    terms: Vec<String>,
    penalty: f64,
}

impl Default for DenyList {
    fn default() -> Self {
        Self::new(Self::reference_terms(), DEFAULT_DENY_PENALTY)
    }
}

impl DenyList {
    /// Terms are matched lower-cased; blank terms are ignored.
    pub fn new(terms: Vec<String>, penalty: f64) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            penalty,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), DEFAULT_DENY_PENALTY)
    }

    /// Rural scenery that kept showing up in generations for urban briefs.
    pub fn reference_terms() -> Vec<String> {
        ["sawah", "rice field", "paddy", "farm", "countryside"]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Penalty for `prompt`: the full penalty on any substring hit, else 0.
    pub fn penalty_for(&self, prompt: &str) -> f64 {
        let prompt = prompt.to_lowercase();
        if self.terms.iter().any(|t| prompt.contains(t.as_str())) {
            self.penalty
        } else {
            0.0
        }
    }
}

/// Per-candidate numeric features.
#[async_trait]
pub trait CandidateFeatureSource: Send + Sync {
    async fn features(&self, video: &Path) -> FeatureMap;
}

/// Features read from the candidate's frames.
#[derive(Debug, Clone, Default)]
pub struct VideoFeatureSource {
    extractor: VideoFeatureExtractor,
}

impl VideoFeatureSource {
    pub fn new(extractor: VideoFeatureExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl CandidateFeatureSource for VideoFeatureSource {
    async fn features(&self, video: &Path) -> FeatureMap {
        self.extractor.extract(video).await.to_feature_map()
    }
}

/// Source that contributes nothing; base features are scored as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCandidateFeatures;

#[async_trait]
impl CandidateFeatureSource for NoCandidateFeatures {
    async fn features(&self, _video: &Path) -> FeatureMap {
        FeatureMap::new()
    }
}

/// Ranks candidates and keeps the first highest score.
pub struct CandidateSelector {
    oracle: Arc<dyn ViralityOracle>,
    relevance: SemanticRelevance,
    features: Arc<dyn CandidateFeatureSource>,
    deny: DenyList,
    locator: CandidateLocator,
}

impl CandidateSelector {
    pub fn new(
        oracle: Arc<dyn ViralityOracle>,
        relevance: SemanticRelevance,
        features: Arc<dyn CandidateFeatureSource>,
        deny: DenyList,
        locator: CandidateLocator,
    ) -> Self {
        Self {
            oracle,
            relevance,
            features,
            deny,
            locator,
        }
    }

    pub fn deny_list(&self) -> &DenyList {
        &self.deny
    }

    pub fn locator(&self) -> &CandidateLocator {
        &self.locator
    }

    /// Score one candidate whose file is at `video`.
    pub async fn score_candidate(
        &self,
        candidate: &VideoCandidate,
        video: &Path,
        context: &ScoreContext,
    ) -> ScoreBreakdown {
        let own = self.features.features(video).await;
        let merged = context.merged_features(&own);

        let virality = self.oracle.predict_or_neutral(&merged).await.clamped_score();
        let relevance = self
            .relevance
            .relevance(&candidate.prompt, &context.target_text)
            .await;
        let penalty = self.deny.penalty_for(&candidate.prompt);

        ScoreBreakdown {
            virality,
            relevance,
            penalty,
            total: composite_score(virality, relevance, penalty),
        }
    }

    /// Best materialized candidate.
    ///
    /// Candidates without a complete backing file are skipped. Ties keep the earliest
    /// candidate. When nothing can be scored the result carries no candidate.
    pub async fn select_best_candidate(
        &self,
        candidates: &[VideoCandidate],
        context: &ScoreContext,
    ) -> SelectionResult {
        let mut best = SelectionResult::none(0);
        let mut skipped = 0usize;
        let mut scored = 0usize;

        for candidate in candidates {
            let Some(video) = self.locator.resolve_existing(candidate).await else {
                debug!(variant = %candidate.variant, "Skipping candidate without a complete file");
                metrics::record_candidate_skipped();
                skipped += 1;
                continue;
            };

            let breakdown = self.score_candidate(candidate, &video, context).await;
            metrics::record_candidate_scored(breakdown.total, breakdown.penalty > 0.0);
            scored += 1;
            debug!(
                variant = %candidate.variant,
                path = %video.display(),
                virality = breakdown.virality,
                relevance = breakdown.relevance,
                penalty = breakdown.penalty,
                total = breakdown.total,
                "Scored candidate"
            );

            if breakdown.total > best.score {
                best.score = breakdown.total;
                best.candidate = Some(candidate.clone());
                best.path = Some(video);
                best.breakdown = Some(breakdown);
            }
        }

        best.scored = scored;
        best.skipped = skipped;

        match &best.candidate {
            Some(winner) => info!(
                variant = %winner.variant,
                score = best.score,
                scored,
                skipped,
                "Selected best candidate"
            ),
            None => {
                metrics::record_selection_without_winner();
                warn!(skipped, "No candidate could be scored");
            }
        }
        best
    }
}

impl std::fmt::Debug for CandidateSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateSelector")
            .field("relevance", &self.relevance)
            .field("deny", &self.deny)
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

/// `0.70 * virality + 0.30 * 100 * relevance - penalty`.
pub fn composite_score(virality: f64, relevance: f64, penalty: f64) -> f64 {
    VIRALITY_WEIGHT * virality + RELEVANCE_WEIGHT * (100.0 * relevance) - penalty
}
