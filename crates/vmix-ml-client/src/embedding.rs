//! Text embeddings and semantic relevance.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vmix_models::Capability;

use crate::config::MlClientConfig;
use crate::error::{MlClientError, MlResult};
use crate::scoring::http_client;

/// Maps text to a normalised embedding vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> MlResult<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
    normalize: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by the embedding service's `POST /embed`.
#[derive(Debug, Clone)]
pub struct HttpTextEmbedder {
    base_url: String,
    client: Client,
}

impl HttpTextEmbedder {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl TextEmbedder for HttpTextEmbedder {
    async fn embed(&self, text: &str) -> MlResult<Vec<f32>> {
        let url = format!("{}/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                text,
                normalize: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlClientError::Status { status, body });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            MlClientError::invalid_response(format!("Failed to parse embedding: {}", e))
        })?;
        if parsed.embedding.is_empty() {
            return Err(MlClientError::invalid_response("empty embedding"));
        }
        Ok(parsed.embedding)
    }
}

/// Cosine similarity in `[-1, 1]`; 0 for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, na, nb) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(d, x, y), (p, q)| {
        let (p, q) = (f64::from(*p), f64::from(*q));
        (d + p * q, x + p * p, y + q * q)
    });
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Semantic similarity between a candidate prompt and the target text.
#[derive(Clone)]
pub struct SemanticRelevance {
    embedder: Capability<Arc<dyn TextEmbedder>>,
}

impl SemanticRelevance {
    pub fn new(embedder: Capability<Arc<dyn TextEmbedder>>) -> Self {
        Self { embedder }
    }

    /// Relevance that is always 0.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::new(Capability::unavailable(reason))
    }

    /// Relevance from the configured embedding service, if any.
    pub fn from_config(config: &MlClientConfig) -> MlResult<Self> {
        Ok(match &config.embedding_url {
            Some(url) => {
                let embedder: Arc<dyn TextEmbedder> =
                    Arc::new(HttpTextEmbedder::new(url.clone(), http_client(config)?));
                Self::new(Capability::Available(embedder))
            }
            None => Self::disabled("VMIX_EMBEDDING_URL not set"),
        })
    }

    pub fn is_available(&self) -> bool {
        self.embedder.is_available()
    }

    /// Similarity of `a` and `b` in `[0, 1]`.
    ///
    /// Opposed embeddings count as unrelated. 0 when the embedder is
    /// unavailable, either text is blank, or the embedder fails.
    pub async fn relevance(&self, a: &str, b: &str) -> f64 {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let Some(embedder) = self.embedder.as_available() else {
            return 0.0;
        };

        let embedded = async {
            let ea = embedder.embed(a).await?;
            let eb = embedder.embed(b).await?;
            Ok::<_, MlClientError>(cosine_similarity(&ea, &eb))
        };
        match embedded.await {
            Ok(similarity) => {
                debug!(similarity, "Semantic relevance");
                similarity.clamp(0.0, 1.0)
            }
            Err(e) => {
                warn!("Embedding failed, relevance is 0: {}", e);
                0.0
            }
        }
    }
}

impl std::fmt::Debug for SemanticRelevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRelevance")
            .field("embedder", &self.embedder.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder;

    #[async_trait]
    impl TextEmbedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> MlResult<Vec<f32>> {
            if text.contains("boom") {
                return Err(MlClientError::invalid_response("boom"));
            }
            Ok(if text.contains("beach") {
                vec![1.0, 0.0]
            } else if text.contains("snow") {
                vec![-1.0, 0.0]
            } else {
                vec![0.6, 0.8]
            })
        }
    }

    fn relevance() -> SemanticRelevance {
        SemanticRelevance::new(Capability::Available(Arc::new(FixedEmbedder)))
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[2.0, 0.0], &[3.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_opposed_texts_have_zero_relevance() {
        let rel = relevance();
        assert_eq!(rel.relevance("beach party", "snow storm").await, 0.0);
    }

    #[tokio::test]
    async fn test_relevance_with_embedder() {
        let rel = relevance();
        assert!((rel.relevance("beach party", "beach sunset").await - 1.0).abs() < 1e-6);
        assert!((rel.relevance("beach party", "city night").await - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_relevance_soft_failures() {
        let rel = relevance();
        assert_eq!(rel.relevance("", "beach").await, 0.0);
        assert_eq!(rel.relevance("beach", "   ").await, 0.0);
        assert_eq!(rel.relevance("beach", "boom").await, 0.0);

        let disabled = SemanticRelevance::disabled("no service");
        assert!(!disabled.is_available());
        assert_eq!(disabled.relevance("beach", "beach").await, 0.0);
    }
}
