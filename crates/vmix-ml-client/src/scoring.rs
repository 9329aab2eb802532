//! Virality scoring oracle.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use vmix_models::{FeatureMap, ViralityPrediction};

use crate::config::MlClientConfig;
use crate::error::{MlClientError, MlResult};

/// Predicts how likely a clip is to perform, from numeric features.
#[async_trait]
pub trait ViralityOracle: Send + Sync {
    async fn predict(&self, features: &FeatureMap) -> MlResult<ViralityPrediction>;

    /// Prediction that never fails: errors degrade to the neutral record.
    async fn predict_or_neutral(&self, features: &FeatureMap) -> ViralityPrediction {
        match self.predict(features).await {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("Virality prediction failed, using neutral score: {}", e);
                ViralityPrediction::neutral()
            }
        }
    }
}

/// Oracle used when no model is available; always neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralOracle;

#[async_trait]
impl ViralityOracle for NeutralOracle {
    async fn predict(&self, _features: &FeatureMap) -> MlResult<ViralityPrediction> {
        Ok(ViralityPrediction::neutral())
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    features: &'a FeatureMap,
}

/// Oracle backed by the scoring service's `POST /predict`.
#[derive(Debug, Clone)]
pub struct HttpViralityOracle {
    base_url: String,
    client: Client,
}

impl HttpViralityOracle {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ViralityOracle for HttpViralityOracle {
    async fn predict(&self, features: &FeatureMap) -> MlResult<ViralityPrediction> {
        let url = format!("{}/predict", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { features })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlClientError::Status { status, body });
        }

        let prediction: ViralityPrediction = response.json().await.map_err(|e| {
            MlClientError::invalid_response(format!("Failed to parse prediction: {}", e))
        })?;
        debug!(
            score = prediction.virality_score,
            genre = %prediction.genre_label,
            audience = %prediction.audience_label,
            "Virality prediction"
        );
        Ok(prediction)
    }
}

/// Build the HTTP client shared by the oracles.
pub fn http_client(config: &MlClientConfig) -> MlResult<Client> {
    Ok(Client::builder().timeout(config.timeout).build()?)
}

/// The configured scoring oracle, or the neutral one.
pub fn virality_oracle(config: &MlClientConfig) -> MlResult<Arc<dyn ViralityOracle>> {
    match &config.scorer_url {
        Some(url) => Ok(Arc::new(HttpViralityOracle::new(url.clone(), http_client(config)?))),
        None => {
            warn!("VMIX_SCORER_URL not set, virality scores will be neutral");
            Ok(Arc::new(NeutralOracle))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_neutral_oracle() {
        let prediction = NeutralOracle.predict(&FeatureMap::new()).await.unwrap();
        assert_eq!(prediction, ViralityPrediction::neutral());
        assert_eq!(prediction.virality_score, 50.0);
        assert_eq!(prediction.genre, -1);
        assert_eq!(prediction.audience_label, "unknown");
    }

    #[tokio::test]
    async fn test_unconfigured_oracle_is_neutral() {
        let oracle = virality_oracle(&MlClientConfig::default()).unwrap();
        let prediction = oracle.predict_or_neutral(&FeatureMap::new()).await;
        assert_eq!(prediction.virality_score, 50.0);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let oracle = HttpViralityOracle::new("http://scorer:8000/", Client::new());
        assert_eq!(oracle.base_url, "http://scorer:8000");
    }
}
