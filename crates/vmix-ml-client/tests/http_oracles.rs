use std::sync::Arc;

use reqwest::Client;
use serde_json::json;
use vmix_ml_client::{
    HttpTextEmbedder, HttpViralityOracle, MlClientError, SemanticRelevance, TextEmbedder,
    ViralityOracle,
};
use vmix_models::{Capability, FeatureMap};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn features() -> FeatureMap {
    FeatureMap::from([("bpm".to_string(), 128.0), ("has_faces".to_string(), 1.0)])
}

#[tokio::test]
async fn predict_posts_features_and_parses_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({ "features": { "bpm": 128.0 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "virality_score": 87.5,
            "genre": 1,
            "genre_label": "tiktok_house",
            "audience": 0,
            "audience_label": "gen_z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpViralityOracle::new(server.uri(), Client::new());
    let prediction = oracle.predict(&features()).await.unwrap();
    assert_eq!(prediction.virality_score, 87.5);
    assert_eq!(prediction.genre_label, "tiktok_house");
    assert_eq!(prediction.audience, 0);
}

#[tokio::test]
async fn predict_fills_missing_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "virality_score": 12.0 })))
        .mount(&server)
        .await;

    let oracle = HttpViralityOracle::new(server.uri(), Client::new());
    let prediction = oracle.predict(&features()).await.unwrap();
    assert_eq!(prediction.genre, -1);
    assert_eq!(prediction.audience_label, "unknown");
}

#[tokio::test]
async fn predict_error_status_degrades_to_neutral() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let oracle = HttpViralityOracle::new(server.uri(), Client::new());
    let err = oracle.predict(&features()).await.unwrap_err();
    assert!(matches!(err, MlClientError::Status { status: 503, ref body } if body == "model loading"));

    let neutral = oracle.predict_or_neutral(&features()).await;
    assert_eq!(neutral.virality_score, 50.0);
}

#[tokio::test]
async fn embedding_relevance_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(json!({ "text": "neon city dance" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.6, 0.8] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(json!({ "text": "tiktok hype" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [1.0, 0.0] })))
        .mount(&server)
        .await;

    let embedder: Arc<dyn TextEmbedder> = Arc::new(HttpTextEmbedder::new(server.uri(), Client::new()));
    let relevance = SemanticRelevance::new(Capability::Available(embedder));
    let score = relevance.relevance("tiktok hype", "neon city dance").await;
    assert!((score - 0.6).abs() < 1e-6, "score {}", score);
}

#[tokio::test]
async fn embedding_failure_is_zero_relevance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let embedder: Arc<dyn TextEmbedder> = Arc::new(HttpTextEmbedder::new(server.uri(), Client::new()));
    let relevance = SemanticRelevance::new(Capability::Available(embedder));
    assert_eq!(relevance.relevance("a", "b").await, 0.0);
}
