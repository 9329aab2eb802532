//! Clients for the external ML services.
//!
//! - [`ViralityOracle`]: numeric features in, virality prediction out
//! - [`TextEmbedder`] / [`SemanticRelevance`]: prompt-to-brief similarity
//! - [`TextFeatures`]: local caption heuristics
//!
//! Both services are optional; without them the oracles degrade to neutral
//! values instead of failing.

pub mod config;
pub mod embedding;
pub mod error;
pub mod scoring;
pub mod text_features;

pub use config::MlClientConfig;
pub use embedding::{cosine_similarity, HttpTextEmbedder, SemanticRelevance, TextEmbedder};
pub use error::{MlClientError, MlResult};
pub use scoring::{http_client, virality_oracle, HttpViralityOracle, NeutralOracle, ViralityOracle};
pub use text_features::{Sentiment, TextFeatures};
