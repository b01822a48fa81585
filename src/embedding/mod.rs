use crate::config::{Config, EmbeddingProvider};
use crate::retry::Retryable;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod ollama;

pub use ollama::OllamaEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or the request timed out.
    #[error("Embedding provider unreachable: {0}")]
    Transport(String),
    /// Provider answered with a non-success status.
    #[error("Embedding provider returned status {status}: {body}")]
    ProviderStatus {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body captured for diagnostics.
        body: String,
    },
    /// Provider answered successfully but the body was unusable.
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

impl Retryable for EmbeddingClientError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::GenerationFailed(_) => false,
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic offline embedder: hashes bytes into a fixed number of slots and L2-normalises.
///
/// Identical input always yields an identical vector, which makes it suitable for local runs and
/// fixtures where a real model is not available.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct an embedder producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = (idx.wrapping_mul(31) + usize::from(byte)) % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(
            dimension = self.dimension,
            texts = texts.len(),
            "Generating hash embeddings"
        );

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Build the embedding client selected by the configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            &config.ollama_url,
            &config.embedding_model,
            config.request_timeout(),
        )?),
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(config.vector_size as usize)),
    };
    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        "Embedding client initialized"
    );
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalised() {
        let client = HashEmbeddingClient::new(64);
        let first = client
            .generate_embeddings(vec!["Hello world".into(), "other".into()])
            .await
            .expect("embeddings");
        let second = client
            .generate_embeddings(vec!["Hello world".into()])
            .await
            .expect("embeddings");

        assert_eq!(first.len(), 2);
        assert_eq!(first[0], second[0]);
        assert_ne!(first[0], first[1]);
        assert_eq!(first[0].len(), 64);
        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn hash_embedder_rejects_zero_dimension() {
        let client = HashEmbeddingClient::new(0);
        let err = client
            .generate_embeddings(vec!["text".into()])
            .await
            .expect_err("zero dimension");
        assert!(matches!(err, EmbeddingClientError::GenerationFailed(_)));
    }

    #[test]
    fn only_network_class_errors_are_transient() {
        assert!(EmbeddingClientError::Transport("timeout".into()).is_transient());
        assert!(
            EmbeddingClientError::ProviderStatus {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !EmbeddingClientError::ProviderStatus {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!EmbeddingClientError::InvalidResponse("bad".into()).is_transient());
    }
}
