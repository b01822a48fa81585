use crate::qdrant::Distance;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

const DEFAULT_QDRANT_HOST: &str = "127.0.0.1";
const DEFAULT_QDRANT_PORT: u16 = 6333;
const DEFAULT_COLLECTION: &str = "documents";
const DEFAULT_VECTOR_SIZE: u64 = 384;
const DEFAULT_TEXT_KEY: &str = "text";
const DEFAULT_EMBEDDING_MODEL: &str = "bge-small-en-v1.5";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Runtime configuration shared by the HTTP server and the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hostname of the Qdrant service.
    pub qdrant_host: String,
    /// REST port of the Qdrant service.
    pub qdrant_port: u16,
    /// Optional full base URL; takes precedence over host and port.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Collection used when a request does not name one.
    pub collection_name: String,
    /// Vector size used when a collection is created without an explicit size.
    pub vector_size: u64,
    /// Distance metric used when a collection is created without an explicit metric.
    pub distance: Distance,
    /// Default record field holding the text to embed in JSON ingestion.
    pub text_key: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Number of texts sent to the embedding provider per request.
    pub embedding_batch_size: usize,
    /// Number of points sent to Qdrant per upsert request.
    pub upsert_batch_size: usize,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout_secs: u64,
    /// Upper bound on attempts for transient embedding and upsert failures.
    pub retry_max_attempts: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline hashing embedder.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            qdrant_host: load_env_optional("QDRANT__SERVICE__HOST")
                .unwrap_or_else(|| DEFAULT_QDRANT_HOST.to_string()),
            qdrant_port: parse_env("QDRANT__SERVICE__PORT")?.unwrap_or(DEFAULT_QDRANT_PORT),
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT__SERVICE__API_KEY"),
            collection_name: load_env_optional("COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            vector_size: parse_env("VECTOR_SIZE")?.unwrap_or(DEFAULT_VECTOR_SIZE),
            distance: parse_env("DISTANCE")?.unwrap_or_default(),
            text_key: load_env_optional("TEXT_KEY").unwrap_or_else(|| DEFAULT_TEXT_KEY.to_string()),
            embedding_provider: parse_env("EMBEDDING_PROVIDER")?
                .unwrap_or(EmbeddingProvider::Hash),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            embedding_batch_size: parse_env("EMBEDDING_BATCH_SIZE")?.unwrap_or(16),
            upsert_batch_size: parse_env("UPSERT_BATCH_SIZE")?.unwrap_or(64),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS")?.unwrap_or(30),
            retry_max_attempts: parse_env("RETRY_MAX_ATTEMPTS")?.unwrap_or(3),
            server_port: parse_env("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Base URL of the Qdrant REST API.
    pub fn qdrant_base_url(&self) -> String {
        match &self.qdrant_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}", self.qdrant_host, self.qdrant_port),
        }
    }

    /// Timeout applied to outbound HTTP requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vector_size == 0 {
            return Err(ConfigError::InvalidValue("VECTOR_SIZE".into()));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        if self.upsert_batch_size == 0 {
            return Err(ConfigError::InvalidValue("UPSERT_BATCH_SIZE".into()));
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("RETRY_MAX_ATTEMPTS".into()));
        }
        if self.text_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("TEXT_KEY".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_host: DEFAULT_QDRANT_HOST.to_string(),
            qdrant_port: DEFAULT_QDRANT_PORT,
            qdrant_url: None,
            qdrant_api_key: None,
            collection_name: DEFAULT_COLLECTION.to_string(),
            vector_size: DEFAULT_VECTOR_SIZE,
            distance: Distance::Cosine,
            text_key: DEFAULT_TEXT_KEY.to_string(),
            embedding_provider: EmbeddingProvider::Hash,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_batch_size: 16,
            upsert_batch_size: 64,
            request_timeout_secs: 30,
            retry_max_attempts: 3,
            server_port: None,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Load `.env` (when present) and read the configuration from the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_base_url(),
        collection = %config.collection_name,
        vector_size = config.vector_size,
        distance = %config.distance,
        embedding_provider = ?config.embedding_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_prefers_explicit_url() {
        let config = Config {
            qdrant_url: Some("https://qdrant.example:6333".into()),
            ..Config::default()
        };
        assert_eq!(config.qdrant_base_url(), "https://qdrant.example:6333");
    }

    #[test]
    fn base_url_is_built_from_host_and_port() {
        let config = Config {
            qdrant_host: "qdrant".into(),
            qdrant_port: 7000,
            ..Config::default()
        };
        assert_eq!(config.qdrant_base_url(), "http://qdrant:7000");
    }

    #[test]
    fn embedding_provider_parses_case_insensitively() {
        assert_eq!("Ollama".parse(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("HASH".parse(), Ok(EmbeddingProvider::Hash));
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_sizes() {
        let config = Config {
            upsert_batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(key)) if key == "UPSERT_BATCH_SIZE"
        ));
    }

    #[test]
    fn validate_rejects_blank_text_key() {
        let config = Config {
            text_key: "   ".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(key)) if key == "TEXT_KEY"
        ));
    }
}
