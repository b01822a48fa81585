//! Shared types used by the Qdrant client and helpers.

use crate::qdrant::payload::Payload;
use crate::retry::Retryable;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Collection already exists with parameters that differ from the request.
    #[error("Collection '{name}' already exists with {existing}; requested {requested}")]
    CollectionConflict {
        /// Name of the conflicting collection.
        name: String,
        /// Description of the stored vector configuration.
        existing: String,
        /// Parameters the caller asked for.
        requested: CollectionParams,
    },
    /// Collection parameters were rejected before contacting Qdrant.
    #[error("Invalid collection parameters: {0}")]
    InvalidParams(String),
}

impl Retryable for QdrantError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::InvalidUrl(_) | Self::CollectionConflict { .. } | Self::InvalidParams(_) => false,
        }
    }
}

/// Similarity function configured per collection.
///
/// Deserializes from any spelling [`FromStr`](std::str::FromStr) accepts, in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Distance {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean distance.
    Euclidean,
}

impl Distance {
    /// Spelling used by the Qdrant REST API.
    pub const fn as_qdrant_str(self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclidean => "Euclid",
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclidean => "euclidean",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" => Ok(Self::Euclidean),
            other => Err(format!("unsupported distance metric '{other}'")),
        }
    }
}

impl TryFrom<String> for Distance {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Requested shape of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionParams {
    /// Collection name.
    pub name: String,
    /// Dimensionality of every stored vector.
    pub vector_size: u64,
    /// Similarity function.
    pub distance: Distance,
}

impl CollectionParams {
    /// Bundle collection parameters.
    pub fn new(name: impl Into<String>, vector_size: u64, distance: Distance) -> Self {
        Self {
            name: name.into(),
            vector_size,
            distance,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QdrantError> {
        if self.name.trim().is_empty() {
            return Err(QdrantError::InvalidParams(
                "collection name must not be empty".into(),
            ));
        }
        if self.name.contains('/') {
            return Err(QdrantError::InvalidParams(format!(
                "collection name '{}' must not contain '/'",
                self.name
            )));
        }
        if self.vector_size == 0 {
            return Err(QdrantError::InvalidParams(
                "vector size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for CollectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "size={}, distance={}", self.vector_size, self.distance)
    }
}

/// Result of an idempotent create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Collection was missing and has been created.
    Created,
    /// Collection was already present with identical parameters.
    AlreadyExists,
}

/// Summary of a collection as reported by Qdrant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Optimizer/health status (`green`, `yellow`, `red`).
    pub status: String,
    /// Number of stored points, when reported.
    pub points_count: Option<u64>,
    /// Size of the unnamed vector, absent for named-vector collections.
    pub vector_size: Option<u64>,
    /// Distance of the unnamed vector, in Qdrant spelling.
    pub distance: Option<String>,
}

impl CollectionInfo {
    /// Whether the stored vector configuration equals the requested one.
    pub fn matches(&self, params: &CollectionParams) -> bool {
        let distance = self
            .distance
            .as_deref()
            .and_then(|value| value.parse::<Distance>().ok());
        self.vector_size == Some(params.vector_size) && distance == Some(params.distance)
    }

    pub(crate) fn describe_vectors(&self) -> String {
        match (self.vector_size, self.distance.as_deref()) {
            (Some(size), Some(distance)) => format!("size={size}, distance={distance}"),
            _ => "named or unknown vector configuration".to_string(),
        }
    }
}

/// Identifier of a stored point: Qdrant accepts unsigned integers or UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    /// Unsigned integer id.
    Num(u64),
    /// UUID in hyphenated form.
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(value) => write!(f, "{value}"),
            Self::Uuid(value) => f.write_str(value),
        }
    }
}

/// Prepared point ready for upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointInsert {
    /// Point identifier.
    pub id: PointId,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Tenant-tagged metadata.
    pub payload: Payload,
}

/// Summary describing how Qdrant applied an upsert request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Number of ids that did not exist before the request.
    pub inserted: usize,
    /// Number of ids that replaced an existing point.
    pub updated: usize,
}

/// Scored payload returned by Qdrant queries.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResponse {
    pub(crate) result: ListCollectionsResult,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResult {
    pub(crate) collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionDescription {
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfoResult,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResult {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) points_count: Option<u64>,
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionConfigParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfigParams {
    #[serde(default)]
    pub(crate) vectors: Option<VectorsConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum VectorsConfig {
    Single(RawVectorParams),
    Named(HashMap<String, RawVectorParams>),
}

#[derive(Deserialize)]
pub(crate) struct RawVectorParams {
    pub(crate) size: u64,
    pub(crate) distance: String,
}

#[derive(Deserialize)]
pub(crate) struct RetrieveResponse {
    #[serde(default)]
    pub(crate) result: Vec<RetrievedPoint>,
}

#[derive(Deserialize)]
pub(crate) struct RetrievedPoint {
    pub(crate) id: PointId,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
