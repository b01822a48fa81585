//! Requests, reports and error definitions for the ingestion workflows.

use crate::{
    config::Config,
    embedding::EmbeddingClientError,
    qdrant::{Distance, PointId, QdrantError},
    retry::RetryPolicy,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a workflow before or during setup.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Tenant identifier was empty or whitespace.
    #[error("tenant_id must not be empty")]
    EmptyTenant,
    /// Collection name was empty or whitespace.
    #[error("collection name must not be empty")]
    EmptyCollection,
    /// Search query text was empty or whitespace.
    #[error("query must not be empty")]
    EmptyQuery,
    /// Source folder does not exist or could not be listed.
    #[error("cannot read folder {path}: {source}")]
    Folder {
        /// Folder that was requested.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Target collection is not present in the store.
    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),
    /// Embedding provider failed outside of a per-item batch (search queries).
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store rejected a setup or pass-through request.
    #[error("Qdrant request failed: {0}")]
    Store(#[from] QdrantError),
}

/// Reasons a JSON record cannot be turned into a document item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedRecordError {
    /// Record has no `id` field.
    #[error("record {index} has no id")]
    MissingId {
        /// Position of the record in the request.
        index: usize,
    },
    /// `id` is neither a non-empty string nor an unsigned integer.
    #[error("record {index} has an invalid id: {value}")]
    InvalidId {
        /// Position of the record in the request.
        index: usize,
        /// Offending JSON value.
        value: String,
    },
    /// Record lacks the configured text field.
    #[error("record '{id}' has no '{text_key}' field")]
    MissingText {
        /// Record identifier.
        id: String,
        /// Text field that was looked up.
        text_key: String,
    },
    /// The text field is present but not a string.
    #[error("record '{id}' field '{text_key}' is not a string")]
    InvalidText {
        /// Record identifier.
        id: String,
        /// Text field that was looked up.
        text_key: String,
    },
    /// Another record earlier in the same request maps to the same point.
    #[error("record '{id}' maps to point {point} already used by record {first_index}")]
    DuplicateId {
        /// Record identifier.
        id: String,
        /// Point id both records map to.
        point: String,
        /// Position of the record that claimed the point first.
        first_index: usize,
    },
}

/// Why an item was left out of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Text could not be extracted from the source file.
    Extraction(String),
    /// Source produced no text to embed.
    EmptyText,
    /// JSON record was missing required fields.
    Malformed(String),
    /// Embedding provider failed for the item's batch.
    Embedding(String),
    /// Vector store rejected the item's upsert batch.
    Upsert(String),
}

/// Final state of a single input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Item was embedded and upserted.
    Stored {
        /// Point id the item was written under.
        id: PointId,
        /// Payload source label.
        source: String,
    },
    /// Item was not written.
    Skipped {
        /// Source label (file name, record id or record position).
        source: String,
        /// Cause of the skip.
        reason: SkipReason,
    },
}

impl ItemOutcome {
    /// Source label of the item regardless of outcome.
    pub fn source(&self) -> &str {
        match self {
            Self::Stored { source, .. } | Self::Skipped { source, .. } => source,
        }
    }
}

/// Per-item summary of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Collection that was written to.
    pub collection: String,
    /// Tenant the items were tagged with.
    pub tenant_id: String,
    /// One entry per input item, in input order.
    pub items: Vec<ItemOutcome>,
    /// Points that did not exist before this run.
    pub inserted: usize,
    /// Points that replaced an existing point with the same id.
    pub updated: usize,
}

impl IngestReport {
    /// Number of items written to the store.
    pub fn stored_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, ItemOutcome::Stored { .. }))
            .count()
    }

    /// Number of items left out.
    pub fn skipped_count(&self) -> usize {
        self.items.len() - self.stored_count()
    }

    /// Ids of stored items, in input order.
    pub fn stored_ids(&self) -> Vec<&PointId> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ItemOutcome::Stored { id, .. } => Some(id),
                ItemOutcome::Skipped { .. } => None,
            })
            .collect()
    }
}

/// Parameters for ingesting a folder of PDF files.
#[derive(Debug, Clone)]
pub struct PdfIngestRequest {
    /// Folder scanned non-recursively for `*.pdf`.
    pub folder: PathBuf,
    /// Target collection; must already exist.
    pub collection: String,
    /// Tenant written into every payload.
    pub tenant_id: String,
    /// Optional category written into every payload.
    pub category: Option<String>,
    /// Optional subcategory written into every payload.
    pub subcategory: Option<String>,
}

/// Parameters for ingesting in-memory JSON records.
#[derive(Debug, Clone)]
pub struct JsonIngestRequest {
    /// Records carrying `id`, the text field and optional grouping labels.
    pub records: Vec<Map<String, Value>>,
    /// Target collection; must already exist.
    pub collection: String,
    /// Tenant written into every payload.
    pub tenant_id: String,
    /// Field holding the text; falls back to the configured default.
    pub text_key: Option<String>,
}

/// Parameters for a tenant-scoped similarity search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Collection to query.
    pub collection: String,
    /// Natural language query text.
    pub query: String,
    /// Only points owned by this tenant are returned.
    pub tenant_id: String,
    /// Maximum number of hits; defaults to [`DEFAULT_SEARCH_LIMIT`].
    pub limit: Option<usize>,
    /// Restrict hits to points carrying this category.
    pub category: Option<String>,
    /// Restrict hits to points carrying this subcategory.
    pub subcategory: Option<String>,
}

/// Hits returned when a search request does not set a limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Upper bound applied to requested search limits.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Tunables shared by every workflow.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Texts per embedding request.
    pub embedding_batch_size: usize,
    /// Points per upsert request.
    pub upsert_batch_size: usize,
    /// Backoff applied to transient embedding and upsert failures.
    pub retry: RetryPolicy,
    /// Vector size used when a collection is created without one.
    pub vector_size: u64,
    /// Distance used when a collection is created without one.
    pub distance: Distance,
    /// Record field holding the text when a request does not name one.
    pub text_key: String,
}

impl IngestOptions {
    /// Derive options from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding_batch_size: config.embedding_batch_size.max(1),
            upsert_batch_size: config.upsert_batch_size.max(1),
            retry: RetryPolicy::new(config.retry_max_attempts),
            vector_size: config.vector_size,
            distance: config.distance,
            text_key: config.text_key.clone(),
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcomes_serialize_with_status_tag() {
        let stored = ItemOutcome::Stored {
            id: PointId::Num(1),
            source: "json:1".into(),
        };
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            json!({ "status": "stored", "id": 1, "source": "json:1" })
        );

        let skipped = ItemOutcome::Skipped {
            source: "scan.pdf".into(),
            reason: SkipReason::EmptyText,
        };
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({ "status": "skipped", "source": "scan.pdf", "reason": { "kind": "empty_text" } })
        );
    }

    #[test]
    fn report_counts_stored_and_skipped() {
        let report = IngestReport {
            collection: "docs".into(),
            tenant_id: "t1".into(),
            items: vec![
                ItemOutcome::Stored {
                    id: PointId::Num(1),
                    source: "a".into(),
                },
                ItemOutcome::Skipped {
                    source: "b".into(),
                    reason: SkipReason::Malformed("no text".into()),
                },
            ],
            inserted: 1,
            updated: 0,
        };
        assert_eq!(report.stored_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.stored_ids(), vec![&PointId::Num(1)]);
        assert_eq!(report.items[1].source(), "b");
    }
}
