//! Ingestion service coordinating extraction, embedding, and vector store writes.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client},
    extract::extract_pdf_text_async,
    ingest::types::{
        DEFAULT_SEARCH_LIMIT, IngestError, IngestOptions, IngestReport, ItemOutcome,
        JsonIngestRequest, MAX_SEARCH_LIMIT, MalformedRecordError, PdfIngestRequest,
        SearchRequest, SkipReason,
    },
    metrics::{IngestMetrics, MetricsSnapshot},
    qdrant::{
        CollectionInfo, CollectionParams, CollectionStatus, Distance, Payload, PointId,
        PointInsert, QdrantService, ScoredPoint, TenantFilter, VectorStore, point_id_for_file,
        point_id_for_record,
    },
    retry::with_retry,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Coordinates the ingestion workflows: source reading, embedding, payload tagging and upserts.
///
/// The service owns long-lived handles to the embedding client, the vector store and the metrics
/// registry so the HTTP surface and the CLI reuse the same components. Construct it once near
/// process start and share it through an `Arc`.
pub struct IngestService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    options: IngestOptions,
    metrics: Arc<IngestMetrics>,
}

/// Abstraction over the ingestion service used by the HTTP router.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Idempotently create a collection, falling back to configured defaults.
    async fn create_collection(
        &self,
        name: &str,
        vector_size: Option<u64>,
        distance: Option<Distance>,
    ) -> Result<CollectionStatus, IngestError>;

    /// Enumerate collections in the store.
    async fn list_collections(&self) -> Result<Vec<String>, IngestError>;

    /// Describe a single collection.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, IngestError>;

    /// Drop a collection.
    async fn delete_collection(&self, name: &str) -> Result<bool, IngestError>;

    /// Ingest every PDF in a folder for a tenant.
    async fn ingest_pdf_folder(
        &self,
        request: PdfIngestRequest,
    ) -> Result<IngestReport, IngestError>;

    /// Ingest in-memory JSON records for a tenant.
    async fn ingest_json_records(
        &self,
        request: JsonIngestRequest,
    ) -> Result<IngestReport, IngestError>;

    /// Tenant-scoped similarity search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, IngestError>;

    /// Remove every point a tenant owns in a collection.
    async fn delete_tenant_points(
        &self,
        collection: &str,
        tenant_id: &str,
    ) -> Result<(), IngestError>;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Item that passed source validation and still needs a vector.
struct PendingItem {
    slot: usize,
    id: PointId,
    text: String,
    payload: Payload,
}

/// Item with a vector, waiting for its upsert batch.
struct EmbeddedItem {
    slot: usize,
    point: PointInsert,
}

impl IngestService {
    /// Assemble a service from already-built collaborators.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Build the Qdrant client and embedding provider described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, IngestError> {
        tracing::info!("Initializing Qdrant client");
        let store: Arc<dyn VectorStore> = Arc::new(QdrantService::new(config)?);
        let embedder = build_embedding_client(config)?;
        Ok(Self::new(store, embedder, IngestOptions::from_config(config)))
    }

    /// Idempotently create `name` with explicit or default vector parameters.
    pub async fn create_collection(
        &self,
        name: &str,
        vector_size: Option<u64>,
        distance: Option<Distance>,
    ) -> Result<CollectionStatus, IngestError> {
        let params = CollectionParams::new(
            name.trim(),
            vector_size.unwrap_or(self.options.vector_size),
            distance.unwrap_or(self.options.distance),
        );
        let status = self.store.create_collection(&params).await?;
        if status == CollectionStatus::Created {
            self.metrics.record_collection_created();
        }
        Ok(status)
    }

    /// Load every PDF in `folder` into `collection`, tagging each with `group_id` as tenant.
    pub async fn process_pdfs_and_load_to_qdrant(
        &self,
        folder: impl AsRef<Path>,
        collection: &str,
        group_id: &str,
    ) -> Result<IngestReport, IngestError> {
        self.ingest_pdf_folder(PdfIngestRequest {
            folder: folder.as_ref().to_path_buf(),
            collection: collection.to_string(),
            tenant_id: group_id.to_string(),
            category: None,
            subcategory: None,
        })
        .await
    }

    /// Load every PDF directly inside the request folder, one point per file.
    ///
    /// Files are visited in file-name order. Unreadable files and files without text are
    /// reported as skipped; a missing folder aborts the run before anything is written.
    pub async fn ingest_pdf_folder(
        &self,
        request: PdfIngestRequest,
    ) -> Result<IngestReport, IngestError> {
        let PdfIngestRequest {
            folder,
            collection,
            tenant_id,
            category,
            subcategory,
        } = request;
        let tenant_id = require_tenant(&tenant_id)?;
        let collection = self.require_collection(&collection).await?;
        let files = list_pdf_files(&folder)?;
        tracing::info!(
            folder = %folder.display(),
            collection = %collection,
            tenant_id = %tenant_id,
            files = files.len(),
            "Ingesting PDF folder"
        );

        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; files.len()];
        let mut pending = Vec::with_capacity(files.len());

        for (slot, path) in files.into_iter().enumerate() {
            let file_name = file_name_of(&path);
            let text = match extract_pdf_text_async(path).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(file = %file_name, error = %err, "Skipping unreadable PDF");
                    outcomes[slot] = Some(skipped(
                        &file_name,
                        SkipReason::Extraction(err.to_string()),
                    ));
                    continue;
                }
            };
            if text.trim().is_empty() {
                tracing::warn!(file = %file_name, "Skipping PDF without extractable text");
                outcomes[slot] = Some(skipped(&file_name, SkipReason::EmptyText));
                continue;
            }

            let payload = match Payload::new(&tenant_id, &file_name) {
                Ok(payload) => payload
                    .with_category(category.as_deref())
                    .with_subcategory(subcategory.as_deref()),
                Err(err) => {
                    outcomes[slot] = Some(skipped(
                        &file_name,
                        SkipReason::Malformed(err.to_string()),
                    ));
                    continue;
                }
            };
            pending.push(PendingItem {
                slot,
                id: point_id_for_file(&tenant_id, &file_name),
                text,
                payload,
            });
        }

        let report = self
            .embed_and_store(&collection, &tenant_id, pending, outcomes)
            .await;
        Ok(report)
    }

    /// Embed `records` into `collection` for `tenant_id`, reading text from `text_key`.
    pub async fn create_embeddings_from_json(
        &self,
        records: Vec<Map<String, Value>>,
        collection: &str,
        tenant_id: &str,
        text_key: &str,
    ) -> Result<IngestReport, IngestError> {
        self.ingest_json_records(JsonIngestRequest {
            records,
            collection: collection.to_string(),
            tenant_id: tenant_id.to_string(),
            text_key: Some(text_key.to_string()),
        })
        .await
    }

    /// Embed in-memory JSON records, one point per record.
    ///
    /// Records missing an id or the text field are reported as skipped and never reach the
    /// embedding provider.
    pub async fn ingest_json_records(
        &self,
        request: JsonIngestRequest,
    ) -> Result<IngestReport, IngestError> {
        let JsonIngestRequest {
            records,
            collection,
            tenant_id,
            text_key,
        } = request;
        let tenant_id = require_tenant(&tenant_id)?;
        let collection = self.require_collection(&collection).await?;
        let text_key = text_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| self.options.text_key.clone());
        tracing::info!(
            collection = %collection,
            tenant_id = %tenant_id,
            records = records.len(),
            text_key = %text_key,
            "Ingesting JSON records"
        );

        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; records.len()];
        let mut pending = Vec::with_capacity(records.len());
        let mut claimed: HashMap<PointId, usize> = HashMap::new();

        for (slot, record) in records.iter().enumerate() {
            let parsed = match parse_record(slot, record, &text_key) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed record");
                    let label = record_label(slot, record);
                    outcomes[slot] =
                        Some(skipped(&label, SkipReason::Malformed(err.to_string())));
                    continue;
                }
            };
            let source = string_field(record, "source")
                .map(str::to_string)
                .unwrap_or_else(|| format!("json:{}", parsed.id));
            if parsed.text.trim().is_empty() {
                tracing::warn!(record = %parsed.id, "Skipping record with empty text");
                outcomes[slot] = Some(skipped(&source, SkipReason::EmptyText));
                continue;
            }

            let payload = match Payload::new(&tenant_id, &source) {
                Ok(payload) => payload
                    .with_category(string_field(record, "category"))
                    .with_subcategory(string_field(record, "subcategory")),
                Err(err) => {
                    outcomes[slot] =
                        Some(skipped(&source, SkipReason::Malformed(err.to_string())));
                    continue;
                }
            };
            let id = point_id_for_record(&parsed.id);
            if let Some(&first_index) = claimed.get(&id) {
                let err = MalformedRecordError::DuplicateId {
                    id: parsed.id,
                    point: id.to_string(),
                    first_index,
                };
                tracing::warn!(error = %err, "Skipping duplicate record");
                outcomes[slot] = Some(skipped(&source, SkipReason::Malformed(err.to_string())));
                continue;
            }
            claimed.insert(id.clone(), slot);
            pending.push(PendingItem {
                slot,
                id,
                text: parsed.text,
                payload,
            });
        }

        let report = self
            .embed_and_store(&collection, &tenant_id, pending, outcomes)
            .await;
        Ok(report)
    }

    /// Embed the query and return the nearest points owned by the tenant.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, IngestError> {
        let SearchRequest {
            collection,
            query,
            tenant_id,
            limit,
            category,
            subcategory,
        } = request;
        let tenant_id = require_tenant(&tenant_id)?;
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(IngestError::EmptyCollection);
        }
        if query.trim().is_empty() {
            return Err(IngestError::EmptyQuery);
        }
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        let mut vectors = with_retry(&self.options.retry, "embed_query", || {
            self.embedder.generate_embeddings(vec![query.clone()])
        })
        .await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::InvalidResponse(
                "provider returned no vector for the query".into(),
            )
        })?;

        let filter = TenantFilter {
            tenant_id: tenant_id.clone(),
            category,
            subcategory,
        };
        let hits = self.store.search(collection, vector, &filter, limit).await?;
        tracing::info!(
            collection,
            tenant_id = %tenant_id,
            limit,
            hits = hits.len(),
            "Search completed"
        );
        Ok(hits)
    }

    /// Remove every point owned by `tenant_id` from `collection`.
    pub async fn delete_tenant_points(
        &self,
        collection: &str,
        tenant_id: &str,
    ) -> Result<(), IngestError> {
        let tenant_id = require_tenant(tenant_id)?;
        let collection = self.require_collection(collection).await?;
        self.store
            .delete_tenant_points(&collection, &TenantFilter::tenant(&tenant_id))
            .await?;
        tracing::info!(collection = %collection, tenant_id = %tenant_id, "Tenant points deleted");
        Ok(())
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn require_collection(&self, name: &str) -> Result<String, IngestError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IngestError::EmptyCollection);
        }
        match self.store.collection_info(name).await? {
            Some(_) => Ok(name.to_string()),
            None => Err(IngestError::CollectionNotFound(name.to_string())),
        }
    }

    async fn embed_and_store(
        &self,
        collection: &str,
        tenant_id: &str,
        pending: Vec<PendingItem>,
        mut outcomes: Vec<Option<ItemOutcome>>,
    ) -> IngestReport {
        let embedded = self.embed_pending(pending, &mut outcomes).await;

        let mut inserted = 0;
        let mut updated = 0;
        for batch in embedded.chunks(self.options.upsert_batch_size) {
            let points: Vec<PointInsert> = batch.iter().map(|item| item.point.clone()).collect();
            match with_retry(&self.options.retry, "upsert", || {
                self.store.upsert(collection, points.clone())
            })
            .await
            {
                Ok(summary) => {
                    inserted += summary.inserted;
                    updated += summary.updated;
                    for item in batch {
                        outcomes[item.slot] = Some(ItemOutcome::Stored {
                            id: item.point.id.clone(),
                            source: item.point.payload.source.clone(),
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        collection,
                        points = batch.len(),
                        error = %err,
                        "Upsert batch rejected; skipping its items"
                    );
                    for item in batch {
                        outcomes[item.slot] = Some(skipped(
                            &item.point.payload.source,
                            SkipReason::Upsert(err.to_string()),
                        ));
                    }
                }
            }
        }

        let report = IngestReport {
            collection: collection.to_string(),
            tenant_id: tenant_id.to_string(),
            items: outcomes.into_iter().flatten().collect(),
            inserted,
            updated,
        };
        self.metrics.record_report(&report);
        tracing::info!(
            collection,
            tenant_id,
            stored = report.stored_count(),
            skipped = report.skipped_count(),
            inserted,
            updated,
            "Ingestion finished"
        );
        report
    }

    async fn embed_pending(
        &self,
        pending: Vec<PendingItem>,
        outcomes: &mut [Option<ItemOutcome>],
    ) -> Vec<EmbeddedItem> {
        let mut embedded = Vec::with_capacity(pending.len());
        let mut pending = pending.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<PendingItem> = pending
                .by_ref()
                .take(self.options.embedding_batch_size)
                .collect();
            let texts: Vec<String> = batch.iter().map(|item| item.text.clone()).collect();

            let result = with_retry(&self.options.retry, "embed", || {
                self.embedder.generate_embeddings(texts.clone())
            })
            .await
            .and_then(|vectors| {
                if vectors.len() == batch.len() {
                    Ok(vectors)
                } else {
                    Err(EmbeddingClientError::InvalidResponse(format!(
                        "expected {} vectors, got {}",
                        batch.len(),
                        vectors.len()
                    )))
                }
            });

            match result {
                Ok(vectors) => {
                    for (item, vector) in batch.into_iter().zip(vectors) {
                        embedded.push(EmbeddedItem {
                            slot: item.slot,
                            point: PointInsert {
                                id: item.id,
                                vector,
                                payload: item.payload,
                            },
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        items = batch.len(),
                        error = %err,
                        "Embedding batch failed; skipping its items"
                    );
                    for item in batch {
                        outcomes[item.slot] = Some(skipped(
                            &item.payload.source,
                            SkipReason::Embedding(err.to_string()),
                        ));
                    }
                }
            }
        }

        embedded
    }
}

#[async_trait]
impl IngestApi for IngestService {
    async fn create_collection(
        &self,
        name: &str,
        vector_size: Option<u64>,
        distance: Option<Distance>,
    ) -> Result<CollectionStatus, IngestError> {
        IngestService::create_collection(self, name, vector_size, distance).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, IngestError> {
        Ok(self.store.list_collections().await?)
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, IngestError> {
        Ok(self.store.collection_info(name).await?)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IngestError> {
        Ok(self.store.delete_collection(name).await?)
    }

    async fn ingest_pdf_folder(
        &self,
        request: PdfIngestRequest,
    ) -> Result<IngestReport, IngestError> {
        IngestService::ingest_pdf_folder(self, request).await
    }

    async fn ingest_json_records(
        &self,
        request: JsonIngestRequest,
    ) -> Result<IngestReport, IngestError> {
        IngestService::ingest_json_records(self, request).await
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, IngestError> {
        IngestService::search(self, request).await
    }

    async fn delete_tenant_points(
        &self,
        collection: &str,
        tenant_id: &str,
    ) -> Result<(), IngestError> {
        IngestService::delete_tenant_points(self, collection, tenant_id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestService::metrics_snapshot(self)
    }
}

struct ParsedRecord {
    id: String,
    text: String,
}

fn parse_record(
    index: usize,
    record: &Map<String, Value>,
    text_key: &str,
) -> Result<ParsedRecord, MalformedRecordError> {
    let id = match record.get("id") {
        None | Some(Value::Null) => return Err(MalformedRecordError::MissingId { index }),
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(Value::Number(number)) if number.is_u64() => number.to_string(),
        Some(other) => {
            return Err(MalformedRecordError::InvalidId {
                index,
                value: other.to_string(),
            });
        }
    };

    let text = match record.get(text_key) {
        None | Some(Value::Null) => {
            return Err(MalformedRecordError::MissingText {
                id,
                text_key: text_key.to_string(),
            });
        }
        Some(Value::String(text)) => text.clone(),
        Some(_) => {
            return Err(MalformedRecordError::InvalidText {
                id,
                text_key: text_key.to_string(),
            });
        }
    };

    Ok(ParsedRecord { id, text })
}

fn record_label(index: usize, record: &Map<String, Value>) -> String {
    match record.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => format!("json:{id}"),
        Some(Value::Number(number)) => format!("json:{number}"),
        _ => format!("record[{index}]"),
    }
}

fn string_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn require_tenant(tenant_id: &str) -> Result<String, IngestError> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        Err(IngestError::EmptyTenant)
    } else {
        Ok(tenant_id.to_string())
    }
}

fn skipped(source: &str, reason: SkipReason) -> ItemOutcome {
    ItemOutcome::Skipped {
        source: source.to_string(),
        reason,
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular files directly inside `folder` with a `pdf` extension, sorted by file name.
fn list_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let folder_error = |source: std::io::Error| IngestError::Folder {
        path: folder.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(folder).map_err(folder_error)?;
    if !metadata.is_dir() {
        return Err(folder_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(folder_error(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("folder listing failed")
                })));
            }
            Err(err) => {
                tracing::warn!(folder = %folder.display(), error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
