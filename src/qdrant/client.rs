//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::{
    filters::{TenantFilter, build_tenant_filter},
    store::VectorStore,
    types::{
        CollectionInfo, CollectionInfoResponse, CollectionParams, CollectionStatus,
        ListCollectionsResponse, PointId, PointInsert, QdrantError, QueryResponse,
        QueryResponseResult, RetrieveResponse, ScoredPoint, UpsertSummary, VectorsConfig,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{Value, json};
use std::collections::HashSet;

/// Lightweight HTTP client for Qdrant operations.
///
/// Construct once per process; the underlying `reqwest::Client` pools connections and is safe to
/// share across tasks.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("vectorloader/0.1")
            .timeout(config.request_timeout())
            .build()?;

        let base_url =
            normalize_base_url(&config.qdrant_base_url()).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Ensure a collection exists with exactly the requested vector size and distance.
    ///
    /// Calling this repeatedly with the same parameters is a no-op; differing parameters on an
    /// existing collection yield [`QdrantError::CollectionConflict`] and nothing is modified.
    pub async fn create_collection(
        &self,
        params: &CollectionParams,
    ) -> Result<CollectionStatus, QdrantError> {
        params.validate()?;

        if let Some(existing) = self.collection_info(&params.name).await? {
            return existing_status(params, &existing);
        }

        let body = json!({
            "vectors": {
                "size": params.vector_size,
                "distance": params.distance.as_qdrant_str(),
            }
        });

        let response = self
            .request(Method::PUT, &["collections", params.name.as_str()])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            if status == StatusCode::CONFLICT || error.to_string().contains("already exists") {
                tracing::debug!(
                    collection = %params.name,
                    "Collection was created concurrently; re-reading its parameters"
                );
                return match self.collection_info(&params.name).await? {
                    Some(existing) => existing_status(params, &existing),
                    None => Err(error),
                };
            }
            tracing::error!(error = %error, "Qdrant request failed");
            return Err(error);
        }

        self.ensure_success(response, || {
            tracing::info!(
                collection = %params.name,
                vector_size = params.vector_size,
                distance = %params.distance,
                "Collection created"
            );
        })
        .await?;

        Ok(CollectionStatus::Created)
    }

    /// Describe a collection, returning `None` when it does not exist.
    pub async fn collection_info(
        &self,
        collection_name: &str,
    ) -> Result<Option<CollectionInfo>, QdrantError> {
        let response = self
            .request(Method::GET, &["collections", collection_name])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let CollectionInfoResponse { result } = response.json().await?;
                let (vector_size, distance) = match result.config.params.vectors {
                    Some(VectorsConfig::Single(params)) => {
                        (Some(params.size), Some(params.distance))
                    }
                    Some(VectorsConfig::Named(_)) | None => (None, None),
                };
                Ok(Some(CollectionInfo {
                    name: collection_name.to_string(),
                    status: result.status.unwrap_or_else(|| "unknown".to_string()),
                    points_count: result.points_count,
                    vector_size,
                    distance,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, QdrantError> {
        let response = self.request(Method::GET, &["collections"]).send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            let names = payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect();
            Ok(names)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Drop a collection. Returns `false` when Qdrant reports nothing was deleted.
    pub async fn delete_collection(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::DELETE, &["collections", collection_name])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Failed to delete collection");
            return Err(error);
        }

        let body: Value = response.json().await?;
        let deleted = body["result"].as_bool().unwrap_or(false);
        tracing::info!(collection = collection_name, deleted, "Collection delete requested");
        Ok(deleted)
    }

    /// Insert or replace points by id, reporting which ids were new.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointInsert>,
    ) -> Result<UpsertSummary, QdrantError> {
        if points.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let ids: Vec<PointId> = points.iter().map(|point| point.id.clone()).collect();
        let existing = self.existing_ids(collection_name, &ids).await?;
        let updated = ids.iter().filter(|id| existing.contains(*id)).count();
        let point_count = points.len();

        let response = self
            .request(Method::PUT, &["collections", collection_name, "points"])
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                updated,
                "Points upserted"
            );
        })
        .await?;

        Ok(UpsertSummary {
            inserted: point_count - updated,
            updated,
        })
    }

    /// Return the subset of `ids` already stored in the collection.
    pub async fn existing_ids(
        &self,
        collection_name: &str,
        ids: &[PointId],
    ) -> Result<HashSet<PointId>, QdrantError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let response = self
            .request(Method::POST, &["collections", collection_name, "points"])
            .json(&json!({
                "ids": ids,
                "with_payload": false,
                "with_vector": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Failed to retrieve points");
            return Err(error);
        }

        let RetrieveResponse { result } = response.json().await?;
        Ok(result.into_iter().map(|point| point.id).collect())
    }

    /// Delete every point matching the tenant filter.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        filter: &TenantFilter,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &["collections", collection_name, "points", "delete"],
            )
            .query(&[("wait", true)])
            .json(&json!({ "filter": build_tenant_filter(filter) }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(
                collection = collection_name,
                tenant_id = %filter.tenant_id,
                "Tenant points deleted"
            );
        })
        .await
    }

    /// Perform a tenant-scoped similarity search, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: &TenantFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": build_tenant_filter(filter),
        });

        let response = self
            .request(
                Method::POST,
                &["collections", collection_name, "points", "query"],
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    /// Build a request for the given path segments; each segment is percent-encoded.
    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let url = endpoint(&self.base_url, segments);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn create_collection(
        &self,
        params: &CollectionParams,
    ) -> Result<CollectionStatus, QdrantError> {
        QdrantService::create_collection(self, params).await
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, QdrantError> {
        QdrantService::collection_info(self, name).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, QdrantError> {
        QdrantService::list_collections(self).await
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, QdrantError> {
        QdrantService::delete_collection(self, name).await
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<PointInsert>,
    ) -> Result<UpsertSummary, QdrantError> {
        self.upsert_points(collection, points).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        filter: &TenantFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        self.search_points(collection, vector, filter, limit).await
    }

    async fn delete_tenant_points(
        &self,
        collection: &str,
        filter: &TenantFilter,
    ) -> Result<(), QdrantError> {
        self.delete_points(collection, filter).await
    }
}

/// Compare an existing collection against the requested parameters.
fn existing_status(
    params: &CollectionParams,
    existing: &CollectionInfo,
) -> Result<CollectionStatus, QdrantError> {
    if existing.matches(params) {
        tracing::info!(collection = %params.name, "Collection already exists");
        return Ok(CollectionStatus::AlreadyExists);
    }
    let error = QdrantError::CollectionConflict {
        name: params.name.clone(),
        existing: existing.describe_vectors(),
        requested: params.clone(),
    };
    tracing::warn!(error = %error, "Refusing to overwrite collection");
    Err(error)
}

fn normalize_base_url(url: &str) -> Result<Url, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    if parsed.cannot_be_a_base() {
        return Err(format!("'{url}' cannot be used as a base URL"));
    }
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed)
}

fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // normalize_base_url rejects cannot-be-a-base URLs, so segments are always available.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
