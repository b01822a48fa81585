//! Storage seam between the ingestion workflows and the vector database.

use crate::qdrant::{
    filters::TenantFilter,
    types::{
        CollectionInfo, CollectionParams, CollectionStatus, PointInsert, QdrantError, ScoredPoint,
        UpsertSummary,
    },
};
use async_trait::async_trait;

/// Operations the ingestion service needs from a vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotently create a collection with the given vector configuration.
    async fn create_collection(
        &self,
        params: &CollectionParams,
    ) -> Result<CollectionStatus, QdrantError>;

    /// Describe a collection, `None` when missing.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, QdrantError>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>, QdrantError>;

    /// Drop a collection and every point in it.
    async fn delete_collection(&self, name: &str) -> Result<bool, QdrantError>;

    /// Insert or replace points by id.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<PointInsert>,
    ) -> Result<UpsertSummary, QdrantError>;

    /// Tenant-scoped nearest-neighbour search.
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        filter: &TenantFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError>;

    /// Remove every point matching the filter.
    async fn delete_tenant_points(
        &self,
        collection: &str,
        filter: &TenantFilter,
    ) -> Result<(), QdrantError>;
}
