//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod payload;
pub mod store;
pub mod types;

pub use client::QdrantService;
pub use filters::{TenantFilter, build_tenant_filter};
pub use payload::{Payload, PayloadError, point_id_for_file, point_id_for_record};
pub use store::VectorStore;
pub use types::{
    CollectionInfo, CollectionParams, CollectionStatus, Distance, PointId, PointInsert,
    QdrantError, ScoredPoint, UpsertSummary,
};
