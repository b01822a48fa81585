//! Ingestion workflows: PDF folders and JSON records into tenant-tagged Qdrant points.

mod service;
pub mod types;

pub use service::{IngestApi, IngestService};
pub use types::{
    DEFAULT_SEARCH_LIMIT, IngestError, IngestOptions, IngestReport, ItemOutcome,
    JsonIngestRequest, MAX_SEARCH_LIMIT, MalformedRecordError, PdfIngestRequest, SearchRequest,
    SkipReason,
};
