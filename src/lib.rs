#![deny(missing_docs)]

//! Core library for the tenant-aware vector loader.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF text extraction.
pub mod extract;
/// PDF and JSON ingestion workflows.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
/// Backoff for transient upstream failures.
pub mod retry;
