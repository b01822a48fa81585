//! Tenant-tagged payload records and deterministic point identifiers.

use crate::qdrant::types::PointId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building a payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// `tenant_id` was empty or whitespace.
    #[error("tenant_id must not be empty")]
    EmptyTenant,
    /// `source` was empty or whitespace.
    #[error("source must not be empty")]
    EmptySource,
}

/// Metadata stored alongside every vector.
///
/// `tenant_id` and `source` are always present; `category` and `subcategory` group documents
/// further (folders, tags) and are omitted from the stored JSON when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Owner of the vector; the field filtered on at query time.
    pub tenant_id: String,
    /// Origin of the text, e.g. the PDF file name.
    pub source: String,
    /// Optional coarse grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Optional grouping within `category`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

impl Payload {
    /// Build a payload for `tenant_id` and `source`, trimming both.
    pub fn new(tenant_id: &str, source: &str) -> Result<Self, PayloadError> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(PayloadError::EmptyTenant);
        }
        let source = source.trim();
        if source.is_empty() {
            return Err(PayloadError::EmptySource);
        }
        Ok(Self {
            tenant_id: tenant_id.to_string(),
            source: source.to_string(),
            category: None,
            subcategory: None,
        })
    }

    /// Attach a category; blank values leave the field unset.
    #[must_use]
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = sanitize_label(category);
        self
    }

    /// Attach a subcategory; blank values leave the field unset.
    #[must_use]
    pub fn with_subcategory(mut self, subcategory: Option<&str>) -> Self {
        self.subcategory = sanitize_label(subcategory);
        self
    }
}

fn sanitize_label(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Map a caller-supplied record id onto a Qdrant-compatible point id.
///
/// Only the canonical decimal form of an unsigned integer becomes a numeric id, so `"01"` and
/// `" 1"` never alias `"1"`. UUIDs pass through in hyphenated lowercase; any other string is
/// mapped to a UUIDv5 so the same record id always addresses the same point.
pub fn point_id_for_record(raw: &str) -> PointId {
    if let Ok(number) = raw.parse::<u64>()
        && number.to_string() == raw
    {
        return PointId::Num(number);
    }
    if let Ok(uuid) = Uuid::parse_str(raw) {
        return PointId::Uuid(uuid.hyphenated().to_string());
    }
    PointId::Uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()).to_string())
}

/// Deterministic point id for a file ingested on behalf of a tenant.
pub fn point_id_for_file(tenant_id: &str, file_name: &str) -> PointId {
    let name = format!("{tenant_id}/{file_name}");
    PointId::Uuid(Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).to_string())
}
