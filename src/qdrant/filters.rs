//! Payload filter helpers for tenant-scoped queries and deletes.

use serde_json::{Value, json};

/// Payload constraints applied to search and delete requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantFilter {
    /// Exact match on `tenant_id`; always required.
    pub tenant_id: String,
    /// Optional exact match on `category`.
    pub category: Option<String>,
    /// Optional exact match on `subcategory`.
    pub subcategory: Option<String>,
}

impl TenantFilter {
    /// Filter matching every point owned by `tenant_id`.
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }
}

/// Compose the Qdrant `must` filter for a tenant and optional grouping labels.
pub fn build_tenant_filter(filter: &TenantFilter) -> Value {
    let mut must = vec![match_value("tenant_id", filter.tenant_id.trim())];

    if let Some(category) = filter.category.as_deref().and_then(non_empty) {
        must.push(match_value("category", category));
    }

    if let Some(subcategory) = filter.subcategory.as_deref().and_then(non_empty) {
        must.push(match_value("subcategory", subcategory));
    }

    json!({ "must": must })
}

fn match_value(key: &str, value: &str) -> Value {
    json!({
        "key": key,
        "match": { "value": value }
    })
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_only_filter() {
        let filter = build_tenant_filter(&TenantFilter::tenant("tenantA"));
        assert_eq!(
            filter,
            json!({ "must": [{ "key": "tenant_id", "match": { "value": "tenantA" } }] })
        );
    }

    #[test]
    fn grouping_labels_are_added_when_present() {
        let filter = build_tenant_filter(&TenantFilter {
            tenant_id: "t1".into(),
            category: Some("finance".into()),
            subcategory: Some("  ".into()),
        });
        let must = filter["must"].as_array().expect("must array");
        assert_eq!(must.len(), 2);
        assert_eq!(must[1]["key"], "category");
        assert_eq!(must[1]["match"]["value"], "finance");
    }
}
