//! HTTP surface for the vector loader.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /collections` – List Qdrant collections.
//! - `POST /collections` – Create a collection (idempotent; `409` when parameters differ).
//! - `GET /collections/:name` – Describe a collection.
//! - `DELETE /collections/:name` – Drop a collection.
//! - `POST /collections/:name/pdf` – Ingest every PDF in a server-side folder for a tenant.
//! - `POST /collections/:name/json` – Ingest JSON records for a tenant.
//! - `POST /collections/:name/search` – Tenant-scoped similarity search.
//! - `DELETE /collections/:name/tenants/:tenant_id` – Remove every point a tenant owns.
//! - `GET /metrics` – Ingestion counters.
//!
//! The router shares the same [`IngestApi`] implementation as the CLI, so behavior is identical
//! across interfaces.

use crate::ingest::{
    IngestApi, IngestError, IngestReport, JsonIngestRequest, PdfIngestRequest, SearchRequest,
};
use crate::metrics::MetricsSnapshot;
use crate::qdrant::{CollectionInfo, CollectionStatus, Distance, QdrantError, ScoredPoint};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IngestApi + 'static,
{
    Router::new()
        .route(
            "/collections",
            get(list_collections::<S>).post(create_collection::<S>),
        )
        .route(
            "/collections/:name",
            get(collection_info::<S>).delete(delete_collection::<S>),
        )
        .route("/collections/:name/pdf", post(ingest_pdf::<S>))
        .route("/collections/:name/json", post(ingest_json::<S>))
        .route("/collections/:name/search", post(search::<S>))
        .route(
            "/collections/:name/tenants/:tenant_id",
            delete(delete_tenant_points::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Response body for `GET /collections`.
#[derive(Serialize)]
struct CollectionsResponse {
    collections: Vec<String>,
}

async fn list_collections<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<CollectionsResponse>, AppError>
where
    S: IngestApi,
{
    let collections = service.list_collections().await?;
    Ok(Json(CollectionsResponse { collections }))
}

/// Request body for `POST /collections`.
#[derive(Deserialize)]
struct CreateCollectionRequest {
    /// Name of the collection to create.
    name: String,
    /// Optional vector size override (defaults to `VECTOR_SIZE`).
    #[serde(default)]
    vector_size: Option<u64>,
    /// Optional distance override (defaults to `DISTANCE`).
    #[serde(default)]
    distance: Option<Distance>,
}

#[derive(Serialize)]
struct CreateCollectionResponse {
    name: String,
    status: CollectionStatus,
}

/// Create a collection, answering `201` when it was missing and `200` when it already matched.
async fn create_collection<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CreateCollectionResponse>), AppError>
where
    S: IngestApi,
{
    let status = service
        .create_collection(&request.name, request.vector_size, request.distance)
        .await?;
    let code = match status {
        CollectionStatus::Created => StatusCode::CREATED,
        CollectionStatus::AlreadyExists => StatusCode::OK,
    };
    Ok((
        code,
        Json(CreateCollectionResponse {
            name: request.name,
            status,
        }),
    ))
}

async fn collection_info<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<Json<CollectionInfo>, AppError>
where
    S: IngestApi,
{
    match service.collection_info(&name).await? {
        Some(info) => Ok(Json(info)),
        None => Err(AppError(IngestError::CollectionNotFound(name))),
    }
}

async fn delete_collection<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError>
where
    S: IngestApi,
{
    let deleted = service.delete_collection(&name).await?;
    Ok(Json(json!({ "name": name, "deleted": deleted })))
}

/// Request body for `POST /collections/:name/pdf`.
#[derive(Deserialize)]
struct PdfRequest {
    /// Server-side folder scanned for `*.pdf`.
    folder: PathBuf,
    tenant_id: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
}

async fn ingest_pdf<S>(
    State(service): State<Arc<S>>,
    Path(collection): Path<String>,
    Json(request): Json<PdfRequest>,
) -> Result<Json<IngestReport>, AppError>
where
    S: IngestApi,
{
    let report = service
        .ingest_pdf_folder(PdfIngestRequest {
            folder: request.folder,
            collection,
            tenant_id: request.tenant_id,
            category: request.category,
            subcategory: request.subcategory,
        })
        .await?;
    Ok(Json(report))
}

/// Request body for `POST /collections/:name/json`.
#[derive(Deserialize)]
struct JsonRequest {
    records: Vec<Map<String, Value>>,
    tenant_id: String,
    /// Optional text field override (defaults to `TEXT_KEY`).
    #[serde(default)]
    text_key: Option<String>,
}

async fn ingest_json<S>(
    State(service): State<Arc<S>>,
    Path(collection): Path<String>,
    Json(request): Json<JsonRequest>,
) -> Result<Json<IngestReport>, AppError>
where
    S: IngestApi,
{
    let report = service
        .ingest_json_records(JsonIngestRequest {
            records: request.records,
            collection,
            tenant_id: request.tenant_id,
            text_key: request.text_key,
        })
        .await?;
    Ok(Json(report))
}

/// Request body for `POST /collections/:name/search`.
#[derive(Deserialize)]
struct SearchBody {
    query: String,
    tenant_id: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    hits: Vec<ScoredPoint>,
}

async fn search<S>(
    State(service): State<Arc<S>>,
    Path(collection): Path<String>,
    Json(request): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: IngestApi,
{
    let hits = service
        .search(SearchRequest {
            collection,
            query: request.query,
            tenant_id: request.tenant_id,
            limit: request.limit,
            category: request.category,
            subcategory: request.subcategory,
        })
        .await?;
    Ok(Json(SearchResponse { hits }))
}

async fn delete_tenant_points<S>(
    State(service): State<Arc<S>>,
    Path((collection, tenant_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError>
where
    S: IngestApi,
{
    service.delete_tenant_points(&collection, &tenant_id).await?;
    Ok(Json(json!({ "collection": collection, "tenant_id": tenant_id, "deleted": true })))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: IngestApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(IngestError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            IngestError::EmptyTenant | IngestError::EmptyCollection | IngestError::EmptyQuery => {
                StatusCode::BAD_REQUEST
            }
            IngestError::Folder { source, .. } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            IngestError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
            IngestError::Store(QdrantError::CollectionConflict { .. }) => StatusCode::CONFLICT,
            IngestError::Store(QdrantError::InvalidParams(_)) => StatusCode::BAD_REQUEST,
            IngestError::Store(QdrantError::UnexpectedStatus { status, .. })
                if status.as_u16() == StatusCode::NOT_FOUND.as_u16() =>
            {
                StatusCode::NOT_FOUND
            }
            IngestError::Store(_) | IngestError::Embedding(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::warn!(error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::ingest::{
        IngestApi, IngestError, IngestReport, ItemOutcome, JsonIngestRequest, PdfIngestRequest,
        SearchRequest,
    };
    use crate::metrics::MetricsSnapshot;
    use crate::qdrant::{
        CollectionInfo, CollectionParams, CollectionStatus, Distance, PointId, QdrantError,
        ScoredPoint,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug, Clone)]
    enum Call {
        Create(String, Option<u64>, Option<Distance>),
        Pdf(PdfIngestRequest),
        Json(JsonIngestRequest),
        Search(SearchRequest),
        DeleteTenant(String, String),
    }

    #[derive(Default)]
    struct StubIngestService {
        calls: Mutex<Vec<Call>>,
    }

    impl StubIngestService {
        async fn recorded_calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl IngestApi for StubIngestService {
        async fn create_collection(
            &self,
            name: &str,
            vector_size: Option<u64>,
            distance: Option<Distance>,
        ) -> Result<CollectionStatus, IngestError> {
            self.calls
                .lock()
                .await
                .push(Call::Create(name.to_string(), vector_size, distance));
            match (name, vector_size) {
                ("existing", _) => Ok(CollectionStatus::AlreadyExists),
                ("c", Some(768)) => Err(IngestError::Store(QdrantError::CollectionConflict {
                    name: "c".into(),
                    existing: "size=384, distance=Cosine".into(),
                    requested: CollectionParams::new("c", 768, Distance::Cosine),
                })),
                _ => Ok(CollectionStatus::Created),
            }
        }

        async fn list_collections(&self) -> Result<Vec<String>, IngestError> {
            Ok(vec!["docs".into()])
        }

        async fn collection_info(
            &self,
            name: &str,
        ) -> Result<Option<CollectionInfo>, IngestError> {
            Ok((name == "docs").then(|| CollectionInfo {
                name: "docs".into(),
                status: "green".into(),
                points_count: Some(2),
                vector_size: Some(384),
                distance: Some("Cosine".into()),
            }))
        }

        async fn delete_collection(&self, name: &str) -> Result<bool, IngestError> {
            Ok(name == "docs")
        }

        async fn ingest_pdf_folder(
            &self,
            request: PdfIngestRequest,
        ) -> Result<IngestReport, IngestError> {
            self.calls.lock().await.push(Call::Pdf(request.clone()));
            Ok(IngestReport {
                collection: request.collection,
                tenant_id: request.tenant_id,
                items: vec![ItemOutcome::Stored {
                    id: PointId::Uuid("a3c5e1d2-0000-5000-8000-000000000000".into()),
                    source: "hello.pdf".into(),
                }],
                inserted: 1,
                updated: 0,
            })
        }

        async fn ingest_json_records(
            &self,
            request: JsonIngestRequest,
        ) -> Result<IngestReport, IngestError> {
            if request.tenant_id.trim().is_empty() {
                return Err(IngestError::EmptyTenant);
            }
            self.calls.lock().await.push(Call::Json(request.clone()));
            Ok(IngestReport {
                collection: request.collection,
                tenant_id: request.tenant_id,
                ..Default::default()
            })
        }

        async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, IngestError> {
            self.calls.lock().await.push(Call::Search(request));
            Ok(vec![ScoredPoint {
                id: "1".into(),
                score: 0.9,
                payload: json!({ "tenant_id": "t1", "source": "json:1" })
                    .as_object()
                    .cloned(),
            }])
        }

        async fn delete_tenant_points(
            &self,
            collection: &str,
            tenant_id: &str,
        ) -> Result<(), IngestError> {
            if collection != "docs" {
                return Err(IngestError::CollectionNotFound(collection.to_string()));
            }
            self.calls
                .lock()
                .await
                .push(Call::DeleteTenant(collection.to_string(), tenant_id.to_string()));
            Ok(())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                items_stored: 3,
                ..Default::default()
            }
        }
    }

    async fn send(
        service: Arc<StubIngestService>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = create_router(service);
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    #[tokio::test]
    async fn create_collection_maps_status_codes() {
        let service = Arc::new(StubIngestService::default());

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/collections",
            Some(json!({ "name": "fresh", "vector_size": 384, "distance": "dot" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "created");

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/collections",
            Some(json!({ "name": "existing" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "already_exists");

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/collections",
            Some(json!({ "name": "c", "vector_size": 768 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("already exists"));

        let calls = service.recorded_calls().await;
        assert!(matches!(
            &calls[0],
            Call::Create(name, Some(384), Some(Distance::Dot)) if name == "fresh"
        ));
    }

    #[tokio::test]
    async fn pdf_route_forwards_folder_and_tenant() {
        let service = Arc::new(StubIngestService::default());
        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/collections/docs/pdf",
            Some(json!({ "folder": "/data/pdfs", "tenant_id": "tenantA", "category": "reports" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["status"], "stored");
        assert_eq!(body["items"][0]["source"], "hello.pdf");

        let calls = service.recorded_calls().await;
        match &calls[0] {
            Call::Pdf(request) => {
                assert_eq!(request.collection, "docs");
                assert_eq!(request.folder.to_str(), Some("/data/pdfs"));
                assert_eq!(request.tenant_id, "tenantA");
                assert_eq!(request.category.as_deref(), Some("reports"));
                assert_eq!(request.subcategory, None);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn json_route_forwards_records_and_rejects_blank_tenant() {
        let service = Arc::new(StubIngestService::default());
        let (status, _) = send(
            service.clone(),
            Method::POST,
            "/collections/docs/json",
            Some(json!({
                "records": [{ "id": "1", "content": "doc one" }],
                "tenant_id": "t1",
                "text_key": "content"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let calls = service.recorded_calls().await;
        match &calls[0] {
            Call::Json(request) => {
                assert_eq!(request.records.len(), 1);
                assert_eq!(request.text_key.as_deref(), Some("content"));
            }
            other => panic!("unexpected call: {other:?}"),
        }

        let (status, body) = send(
            service,
            Method::POST,
            "/collections/docs/json",
            Some(json!({ "records": [], "tenant_id": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "tenant_id must not be empty");
    }

    #[tokio::test]
    async fn collection_info_returns_404_when_missing() {
        let service = Arc::new(StubIngestService::default());
        let (status, body) = send(service.clone(), Method::GET, "/collections/docs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vector_size"], 384);

        let (status, _) = send(service, Method::GET, "/collections/absent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_route_returns_hits() {
        let service = Arc::new(StubIngestService::default());
        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/collections/docs/search",
            Some(json!({ "query": "doc", "tenant_id": "t1", "limit": 3 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"][0]["payload"]["tenant_id"], "t1");
        let calls = service.recorded_calls().await;
        assert!(matches!(&calls[0], Call::Search(request) if request.limit == Some(3)));
    }

    #[tokio::test]
    async fn search_route_forwards_grouping_labels() {
        let service = Arc::new(StubIngestService::default());
        let (status, _) = send(
            service.clone(),
            Method::POST,
            "/collections/docs/search",
            Some(json!({
                "query": "quarterly revenue",
                "tenant_id": "t1",
                "category": "finance",
                "subcategory": "q3"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let calls = service.recorded_calls().await;
        match &calls[0] {
            Call::Search(request) => {
                assert_eq!(request.limit, None);
                assert_eq!(request.category.as_deref(), Some("finance"));
                assert_eq!(request.subcategory.as_deref(), Some("q3"));
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tenant_delete_route_targets_one_tenant() {
        let service = Arc::new(StubIngestService::default());
        let (status, body) = send(
            service.clone(),
            Method::DELETE,
            "/collections/docs/tenants/tenantA",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tenant_id"], "tenantA");
        assert_eq!(body["deleted"], true);

        let calls = service.recorded_calls().await;
        assert!(matches!(
            &calls[0],
            Call::DeleteTenant(collection, tenant) if collection == "docs" && tenant == "tenantA"
        ));

        let (status, _) = send(
            service,
            Method::DELETE,
            "/collections/absent/tenants/tenantA",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_delete_and_metrics_routes() {
        let service = Arc::new(StubIngestService::default());
        let (_, body) = send(service.clone(), Method::GET, "/collections", None).await;
        assert_eq!(body["collections"], json!(["docs"]));

        let (status, body) = send(service.clone(), Method::DELETE, "/collections/docs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], true);

        let (_, body) = send(service, Method::GET, "/metrics", None).await;
        assert_eq!(body["items_stored"], 3);
    }
}
