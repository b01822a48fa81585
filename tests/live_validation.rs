use std::{env, sync::Once};

use serde_json::json;
use vectorloader::{
    config::{self, Config},
    embedding,
    ingest::IngestService,
    qdrant::CollectionStatus,
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn live_config() -> Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("COLLECTION_NAME", "vectorloader-live");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
    });
    config::load_config().expect("live configuration")
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_json_roundtrip() {
    let config = live_config();
    let service = IngestService::from_config(&config).expect("service");
    let collection = format!("{}-json", config.collection_name);

    let status = service
        .create_collection(&collection, None, None)
        .await
        .expect("create collection");
    assert!(matches!(
        status,
        CollectionStatus::Created | CollectionStatus::AlreadyExists
    ));

    let records = vec![
        json!({ "id": "1", "text": "doc one" })
            .as_object()
            .cloned()
            .expect("object"),
    ];
    let report = service
        .create_embeddings_from_json(records, &collection, "live-tenant", "text")
        .await
        .expect("ingest");
    assert_eq!(report.stored_count(), 1, "report: {report:?}");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let mut config = live_config();
    config.embedding_provider = config::EmbeddingProvider::Ollama;
    let client = embedding::build_embedding_client(&config).expect("client");
    let vectors = client
        .generate_embeddings(vec!["vectorloader live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected one embedding per input");
    assert!(!vectors[0].is_empty(), "embedding must not be empty");
}
