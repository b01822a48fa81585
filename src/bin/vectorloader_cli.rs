//! One-shot command line entrypoint.
//!
//! Runs the same ingestion workflows as the HTTP server against the configured Qdrant instance
//! and prints the resulting report as JSON.
use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use vectorloader::{
    config, logging,
    ingest::{IngestApi, IngestService, JsonIngestRequest, PdfIngestRequest},
    qdrant::Distance,
};

#[derive(Parser)]
#[command(
    name = "vectorloader-cli",
    about = "Load PDF folders and JSON records into tenant-tagged Qdrant collections"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a collection (no-op when it already exists with the same parameters).
    CreateCollection {
        /// Collection name; defaults to `COLLECTION_NAME`.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        vector_size: Option<u64>,
        /// cosine, dot or euclidean.
        #[arg(long)]
        distance: Option<Distance>,
    },
    /// Embed every PDF directly inside a folder.
    IngestPdf {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
    },
    /// Embed records from a JSON array or JSONL file.
    IngestJson {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        collection: Option<String>,
        /// Record field holding the text; defaults to `TEXT_KEY`.
        #[arg(long)]
        text_key: Option<String>,
    },
    /// List collection names.
    Collections,
    /// Remove every point a tenant owns in a collection.
    DeleteTenant {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        collection: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::load_config().context("failed to load configuration")?;
    let service = IngestService::from_config(&config).context("failed to initialize services")?;

    match cli.command {
        Command::CreateCollection {
            name,
            vector_size,
            distance,
        } => {
            let name = name.unwrap_or_else(|| config.collection_name.clone());
            let status = service
                .create_collection(&name, vector_size, distance)
                .await
                .with_context(|| format!("failed to create collection '{name}'"))?;
            print_json(&serde_json::json!({ "name": name, "status": status }))
        }
        Command::IngestPdf {
            folder,
            tenant,
            collection,
            category,
            subcategory,
        } => {
            let report = service
                .ingest_pdf_folder(PdfIngestRequest {
                    folder,
                    collection: collection.unwrap_or_else(|| config.collection_name.clone()),
                    tenant_id: tenant,
                    category,
                    subcategory,
                })
                .await?;
            print_json(&report)
        }
        Command::IngestJson {
            file,
            tenant,
            collection,
            text_key,
        } => {
            let records = read_records(&file)?;
            let report = service
                .ingest_json_records(JsonIngestRequest {
                    records,
                    collection: collection.unwrap_or_else(|| config.collection_name.clone()),
                    tenant_id: tenant,
                    text_key,
                })
                .await?;
            print_json(&report)
        }
        Command::Collections => {
            let names = service.list_collections().await?;
            print_json(&names)
        }
        Command::DeleteTenant { tenant, collection } => {
            let collection = collection.unwrap_or_else(|| config.collection_name.clone());
            service
                .delete_tenant_points(&collection, &tenant)
                .await
                .with_context(|| format!("failed to delete tenant '{tenant}' points"))?;
            print_json(&serde_json::json!({
                "collection": collection,
                "tenant_id": tenant,
                "deleted": true
            }))
        }
    }
}

/// Read a JSON array of objects, or one object per line.
///
/// Entries that are not JSON objects are skipped with a warning; the rest are still ingested.
fn read_records(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let trimmed = raw.trim_start();

    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON array in {}", path.display()))?;
        return Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| into_object(value, index + 1))
            .collect());
    }

    let mut records = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON on line {}", index + 1))?;
        records.extend(into_object(value, index + 1));
    }
    Ok(records)
}

fn into_object(value: Value, position: usize) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        other => {
            tracing::warn!(
                record = position,
                found = type_name(&other),
                "Skipping record that is not a JSON object"
            );
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn array_entries_that_are_not_objects_are_skipped() {
        let file = write_temp(
            r#"[{"id": "1", "text": "a"}, 42, "loose", {"id": "2", "text": "b"}]"#,
        );
        let records = read_records(file.path()).expect("records");

        let ids: Vec<Option<&str>> = records.iter().map(|record| record["id"].as_str()).collect();
        assert_eq!(ids, vec![Some("1"), Some("2")]);
    }

    #[test]
    fn jsonl_lines_that_are_not_objects_are_skipped() {
        let file = write_temp("{\"id\": 1, \"text\": \"a\"}\n\n[1, 2]\nnull\n{\"id\": 2, \"text\": \"b\"}\n");
        let records = read_records(file.path()).expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["id"], 2);
    }

    #[test]
    fn unparseable_lines_still_fail_the_file() {
        let file = write_temp("{\"id\": 1}\n{not json}\n");
        let err = read_records(file.path()).expect_err("invalid line");
        assert!(err.to_string().contains("line 2"));
    }
}
