//! PDF text extraction.
//!
//! Text is pulled page by page in document order and joined with newlines. Pages without a text
//! layer (scanned images) contribute an empty string; only unreadable or undecodable files fail.

use lopdf::Document;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while pulling text out of a source document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Bytes are not a PDF the parser understands (corrupt, wrong format, encrypted).
    #[error("failed to parse PDF {path}: {message}")]
    Parse {
        /// Path of the rejected file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// A single page could not be decoded.
    #[error("failed to decode page {page} of {path}: {message}")]
    Page {
        /// Path of the document.
        path: PathBuf,
        /// One-based page number.
        page: u32,
        /// Parser diagnostic.
        message: String,
    },
    /// Blocking extraction task was cancelled or panicked.
    #[error("extraction task for {path} failed: {message}")]
    Task {
        /// Path of the document being extracted.
        path: PathBuf,
        /// Join error description.
        message: String,
    },
}

/// Extract the text of every page of the PDF at `path`, joined by newlines in page order.
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    extract_pdf_text_from_bytes(path, &bytes)
}

/// Same as [`extract_pdf_text`] but runs the parse on the blocking thread pool.
pub async fn extract_pdf_text_async(path: PathBuf) -> Result<String, ExtractionError> {
    let task_path = path.clone();
    tokio::task::spawn_blocking(move || extract_pdf_text(&task_path))
        .await
        .map_err(|err| ExtractionError::Task {
            path,
            message: err.to_string(),
        })?
}

fn extract_pdf_text_from_bytes(path: &Path, bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|err| ExtractionError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    if document.is_encrypted() {
        return Err(ExtractionError::Parse {
            path: path.to_path_buf(),
            message: "document is encrypted".to_string(),
        });
    }

    // get_pages is keyed by page number, so iteration follows document order.
    let mut pages = Vec::new();
    for page in document.get_pages().into_keys() {
        let text = document
            .extract_text(&[page])
            .map_err(|err| ExtractionError::Page {
                path: path.to_path_buf(),
                page,
                message: err.to_string(),
            })?;
        pages.push(text.trim_end().to_string());
    }

    let text = pages.join("\n");
    tracing::debug!(
        path = %path.display(),
        pages = pages.len(),
        chars = text.len(),
        "Extracted PDF text"
    );
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::fixtures::pdf_with_pages;
    use super::*;

    #[test]
    fn joins_pages_in_order() {
        let bytes = pdf_with_pages(&["First page", "Second page"]);
        let text = extract_pdf_text_from_bytes(Path::new("two.pdf"), &bytes).expect("text");
        let first = text.find("First page").expect("first page text");
        let second = text.find("Second page").expect("second page text");
        assert!(first < second);
        assert!(text.contains('\n'));
    }

    #[test]
    fn page_without_text_layer_yields_empty_text() {
        let bytes = pdf_with_pages(&[""]);
        let text = extract_pdf_text_from_bytes(Path::new("scan.pdf"), &bytes).expect("text");
        assert!(text.trim().is_empty());
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = extract_pdf_text_from_bytes(Path::new("bad.pdf"), b"not a pdf at all")
            .expect_err("parse failure");
        assert!(matches!(err, ExtractionError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = extract_pdf_text(Path::new("/definitely/not/here.pdf")).expect_err("io");
        assert!(matches!(err, ExtractionError::Io { .. }));
    }

    #[tokio::test]
    async fn async_wrapper_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello.pdf");
        std::fs::write(&path, pdf_with_pages(&["Hello world"])).expect("write pdf");

        let text = extract_pdf_text_async(path).await.expect("text");
        assert!(text.contains("Hello world"));
    }
}
