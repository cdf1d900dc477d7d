//! Local document text source for PDF and plain-text invoices.

use async_trait::async_trait;
use tracing::debug;

use crate::error::DocumentError;
use crate::extraction::{StagedDocument, TextSource};
use crate::pdf::PdfExtractor;

/// File extensions [`LocalTextSource`] can read.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "markdown"];

/// Reads text from staged documents on the local machine.
///
/// PDFs go through [`PdfExtractor`] on the blocking pool; text and markdown
/// files are decoded as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTextSource;

impl LocalTextSource {
    /// Create a new local text source.
    pub fn new() -> Self {
        Self
    }

    /// Whether a file extension is supported.
    pub fn supports(extension: &str) -> bool {
        SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str())
    }
}

#[async_trait]
impl TextSource for LocalTextSource {
    async fn extract_text(&self, staged: &StagedDocument) -> Result<String, DocumentError> {
        let extension = staged
            .extension()
            .ok_or_else(|| DocumentError::UnsupportedFormat("file has no extension".to_string()))?;

        match extension.as_str() {
            "pdf" => {
                debug!("{}: extracting PDF text from {}", staged.source_id(), staged.path().display());
                let path = staged.path().to_path_buf();

                tokio::task::spawn_blocking(move || -> Result<String, DocumentError> {
                    let data = std::fs::read(&path)?;
                    let mut extractor = PdfExtractor::new();
                    extractor.load(&data)?;
                    extractor.extract_text()
                })
                .await
                .map_err(|e| DocumentError::Parse(format!("PDF extraction aborted: {}", e)))?
            }
            "txt" | "md" | "markdown" => String::from_utf8(staged.bytes().to_vec())
                .map_err(|e| DocumentError::Parse(format!("invalid UTF-8 text: {}", e))),
            other => Err(DocumentError::UnsupportedFormat(other.to_string())),
        }
    }
}
