//! Extraction response pipeline: document text, completion, sanitize, validate.

mod orchestrator;
pub mod prompt;
pub mod sanitize;
pub mod validate;

pub use orchestrator::Extractor;
pub use prompt::build_prompt;
pub use sanitize::sanitize;
pub use validate::{validate, validate_payload};

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::{CompletionError, DocumentError};

/// Document-parsing collaborator: staged document in, plain/markdown text out.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Extract the text of a staged document.
    async fn extract_text(&self, staged: &StagedDocument) -> Result<String, DocumentError>;
}

/// Text-completion collaborator: prompt in, untrusted raw text out.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Request a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentContent {
    /// Bytes already in memory (uploads, tests).
    Bytes(Vec<u8>),
    /// A file read when the document is staged.
    File(PathBuf),
}

/// One input document of a batch.
#[derive(Debug, Clone)]
pub struct Document {
    source_id: String,
    content: DocumentContent,
}

impl Document {
    /// Create a document from in-memory bytes.
    pub fn from_bytes(source_id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source_id: source_id.into(),
            content: DocumentContent::Bytes(bytes.into()),
        }
    }

    /// Create a document backed by a file; the file name is the source id.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            source_id,
            content: DocumentContent::File(path),
        }
    }

    /// Replace the source id, e.g. with a path relative to a batch root.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Identifier of the document.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Lower-case extension of the source id, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.source_id)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Document content.
    pub fn content(&self) -> &DocumentContent {
        &self.content
    }
}

/// A document's bytes copied into a temporary file.
///
/// The file is deleted when the value is dropped.
pub struct StagedDocument {
    source_id: String,
    bytes: Vec<u8>,
    file: NamedTempFile,
}

impl StagedDocument {
    /// Stage a document into a temporary file that keeps its extension.
    pub async fn stage(document: &Document) -> Result<Self, DocumentError> {
        let bytes = match document.content() {
            DocumentContent::Bytes(bytes) => bytes.clone(),
            DocumentContent::File(path) => tokio::fs::read(path).await?,
        };

        let suffix = document
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("invex-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;

        Ok(Self {
            source_id: document.source_id().to_string(),
            bytes,
            file,
        })
    }

    /// Identifier of the staged document.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Path of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Lower-case extension of the staged file, if any.
    pub fn extension(&self) -> Option<String> {
        self.path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
