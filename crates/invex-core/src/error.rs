//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
///
/// Per-document failures never surface as `InvexError`; they are folded
/// into failed records. This type covers configuration and I/O around the
/// pipeline.
#[derive(Error, Debug)]
pub enum InvexError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the document-parsing collaborator.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Failed to read or stage the document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document format is not supported by the text source.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The document could not be parsed.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// The document is encrypted and cannot be opened.
    #[error("document is encrypted")]
    Encrypted,

    /// The document has no pages.
    #[error("document has no pages")]
    NoPages,

    /// Parsing succeeded but produced no text.
    #[error("no text content extracted")]
    Empty,

    /// The parsing service reported an error.
    #[error("parsing service error: {0}")]
    Service(String),

    /// The parsing call exceeded its deadline.
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Errors raised by the completion collaborator.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Transport-level failure (connection refused, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service response could not be decoded.
    #[error("failed to decode response: {0}")]
    ResponseParsing(String),

    /// The service returned no completion text.
    #[error("empty completion")]
    Empty,

    /// The completion service failed in some other way.
    #[error("completion service error: {0}")]
    Service(String),

    /// No API key was configured.
    #[error("missing API key (set {0})")]
    MissingApiKey(String),

    /// The completion call exceeded its deadline.
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Classification of a per-document failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document text could not be obtained.
    DocumentAcquisition,
    /// The completion request failed.
    Completion,
    /// The sanitized completion is not a structured payload.
    PayloadParse,
}

/// Per-document extraction failure.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Document text acquisition failed.
    #[error("document text extraction failed: {0}")]
    DocumentAcquisition(#[from] DocumentError),

    /// The completion request failed.
    #[error("completion request failed: {0}")]
    Completion(#[from] CompletionError),

    /// The payload is not a well-formed JSON object.
    #[error("payload parse error: {0}")]
    PayloadParse(String),
}

impl ExtractionError {
    /// Get the failure classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::DocumentAcquisition(_) => ErrorKind::DocumentAcquisition,
            ExtractionError::Completion(_) => ErrorKind::Completion,
            ExtractionError::PayloadParse(_) => ErrorKind::PayloadParse,
        }
    }
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
