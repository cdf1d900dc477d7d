//! Core library for invoice extraction.
//!
//! This crate provides:
//! - Sanitizing of raw model completions into candidate JSON payloads
//! - Validation of payloads into a fixed invoice record schema
//! - An extraction orchestrator that turns every document into exactly one record
//! - Batch aggregation with summary statistics and filter views
//! - Local PDF/text parsing and a Gemini completion client (feature `native`)

pub mod batch;
pub mod error;
pub mod extraction;
pub mod models;
#[cfg(feature = "native")]
pub mod completion;
#[cfg(feature = "native")]
pub mod document;
#[cfg(feature = "native")]
pub mod pdf;

pub use batch::{BatchCollector, BatchSummary, Dataset, RecordFilter, aggregate};
pub use error::{CompletionError, DocumentError, ErrorKind, ExtractionError, InvexError, Result};
pub use extraction::{CompletionSource, Document, Extractor, StagedDocument, TextSource, sanitize, validate};
pub use models::config::{CompletionConfig, ExtractionConfig, InvexConfig};
pub use models::invoice::{InvoiceFields, InvoiceRecord, Outcome, ProcessingStatus};

#[cfg(feature = "native")]
pub use completion::GeminiClient;
#[cfg(feature = "native")]
pub use document::LocalTextSource;
