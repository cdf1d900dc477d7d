//! Per-document extraction driver and bounded batch runner.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::{FutureExt, StreamExt, future, stream};
use tracing::{debug, info, warn};

use crate::batch::{BatchCollector, Dataset};
use crate::error::{CompletionError, DocumentError, ExtractionError};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{InvoiceRecord, Outcome};

use super::{CompletionSource, Document, StagedDocument, TextSource, build_prompt, sanitize, validate};

/// Why a bounded collaborator call produced no output.
enum Interrupted {
    TimedOut,
    Panicked,
}

/// Run a collaborator call under a deadline, catching panics.
async fn bounded<F: Future>(deadline: Duration, call: F) -> Result<F::Output, Interrupted> {
    match tokio::time::timeout(deadline, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(_)) => Err(Interrupted::Panicked),
        Err(_) => Err(Interrupted::TimedOut),
    }
}

/// Drives documents through text acquisition, completion, sanitizing and
/// validation. Every call yields exactly one [`InvoiceRecord`].
pub struct Extractor<T, C> {
    config: ExtractionConfig,
    text_source: T,
    completion_source: C,
}

impl<T: TextSource, C: CompletionSource> Extractor<T, C> {
    /// Create a new extractor.
    pub fn new(config: ExtractionConfig, text_source: T, completion_source: C) -> Self {
        Self {
            config,
            text_source,
            completion_source,
        }
    }

    /// Extractor configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract one document. Never fails; failures become `failed` records.
    pub async fn extract(&self, document: &Document) -> InvoiceRecord {
        let start = Instant::now();
        let source_id = document.source_id();

        let record = match self.request_payload(document).await {
            Ok(payload) => validate(&payload, source_id),
            Err(err) => Outcome::Failure(err).into_record(source_id),
        };

        let elapsed_ms = start.elapsed().as_millis();
        match &record.error_message {
            None => info!("{}: {} in {}ms", source_id, record.processing_status, elapsed_ms),
            Some(message) => warn!("{}: {} in {}ms: {}", source_id, record.processing_status, elapsed_ms, message),
        }

        record
    }

    /// Extract a batch with at most `max_parallel` documents in flight.
    ///
    /// Records come back in submission order.
    pub async fn extract_batch(&self, documents: &[Document]) -> Dataset {
        self.extract_batch_with(documents, |_| {}).await
    }

    /// Like [`extract_batch`](Self::extract_batch), calling `on_record` as
    /// each document finishes (completion order).
    pub async fn extract_batch_with<F>(&self, documents: &[Document], mut on_record: F) -> Dataset
    where
        F: FnMut(&InvoiceRecord),
    {
        let collector = BatchCollector::with_capacity(documents.len());
        debug!(
            "Extracting {} documents with up to {} in flight",
            documents.len(),
            self.config.parallelism()
        );

        stream::iter(documents.iter().enumerate())
            .map(|(index, document)| async move { (index, self.extract(document).await) })
            .buffer_unordered(self.config.parallelism())
            .for_each(|(index, record)| {
                on_record(&record);
                collector.insert(index, record);
                future::ready(())
            })
            .await;

        collector.finish()
    }

    /// Steps 1-3: stage and read the document, prompt, complete, sanitize.
    async fn request_payload(&self, document: &Document) -> Result<String, ExtractionError> {
        let text = self.acquire_text(document).await?;
        debug!("{}: acquired {} chars of text", document.source_id(), text.len());

        let prompt = build_prompt(&text);
        let raw = self.request_completion(&prompt).await?;
        debug!("{}: completion returned {} chars", document.source_id(), raw.len());

        Ok(sanitize(&raw))
    }

    async fn acquire_text(&self, document: &Document) -> Result<String, DocumentError> {
        // Dropping `staged` deletes the temporary file on every return path.
        let staged = StagedDocument::stage(document).await?;

        let text = match bounded(self.config.timeout(), self.text_source.extract_text(&staged)).await {
            Ok(result) => result?,
            Err(Interrupted::TimedOut) => return Err(DocumentError::Timeout(self.config.timeout_secs())),
            Err(Interrupted::Panicked) => {
                return Err(DocumentError::Service("text source panicked".to_string()));
            }
        };

        if text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(text)
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, CompletionError> {
        let raw = match bounded(self.config.timeout(), self.completion_source.complete(prompt)).await {
            Ok(result) => result?,
            Err(Interrupted::TimedOut) => return Err(CompletionError::Timeout(self.config.timeout_secs())),
            Err(Interrupted::Panicked) => {
                return Err(CompletionError::Service("completion source panicked".to_string()));
            }
        };

        if raw.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(raw)
    }
}
