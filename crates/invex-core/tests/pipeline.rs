//! End-to-end extraction scenarios with in-memory collaborators.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use invex_core::{
    CompletionError, CompletionSource, Document, DocumentError, ExtractionConfig, Extractor,
    InvoiceRecord, ProcessingStatus, RecordFilter, StagedDocument, TextSource, aggregate,
};

const CLEAN_PAYLOAD: &str = r#"{"date": "2025-08-21", "invoice_number": "SEFZE-1471", "party_name": "Shahi Enterprises FZE", "trn": "100373811700003", "subtotal": 18000.00, "tax_amount": 900.00, "net_total": 18900.00, "currency": "AED", "items_count": 1}"#;

const FENCED_COMPLETION: &str = "Here is the extracted invoice data:\n\n```json\n{\n  \"date\": \"2025-09-09\",\n  \"invoice_number\": \"SEFZE-1476\",\n  \"party_name\": \"Shahi Enterprises FZE\",\n  \"party_address\": null,\n  \"trn\": \"100373811700003\",\n  \"subtotal\": 18000.00,\n  \"tax_amount\": 900.00,\n  \"net_total\": 18900.00,\n  \"currency\": \"AED\",\n  \"items_count\": null\n}\n```\n\nLet me know if you need anything else.";

/// Returns the staged bytes as text; `<<unreadable>>` simulates a parser failure.
struct InMemoryText;

#[async_trait]
impl TextSource for InMemoryText {
    async fn extract_text(&self, staged: &StagedDocument) -> Result<String, DocumentError> {
        let text = String::from_utf8_lossy(staged.bytes()).into_owned();
        if text.contains("<<unreadable>>") {
            return Err(DocumentError::Service("upstream parser returned 502".to_string()));
        }
        Ok(text)
    }
}

/// Answers according to a marker embedded in the document text.
struct ScriptedCompletion;

#[async_trait]
impl CompletionSource for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if prompt.contains("<<clean>>") {
            Ok(CLEAN_PAYLOAD.to_string())
        } else if prompt.contains("<<fenced>>") {
            Ok(FENCED_COMPLETION.to_string())
        } else if prompt.contains("<<hang>>") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CLEAN_PAYLOAD.to_string())
        } else if prompt.contains("<<refuse>>") {
            Ok("I'm sorry, I cannot read this document.".to_string())
        } else if prompt.contains("<<quota>>") {
            Err(CompletionError::Status {
                status: 429,
                body: "RESOURCE_EXHAUSTED".to_string(),
            })
        } else if let Some(ms) = delay_marker(prompt) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!(r#"{{"invoice_number": "N-{}", "net_total": {}}}"#, ms, ms))
        } else {
            Ok("{}".to_string())
        }
    }
}

fn delay_marker(prompt: &str) -> Option<u64> {
    let start = prompt.find("<<delay=")? + "<<delay=".len();
    let end = prompt[start..].find(">>")? + start;
    prompt[start..end].parse().ok()
}

fn extractor(max_parallel: usize) -> Extractor<InMemoryText, ScriptedCompletion> {
    let config = ExtractionConfig {
        completion_model: "test-model".to_string(),
        timeout_seconds: 30,
        max_parallel,
    };
    Extractor::new(config, InMemoryText, ScriptedCompletion)
}

fn doc(source_id: &str, text: &str) -> Document {
    Document::from_bytes(source_id, text.as_bytes().to_vec())
}

fn assert_record_invariants(record: &InvoiceRecord) {
    match record.processing_status {
        ProcessingStatus::Success => assert!(record.error_message.is_none()),
        ProcessingStatus::Failed => {
            assert!(record.error_message.is_some());
            assert!(record.fields().is_empty(), "{} has domain data", record.source_id);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn clean_fenced_and_timeout_documents() {
    let documents = vec![
        doc("SEFZE-1471.pdf", "TAX INVOICE <<clean>>"),
        doc("SEFZE-1476.pdf", "TAX INVOICE <<fenced>>"),
        doc("SEFZE-1483.pdf", "TAX INVOICE <<hang>>"),
    ];

    let dataset = extractor(4).extract_batch(&documents).await;
    let records = dataset.records();

    assert_eq!(records.len(), 3);
    let ids: Vec<&str> = records.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, vec!["SEFZE-1471.pdf", "SEFZE-1476.pdf", "SEFZE-1483.pdf"]);

    assert!(records[0].is_success());
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 8, 21));
    assert_eq!(records[0].invoice_number.as_deref(), Some("SEFZE-1471"));
    assert_eq!(records[0].tax_id.as_deref(), Some("100373811700003"));
    assert_eq!(records[0].net_total, Some(Decimal::from(18900)));
    assert_eq!(records[0].line_item_count, Some(1));

    assert!(records[1].is_success());
    assert_eq!(records[1].invoice_number.as_deref(), Some("SEFZE-1476"));
    assert_eq!(records[1].party_address, None);
    assert_eq!(records[1].line_item_count, None);

    assert!(records[2].is_failed());
    assert_eq!(
        records[2].error_message.as_deref(),
        Some("completion request failed: timed out after 30s")
    );

    for record in records {
        assert_record_invariants(record);
    }

    let successful = dataset.filter(RecordFilter::Successful);
    assert_eq!(successful.len(), 2);
    assert_eq!(successful[0].source_id, "SEFZE-1471.pdf");
    assert_eq!(successful[1].source_id, "SEFZE-1476.pdf");

    let summary = dataset.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_amount, Decimal::from(37800));
    assert_eq!(summary.average_amount, Decimal::from(18900));
    assert_eq!(summary.total_tax, Decimal::from(1800));
}

#[tokio::test]
async fn every_failure_class_yields_one_row() {
    let documents = vec![
        doc("unreadable.pdf", "<<unreadable>>"),
        doc("blank.pdf", "   "),
        doc("quota.pdf", "<<quota>>"),
        doc("refusal.pdf", "<<refuse>>"),
        doc("empty-object.pdf", "no marker"),
    ];

    let dataset = extractor(2).extract_batch(&documents).await;
    assert_eq!(dataset.len(), documents.len());

    let messages: Vec<Option<&str>> = dataset
        .records()
        .iter()
        .map(|r| r.error_message.as_deref())
        .collect();

    assert_eq!(
        messages[0],
        Some("document text extraction failed: parsing service error: upstream parser returned 502")
    );
    assert_eq!(
        messages[1],
        Some("document text extraction failed: no text content extracted")
    );
    assert_eq!(
        messages[2],
        Some("completion request failed: service returned status 429: RESOURCE_EXHAUSTED")
    );
    assert!(messages[3].unwrap().starts_with("payload parse error: "));
    assert_eq!(messages[4], None);

    let last = &dataset.records()[4];
    assert!(last.is_success());
    assert!(last.fields().is_empty());

    for record in dataset.records() {
        assert_record_invariants(record);
    }
}

#[tokio::test(start_paused = true)]
async fn results_keep_submission_order_under_concurrency() {
    let delays = [400u64, 100, 300, 50, 200];
    let documents: Vec<Document> = delays
        .iter()
        .enumerate()
        .map(|(i, ms)| doc(&format!("doc-{}.txt", i), &format!("<<delay={}>>", ms)))
        .collect();

    let mut completion_order = Vec::new();
    let dataset = extractor(5)
        .extract_batch_with(&documents, |record| completion_order.push(record.source_id.clone()))
        .await;

    assert_eq!(
        completion_order,
        vec!["doc-3.txt", "doc-1.txt", "doc-4.txt", "doc-2.txt", "doc-0.txt"]
    );

    let numbers: Vec<Option<&str>> = dataset
        .records()
        .iter()
        .map(|r| r.invoice_number.as_deref())
        .collect();
    assert_eq!(
        numbers,
        vec![Some("N-400"), Some("N-100"), Some("N-300"), Some("N-50"), Some("N-200")]
    );
}

#[tokio::test(start_paused = true)]
async fn worker_bound_of_one_runs_sequentially() {
    let documents: Vec<Document> = (0..3)
        .map(|i| doc(&format!("doc-{}.txt", i), "<<delay=100>>"))
        .collect();

    let start = tokio::time::Instant::now();
    let dataset = extractor(1).extract_batch(&documents).await;

    assert_eq!(dataset.len(), 3);
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn single_document_never_fails_past_boundary() {
    let missing = Document::from_path("/nonexistent/invex/scan.pdf");
    let record = extractor(1).extract(&missing).await;

    assert_eq!(record.source_id, "scan.pdf");
    assert!(record.is_failed());
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("document text extraction failed: I/O error"));
}

#[test]
fn aggregate_reconciliation_surface() {
    let fields = invex_core::InvoiceFields {
        subtotal: Some(Decimal::from_str("15000.00").unwrap()),
        tax_amount: Some(Decimal::from_str("750.00").unwrap()),
        net_total: Some(Decimal::from_str("15700.00").unwrap()),
        ..Default::default()
    };
    let (dataset, summary) = aggregate(vec![InvoiceRecord::success("SEFZE-1483.pdf", fields)]);

    assert_eq!(summary.total_amount, Decimal::from(15700));
    assert_eq!(dataset.inconsistent().len(), 1);
}
