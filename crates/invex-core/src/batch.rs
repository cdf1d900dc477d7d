//! Batch aggregation: ordered datasets, filter views and summary statistics.

use std::str::FromStr;
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::invoice::{COLUMNS, InvoiceRecord};

/// Aggregate statistics over a dataset.
///
/// Amounts cover successful records only and are zero when there are none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of records.
    pub total: usize,
    /// Number of successful records.
    pub succeeded: usize,
    /// Number of failed records.
    pub failed: usize,
    /// Sum of `net_total`.
    pub total_amount: Decimal,
    /// `total_amount / succeeded`.
    pub average_amount: Decimal,
    /// Sum of `tax_amount`.
    pub total_tax: Decimal,
}

impl BatchSummary {
    /// Compute the summary of `records` in one pass.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InvoiceRecord>) -> Self {
        let mut summary = Self::default();

        for record in records {
            summary.total += 1;
            if record.is_failed() {
                summary.failed += 1;
                continue;
            }
            summary.succeeded += 1;
            summary.total_amount = saturating_sum(summary.total_amount, record.net_total, &record.source_id);
            summary.total_tax = saturating_sum(summary.total_tax, record.tax_amount, &record.source_id);
        }

        if summary.succeeded > 0 {
            summary.average_amount = summary.total_amount / Decimal::from(summary.succeeded);
        }

        summary
    }

    /// Metric names and values, in display order.
    pub fn metrics(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total", self.total.to_string()),
            ("succeeded", self.succeeded.to_string()),
            ("failed", self.failed.to_string()),
            ("total_amount", self.total_amount.round_dp(2).to_string()),
            ("average_amount", self.average_amount.round_dp(2).to_string()),
            ("total_tax", self.total_tax.round_dp(2).to_string()),
        ]
    }
}

/// Add `amount` to `total`, saturating at `Decimal::MAX`.
fn saturating_sum(total: Decimal, amount: Option<Decimal>, source_id: &str) -> Decimal {
    let amount = amount.unwrap_or_default();
    total.checked_add(amount).unwrap_or_else(|| {
        warn!("{}: summary total overflowed, saturating", source_id);
        if amount.is_sign_negative() { Decimal::MIN } else { Decimal::MAX }
    })
}

/// Subset selector for [`Dataset::filter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    /// Every record.
    #[default]
    All,
    /// Successful records only.
    Successful,
    /// Failed records only.
    Failed,
}

impl RecordFilter {
    /// Whether `record` belongs to this view.
    pub fn matches(&self, record: &InvoiceRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Successful => record.is_success(),
            RecordFilter::Failed => record.is_failed(),
        }
    }
}

impl FromStr for RecordFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(RecordFilter::All),
            "successful" | "success" => Ok(RecordFilter::Successful),
            "failed" | "failure" => Ok(RecordFilter::Failed),
            other => Err(format!("unknown record filter: {}", other)),
        }
    }
}

/// Ordered records of one batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<InvoiceRecord>,
}

impl Dataset {
    /// Create a dataset, keeping the given order.
    pub fn new(records: Vec<InvoiceRecord>) -> Self {
        Self { records }
    }

    /// Exported column order.
    pub fn columns() -> &'static [&'static str] {
        &COLUMNS
    }

    /// All records.
    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recompute the summary.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_records(&self.records)
    }

    /// Ordered view of the records selected by `filter`.
    pub fn filter(&self, filter: RecordFilter) -> Vec<&InvoiceRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Successful records whose amounts do not reconcile.
    pub fn inconsistent(&self) -> Vec<&InvoiceRecord> {
        self.records
            .iter()
            .filter(|r| r.is_success() && !r.is_reconciled())
            .collect()
    }

    /// Take the records back.
    pub fn into_records(self) -> Vec<InvoiceRecord> {
        self.records
    }
}

impl From<Vec<InvoiceRecord>> for Dataset {
    fn from(records: Vec<InvoiceRecord>) -> Self {
        Self::new(records)
    }
}

/// Build a dataset and its summary from records in submission order.
pub fn aggregate(records: Vec<InvoiceRecord>) -> (Dataset, BatchSummary) {
    let dataset = Dataset::new(records);
    let summary = dataset.summary();
    (dataset, summary)
}

/// Append-only collection of records that may be inserted concurrently, in
/// any order, and reassembled by submission index.
#[derive(Debug, Default)]
pub struct BatchCollector {
    entries: Mutex<Vec<(usize, InvoiceRecord)>>,
}

impl BatchCollector {
    /// Create a collector sized for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Record the result for the document submitted at `index`.
    pub fn insert(&self, index: usize, record: InvoiceRecord) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((index, record));
    }

    /// Number of records collected so far.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether nothing was collected yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dataset in submission order.
    pub fn finish(self) -> Dataset {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.sort_by_key(|(index, _)| *index);
        Dataset::new(entries.into_iter().map(|(_, record)| record).collect())
    }
}
