//! Invoice record models shared by the extraction pipeline and exporters.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Tolerance used when reconciling `subtotal + tax_amount` with `net_total` (0.01).
pub fn reconciliation_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Exported column order of an [`InvoiceRecord`].
pub const COLUMNS: [&str; 13] = [
    "processing_status",
    "source_id",
    "date",
    "invoice_number",
    "party_name",
    "party_address",
    "tax_id",
    "currency",
    "subtotal",
    "tax_amount",
    "net_total",
    "line_item_count",
    "error_message",
];

/// Terminal status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// The completion was parsed into a structured payload.
    Success,
    /// Text acquisition, completion, or payload parsing failed.
    Failed,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStatus::Success => f.write_str("success"),
            ProcessingStatus::Failed => f.write_str("failed"),
        }
    }
}

/// The domain fields extracted from one invoice.
///
/// `None` is the only "not extracted" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFields {
    /// Invoice date.
    pub date: Option<NaiveDate>,

    /// Invoice/bill number.
    pub invoice_number: Option<String>,

    /// Vendor or supplier name.
    pub party_name: Option<String>,

    /// Vendor or supplier address.
    pub party_address: Option<String>,

    /// Tax registration number (TRN/VAT/TIN).
    pub tax_id: Option<String>,

    /// Currency code, upper-case.
    pub currency: Option<String>,

    /// Amount before tax.
    pub subtotal: Option<Decimal>,

    /// Total tax amount.
    pub tax_amount: Option<Decimal>,

    /// Final amount including tax.
    pub net_total: Option<Decimal>,

    /// Number of line items.
    pub line_item_count: Option<u32>,
}

impl InvoiceFields {
    /// Check whether no field was extracted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields that were not extracted.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let presence = [
            ("date", self.date.is_some()),
            ("invoice_number", self.invoice_number.is_some()),
            ("party_name", self.party_name.is_some()),
            ("party_address", self.party_address.is_some()),
            ("tax_id", self.tax_id.is_some()),
            ("currency", self.currency.is_some()),
            ("subtotal", self.subtotal.is_some()),
            ("tax_amount", self.tax_amount.is_some()),
            ("net_total", self.net_total.is_some()),
            ("line_item_count", self.line_item_count.is_some()),
        ];

        presence
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Canonical output unit: one record per input document.
///
/// Field order matches [`COLUMNS`], so serializing a record (JSON or CSV)
/// yields the exported column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Terminal status.
    pub processing_status: ProcessingStatus,

    /// Identifier of the originating document.
    pub source_id: String,

    /// Invoice date, serialized as `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,

    /// Invoice/bill number.
    pub invoice_number: Option<String>,

    /// Vendor or supplier name.
    pub party_name: Option<String>,

    /// Vendor or supplier address.
    pub party_address: Option<String>,

    /// Tax registration number.
    pub tax_id: Option<String>,

    /// Currency code.
    pub currency: Option<String>,

    /// Amount before tax.
    pub subtotal: Option<Decimal>,

    /// Total tax amount.
    pub tax_amount: Option<Decimal>,

    /// Final amount including tax.
    pub net_total: Option<Decimal>,

    /// Number of line items.
    pub line_item_count: Option<u32>,

    /// Failure description, present iff the record failed.
    pub error_message: Option<String>,
}

impl InvoiceRecord {
    /// Create a successful record from extracted fields.
    pub fn success(source_id: impl Into<String>, fields: InvoiceFields) -> Self {
        Self {
            processing_status: ProcessingStatus::Success,
            source_id: source_id.into(),
            date: fields.date,
            invoice_number: fields.invoice_number,
            party_name: fields.party_name,
            party_address: fields.party_address,
            tax_id: fields.tax_id,
            currency: fields.currency,
            subtotal: fields.subtotal,
            tax_amount: fields.tax_amount,
            net_total: fields.net_total,
            line_item_count: fields.line_item_count,
            error_message: None,
        }
    }

    /// Create a failed record. Every domain field is null.
    pub fn failed(source_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        let mut record = Self::success(source_id, InvoiceFields::default());
        record.processing_status = ProcessingStatus::Failed;
        record.error_message = Some(error_message.into());
        record
    }

    /// Whether the record is a success.
    pub fn is_success(&self) -> bool {
        self.processing_status == ProcessingStatus::Success
    }

    /// Whether the record failed.
    pub fn is_failed(&self) -> bool {
        self.processing_status == ProcessingStatus::Failed
    }

    /// Copy of the domain fields.
    pub fn fields(&self) -> InvoiceFields {
        InvoiceFields {
            date: self.date,
            invoice_number: self.invoice_number.clone(),
            party_name: self.party_name.clone(),
            party_address: self.party_address.clone(),
            tax_id: self.tax_id.clone(),
            currency: self.currency.clone(),
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            net_total: self.net_total,
            line_item_count: self.line_item_count,
        }
    }

    /// Absolute difference between `subtotal + tax_amount` and `net_total`.
    ///
    /// `None` unless all three amounts were extracted. A difference too large
    /// for `Decimal` saturates at `Decimal::MAX`.
    pub fn reconciliation_gap(&self) -> Option<Decimal> {
        match (self.subtotal, self.tax_amount, self.net_total) {
            (Some(subtotal), Some(tax), Some(net)) => Some(
                subtotal
                    .checked_add(tax)
                    .and_then(|sum| sum.checked_sub(net))
                    .map_or(Decimal::MAX, |gap| gap.abs()),
            ),
            _ => None,
        }
    }

    /// Whether the amounts reconcile within [`reconciliation_tolerance`].
    ///
    /// Records with missing amounts count as reconciled.
    pub fn is_reconciled(&self) -> bool {
        self.reconciliation_gap()
            .map_or(true, |gap| gap <= reconciliation_tolerance())
    }
}

/// Tagged result of one extraction, before it is collapsed into a record.
#[derive(Debug)]
pub enum Outcome {
    /// Extraction produced a structured payload.
    Success(InvoiceFields),
    /// Extraction failed at some step.
    Failure(ExtractionError),
}

impl Outcome {
    /// Collapse the outcome into the uniform record shape.
    pub fn into_record(self, source_id: impl Into<String>) -> InvoiceRecord {
        match self {
            Outcome::Success(fields) => InvoiceRecord::success(source_id, fields),
            Outcome::Failure(err) => InvoiceRecord::failed(source_id, err.to_string()),
        }
    }
}

impl From<Result<InvoiceFields, ExtractionError>> for Outcome {
    fn from(result: Result<InvoiceFields, ExtractionError>) -> Self {
        match result {
            Ok(fields) => Outcome::Success(fields),
            Err(err) => Outcome::Failure(err),
        }
    }
}
