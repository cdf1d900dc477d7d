//! Schema enforcement for sanitized completion payloads.
//!
//! Parsing is strict: the payload must be a JSON object. Field reading is
//! lenient: a value that cannot be read as its declared type becomes `None`
//! instead of failing the record.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::invoice::{InvoiceFields, InvoiceRecord, Outcome};

/// Strings a model emits instead of `null`.
const PLACEHOLDERS: &[&str] = &["n/a", "na", "unknown", "null", "none", "nil", "-", "--", "not available"];

/// Validate a payload into a record for `source_id`. Never fails.
pub fn validate(payload: &str, source_id: &str) -> InvoiceRecord {
    let record = Outcome::from(validate_payload(payload)).into_record(source_id);

    if record.is_success() && !record.is_reconciled() {
        warn!(
            "{}: subtotal + tax_amount differs from net_total by {}",
            source_id,
            record.reconciliation_gap().unwrap_or_default()
        );
    }

    record
}

/// Parse a payload into invoice fields.
///
/// Only a payload that is not a JSON object is an error.
pub fn validate_payload(payload: &str) -> Result<InvoiceFields, ExtractionError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ExtractionError::PayloadParse(e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ExtractionError::PayloadParse(format!(
                "expected a JSON object, found {}",
                value_kind(&other)
            )));
        }
    };

    let fields = InvoiceFields {
        date: field(&object, &["date"]).and_then(read_date),
        invoice_number: field(&object, &["invoice_number"]).and_then(read_string),
        party_name: field(&object, &["party_name"]).and_then(read_string),
        party_address: field(&object, &["party_address"]).and_then(read_string),
        tax_id: field(&object, &["trn", "tax_id"]).and_then(read_string),
        currency: field(&object, &["currency"]).and_then(read_currency),
        subtotal: field(&object, &["subtotal"]).and_then(read_amount),
        tax_amount: field(&object, &["tax_amount"]).and_then(read_amount),
        net_total: field(&object, &["net_total"]).and_then(read_amount),
        line_item_count: field(&object, &["items_count", "line_item_count"]).and_then(read_count),
    };

    let missing = fields.missing_fields();
    if !missing.is_empty() {
        debug!("Payload missing or unreadable fields: {}", missing.join(", "));
    }

    Ok(fields)
}

/// First non-null value among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn read_string(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() || PLACEHOLDERS.contains(&text.to_lowercase().as_str()) {
        return None;
    }
    Some(text.to_string())
}

/// `YYYY-MM-DD`, tolerating a trailing time part.
fn read_date(value: &Value) -> Option<NaiveDate> {
    let text = read_string(value)?;
    let date_part = text.split(['T', ' ']).next().unwrap_or(&text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn read_currency(value: &Value) -> Option<String> {
    let code = read_string(value)?;
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

/// Non-negative amount from a JSON number or a numeric string.
fn read_amount(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(&text.trim().replace(',', "")),
        _ => None,
    }?;

    if amount < Decimal::ZERO {
        return None;
    }
    Some(amount.abs())
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Non-negative integer count; integral floats are accepted.
fn read_count(value: &Value) -> Option<u32> {
    let count = match value {
        Value::Number(_) => read_amount(value)?,
        Value::String(text) => parse_decimal(text.trim())?,
        _ => return None,
    };

    if count < Decimal::ZERO || !count.fract().is_zero() {
        return None;
    }
    count.to_u32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::ProcessingStatus;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_malformed_payload_fails() {
        let record = validate("not json", "a.pdf");

        assert_eq!(record.processing_status, ProcessingStatus::Failed);
        assert_eq!(record.source_id, "a.pdf");
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("payload parse error: "));
        assert_eq!(record.fields(), InvoiceFields::default());
    }

    #[test]
    fn test_non_object_payload_fails() {
        let record = validate("[1, 2, 3]", "a.pdf");
        assert!(record.is_failed());
        assert_eq!(
            record.error_message.as_deref(),
            Some("payload parse error: expected a JSON object, found an array")
        );

        assert!(validate("42", "a.pdf").is_failed());
        assert!(validate("null", "a.pdf").is_failed());
    }

    #[test]
    fn test_missing_keys_are_null() {
        let record = validate(r#"{"date":"2025-01-01"}"#, "a.pdf");

        assert!(record.is_success());
        assert!(record.error_message.is_none());
        assert_eq!(
            record.fields(),
            InvoiceFields {
                date: NaiveDate::from_ymd_opt(2025, 1, 1),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_empty_object_is_success() {
        let record = validate("{}", "empty.pdf");
        assert!(record.is_success());
        assert!(record.fields().is_empty());
    }

    #[test]
    fn test_full_payload() {
        let payload = r#"{
            "date": "2025-08-21",
            "invoice_number": "SEFZE-1471",
            "party_name": "Shahi Enterprises FZE",
            "party_address": "Al Jazeera, Al-Hamra Ras al-Khaimah U.A.E",
            "trn": "100373811700003",
            "subtotal": 18000.00,
            "tax_amount": 900,
            "net_total": "18,900.00",
            "currency": "aed",
            "items_count": 1
        }"#;

        let fields = validate_payload(payload).unwrap();

        assert_eq!(
            fields,
            InvoiceFields {
                date: NaiveDate::from_ymd_opt(2025, 8, 21),
                invoice_number: Some("SEFZE-1471".to_string()),
                party_name: Some("Shahi Enterprises FZE".to_string()),
                party_address: Some("Al Jazeera, Al-Hamra Ras al-Khaimah U.A.E".to_string()),
                tax_id: Some("100373811700003".to_string()),
                currency: Some("AED".to_string()),
                subtotal: Some(dec("18000.0")),
                tax_amount: Some(dec("900")),
                net_total: Some(dec("18900.00")),
                line_item_count: Some(1),
            }
        );
    }

    #[test]
    fn test_placeholders_become_null() {
        let fields = validate_payload(
            r#"{"invoice_number": "N/A", "party_name": "  ", "trn": "Unknown", "party_address": "-"}"#,
        )
        .unwrap();

        assert_eq!(fields, InvoiceFields::default());
    }

    #[test]
    fn test_wrong_types_become_null() {
        let fields = validate_payload(
            r#"{
                "date": "21/08/2025",
                "invoice_number": 1471,
                "subtotal": "eighteen thousand",
                "tax_amount": -5,
                "net_total": true,
                "currency": "$",
                "items_count": 2.5
            }"#,
        )
        .unwrap();

        assert_eq!(fields, InvoiceFields::default());
    }

    #[test]
    fn test_lenient_number_forms() {
        let fields = validate_payload(
            r#"{"subtotal": " 1500 ", "tax_amount": 7.5e1, "net_total": 0, "items_count": "3"}"#,
        )
        .unwrap();

        assert_eq!(fields.subtotal, Some(dec("1500")));
        assert_eq!(fields.tax_amount, Some(dec("75")));
        assert_eq!(fields.net_total, Some(Decimal::ZERO));
        assert_eq!(fields.line_item_count, Some(3));

        let fields = validate_payload(r#"{"items_count": 4.0}"#).unwrap();
        assert_eq!(fields.line_item_count, Some(4));
    }

    #[test]
    fn test_date_with_time_part() {
        let fields = validate_payload(r#"{"date": "2025-09-29T00:00:00Z"}"#).unwrap();
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2025, 9, 29));

        let fields = validate_payload(r#"{"date": "2025-02-30"}"#).unwrap();
        assert_eq!(fields.date, None);
    }

    #[test]
    fn test_overflowing_totals_do_not_panic() {
        let payload = r#"{"subtotal": "70000000000000000000000000000", "tax_amount": "70000000000000000000000000000", "net_total": 1}"#;

        let record = validate(payload, "big.pdf");

        assert_eq!(record.processing_status, ProcessingStatus::Success);
        assert_eq!(record.subtotal, Some(dec("70000000000000000000000000000")));
        assert!(!record.is_reconciled());
    }

    #[test]
    fn test_field_aliases() {
        let fields =
            validate_payload(r#"{"tax_id": "TRN-1", "line_item_count": 7, "trn": null}"#).unwrap();
        assert_eq!(fields.tax_id.as_deref(), Some("TRN-1"));
        assert_eq!(fields.line_item_count, Some(7));
    }
}
