//! Fixed extraction prompt sent to the completion service.

/// Payload keys the model is asked to return, in template order.
pub const PAYLOAD_KEYS: [&str; 10] = [
    "date",
    "invoice_number",
    "party_name",
    "party_address",
    "trn",
    "subtotal",
    "tax_amount",
    "net_total",
    "currency",
    "items_count",
];

/// Instruction template preceding the document text.
pub const EXTRACTION_TEMPLATE: &str = r#"You are an expert invoice data extraction system.

Analyze the invoice document and extract the following information with precision:

CRITICAL: Return ONLY a valid JSON object with NO additional text, explanations, or markdown formatting.

Required JSON structure:
{
  "date": "YYYY-MM-DD format (convert any date format to this)",
  "invoice_number": "string (invoice/bill number)",
  "party_name": "string (vendor/supplier name)",
  "party_address": "string (complete vendor address)",
  "trn": "string or null (Tax Registration Number/VAT/TIN)",
  "subtotal": number (amount before tax),
  "tax_amount": number (total tax/VAT amount),
  "net_total": number (final amount including tax),
  "currency": "string (currency code like USD, EUR, AED, etc.)",
  "items_count": number (number of line items, or null if not clear)
}

Rules:
- Use null for missing fields (not "N/A", "Unknown", or empty strings)
- All numbers must be numeric values without currency symbols
- Date must be in YYYY-MM-DD format
- Extract the most prominent company name as party_name
- Return ONLY the JSON object, no other text
"#;

/// Build the extraction prompt for a document's text.
pub fn build_prompt(document_text: &str) -> String {
    let mut prompt = String::with_capacity(EXTRACTION_TEMPLATE.len() + document_text.len() + 24);
    prompt.push_str(EXTRACTION_TEMPLATE);
    prompt.push_str("\n\nInvoice content:\n");
    prompt.push_str(document_text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_names_every_key() {
        for key in PAYLOAD_KEYS {
            assert!(
                EXTRACTION_TEMPLATE.contains(&format!("\"{}\":", key)),
                "missing key {}",
                key
            );
        }
    }

    #[test]
    fn test_prompt_ends_with_document() {
        let prompt = build_prompt("INVOICE #42\nTotal: 10.00");
        assert!(prompt.starts_with(EXTRACTION_TEMPLATE));
        assert!(prompt.ends_with("Invoice content:\nINVOICE #42\nTotal: 10.00"));
    }
}
