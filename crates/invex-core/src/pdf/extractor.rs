//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::debug;

use crate::error::DocumentError;

/// PDF text extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Load a PDF from bytes.
    pub fn load(&mut self, data: &[u8]) -> Result<(), DocumentError> {
        let mut doc = Document::load_mem(data).map_err(|e| DocumentError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(DocumentError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf_extract reads the decrypted copy
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| DocumentError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(DocumentError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    /// Get the number of pages of the loaded PDF.
    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    /// Extract text from the entire PDF.
    pub fn extract_text(&self) -> Result<String, DocumentError> {
        if self.document.is_none() {
            return Err(DocumentError::Parse("no document loaded".to_string()));
        }

        let raw = pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        let text = normalize_text(&raw);
        debug!("Extracted {} chars from {} pages", text.len(), self.page_count());
        Ok(text)
    }
}

/// Drop page breaks and trailing spaces, and collapse runs of blank lines.
fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;

    for line in raw.split(['\n', '\u{c}']) {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}
