//! PDF parser: extracts page text in order via `pdf_oxide`. Page images are
//! out of scope for extraction — text-only, matching the non-goal on
//! bit-level fidelity of extracted content.

use pdf_oxide::converters::ConversionOptions;

use crate::error::{CoreError, Result};
use crate::types::ParsedDocument;

pub fn parse(data: &[u8]) -> Result<ParsedDocument> {
    let temp_path = std::env::temp_dir().join(format!("ingestcore_pdf_{}.pdf", crate::sanitize::generate_doc_id()));
    std::fs::write(&temp_path, data)?;
    let result = parse_file(&temp_path);
    let _ = std::fs::remove_file(&temp_path);
    result
}

fn parse_file(path: &std::path::Path) -> Result<ParsedDocument> {
    let mut doc = pdf_oxide::PdfDocument::open(path).map_err(|e| CoreError::Parse(format!("failed to open PDF: {e}")))?;
    let page_count = doc.page_count().map_err(|e| CoreError::Parse(format!("failed to read page count: {e}")))?;

    let options = ConversionOptions::default();
    let mut text = String::new();

    for page_idx in 0..page_count {
        match doc.to_markdown(page_idx, &options) {
            Ok(page_text) => {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(&page_text);
            }
            Err(e) => {
                tracing::warn!(page = page_idx, error = %e, "failed to extract PDF page, skipping");
            }
        }
    }

    Ok(ParsedDocument { text, images: Vec::new() })
}
