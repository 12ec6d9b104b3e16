use crate::domain::error::{AppError, Result};
use lopdf::Document;
use tracing::debug;

/// Text layer of every page, pages separated by blank lines.
///
/// Scanned PDFs without a text layer come back empty rather than failing.
pub(super) fn extract(bytes: &[u8]) -> Result<String> {
    let document = Document::load_mem(bytes)
        .map_err(|e| AppError::ExtractionError(format!("Failed to load PDF: {}", e)))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());
    for page in &page_numbers {
        match document.extract_text(&[*page]) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pages.push(trimmed.to_string());
                }
            }
            Err(e) => debug!(page, error = %e, "Skipping PDF page without extractable text"),
        }
    }

    debug!(
        total_pages = page_numbers.len(),
        text_pages = pages.len(),
        "PDF text extracted"
    );
    Ok(pages.join("\n\n"))
}
