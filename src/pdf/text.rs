use anyhow::{Context, Result};
use lopdf::Document;

/// Extract the text of every page with pdf-extract, one string per page.
pub fn extract_text_by_pages(pdf_bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        .context("Failed to extract text from PDF")
}

/// Extract the text of a single page with lopdf's own text extraction.
pub fn extract_page_text(doc: &Document, page: u32) -> Result<String> {
    doc.extract_text(&[page])
        .with_context(|| format!("Failed to extract text from page {}", page))
}
