use super::{text, words};
use crate::chapters::source::{ChapterWriter, PageSource, Word};
use anyhow::{bail, Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PdfDocument {
    pub doc: Document,
    path: PathBuf,
    bytes: Vec<u8>,
    pages: BTreeMap<u32, ObjectId>,
    /// Per-page text from pdf-extract; `None` if it could not process the file
    page_texts: OnceCell<Option<Vec<String>>>,
}

impl PdfDocument {
    /// Open a PDF for reading. Missing, unparseable and encrypted files are errors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))?;
        let doc = Document::load_mem(&bytes)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        if doc.is_encrypted() {
            bail!("PDF is encrypted: {}", path.display());
        }

        let pages = doc.get_pages();
        debug!(path = %path.display(), pages = pages.len(), "opened PDF");
        Ok(PdfDocument {
            doc,
            path: path.to_path_buf(),
            bytes,
            pages,
            page_texts: OnceCell::new(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages.get(&page).copied().with_context(|| {
            format!("Page {} is out of range (1-{})", page, self.page_count())
        })
    }

    fn extracted_texts(&self) -> Option<&Vec<String>> {
        self.page_texts
            .get_or_init(|| match text::extract_text_by_pages(&self.bytes) {
                Ok(texts) if texts.len() == self.pages.len() => Some(texts),
                Ok(texts) => {
                    warn!(
                        path = %self.path.display(),
                        extracted = texts.len(),
                        pages = self.pages.len(),
                        "pdf-extract page count mismatch, using lopdf text extraction"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %format!("{:#}", e),
                        "pdf-extract failed, using lopdf text extraction"
                    );
                    None
                }
            })
            .as_ref()
    }

    /// Document info entries, keys without the leading slash
    pub fn info_entries(&self) -> Vec<(String, String)> {
        let dict = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(info_ref)) => match self.doc.get_dictionary(*info_ref) {
                Ok(dict) => dict,
                Err(_) => return Vec::new(),
            },
            Ok(Object::Dictionary(dict)) => dict,
            _ => return Vec::new(),
        };
        info_dict_entries(dict)
    }

    /// A copy of the document holding only physical pages `start..=end`
    pub fn extract_range(&self, start: u32, end: u32) -> Result<Document> {
        let total = self.page_count();
        if start == 0 || end > total || start > end {
            bail!("Page range {}-{} is out of range (1-{})", start, end, total);
        }

        let mut new_doc = self.doc.clone();
        let pages_to_delete: Vec<u32> = self
            .pages
            .keys()
            .copied()
            .filter(|num| *num < start || *num > end)
            .collect();
        if !pages_to_delete.is_empty() {
            new_doc.delete_pages(&pages_to_delete);
            new_doc.prune_objects();
        }

        Ok(new_doc)
    }

    /// Save to a file
    pub fn save<P: AsRef<Path>>(doc: &mut Document, path: P) -> Result<()> {
        doc.save(&path)
            .with_context(|| format!("Failed to save PDF: {}", path.as_ref().display()))?;
        Ok(())
    }
}

impl PageSource for PdfDocument {
    fn total_pages(&self) -> u32 {
        self.page_count()
    }

    fn page_text(&self, page: u32) -> Result<String> {
        self.page_id(page)?;
        match self.extracted_texts() {
            Some(texts) => Ok(texts[(page - 1) as usize].clone()),
            None => text::extract_page_text(&self.doc, page),
        }
    }

    fn page_words(&self, page: u32) -> Result<Vec<Word>> {
        let page_id = self.page_id(page)?;
        words::extract_page_words(&self.doc, page_id)
            .with_context(|| format!("Failed to extract words from page {}", page))
    }

    fn metadata(&self) -> Vec<(String, String)> {
        self.info_entries()
    }
}

/// Writes chapter ranges of an open document to new files.
pub struct PdfChapterWriter<'a> {
    source: &'a PdfDocument,
}

impl<'a> PdfChapterWriter<'a> {
    pub fn new(source: &'a PdfDocument) -> Self {
        PdfChapterWriter { source }
    }
}

impl ChapterWriter for PdfChapterWriter<'_> {
    fn write_pages(&mut self, start: u32, end: u32, path: &Path) -> Result<()> {
        let mut new_doc = self.source.extract_range(start, end)?;
        PdfDocument::save(&mut new_doc, path)?;
        info!(
            source = %self.source.path.display(),
            path = %path.display(),
            start,
            end,
            "saved chapter PDF"
        );
        Ok(())
    }
}

fn info_dict_entries(dict: &Dictionary) -> Vec<(String, String)> {
    dict.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Object::String(bytes, _) => decode_pdf_string(bytes),
                Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
                Object::Integer(i) => i.to_string(),
                Object::Real(r) => r.to_string(),
                Object::Boolean(b) => b.to_string(),
                _ => return None,
            };
            Some((String::from_utf8_lossy(key).into_owned(), value))
        })
        .collect()
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    // Check for UTF-16 BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let u16_chars: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        String::from_utf16_lossy(&u16_chars)
    } else {
        // PDFDocEncoding / Latin-1 (simplified)
        bytes.iter().map(|&b| b as char).collect()
    }
}
