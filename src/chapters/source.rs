use anyhow::Result;
use std::path::Path;

/// A single word on a page, as reported by the reading backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    /// Rendered font size, if the backend could determine one
    pub size: Option<f32>,
    pub x: f32,
    pub y: f32,
}

impl Word {
    pub fn new(text: impl Into<String>, size: Option<f32>) -> Self {
        Word {
            text: text.into(),
            size,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Random access to the pages of a source document.
///
/// Page numbers are physical and 1-indexed.
pub trait PageSource {
    fn total_pages(&self) -> u32;

    /// Plain text of a page. An empty string means the page has no text.
    fn page_text(&self, page: u32) -> Result<String>;

    /// Words of a page in content order, with font-size metadata where known.
    fn page_words(&self, page: u32) -> Result<Vec<Word>>;

    /// Document info entries as key/value pairs.
    fn metadata(&self) -> Vec<(String, String)>;
}

/// Writes a contiguous range of physical pages of the source to a new file.
pub trait ChapterWriter {
    fn write_pages(&mut self, start: u32, end: u32, path: &Path) -> Result<()>;
}
