pub mod document;
pub mod text;
pub mod words;

pub use document::{PdfChapterWriter, PdfDocument};
