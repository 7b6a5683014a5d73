use super::offset::OffsetResolution;
use super::project::{FileChapterRange, SkippedChapter};
use super::source::PageSource;
use super::toc::ChapterEntry;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

pub const TOC_CONTENTS_FILE: &str = "toc_contents.txt";
pub const METADATA_FILE: &str = "metadata.txt";
pub const OFFSET_REPORT_FILE: &str = "offset_report.txt";

/// Raw text of the given physical pages, each headed by its page number.
pub fn toc_text(source: &dyn PageSource, first: u32, last: u32) -> String {
    let total = source.total_pages();
    if first == 0 || last > total || first > last {
        return format!(
            "Warning: TOC file page range ({}-{}) is outside the document bounds ({} pages total).",
            first, last, total
        );
    }

    let mut out = String::new();
    for page in first..=last {
        match source.page_text(page) {
            Ok(text) if !text.trim().is_empty() => {
                let _ = writeln!(out, "\n--- File Page {} ---", page);
                out.push_str(&text);
            }
            Ok(_) => {}
            Err(e) => warn!(page, error = %e, "text extraction failed for TOC dump"),
        }
    }
    out.trim().to_string()
}

pub fn metadata_text(pdf_path: &Path, metadata: &[(String, String)]) -> String {
    let mut out = format!("--- PDF METADATA FOR: {} ---\n\n", pdf_path.display());
    if metadata.is_empty() {
        out.push_str("No metadata found.");
        return out;
    }
    for (key, value) in metadata {
        let _ = writeln!(out, "{}: {}", key.trim_start_matches('/'), value);
    }
    out
}

/// Chapter list, chosen offset and per-chapter outcome.
pub fn results_report(
    entries: &[ChapterEntry],
    resolution: &OffsetResolution,
    files: &[FileChapterRange],
    skipped: &[SkippedChapter],
) -> String {
    let mut out = String::from("--- CHAPTER OFFSET REPORT ---\n");
    let _ = writeln!(out, "Method: {}", resolution.method);
    let _ = writeln!(
        out,
        "Anchor: printed page {} found on file page {}",
        resolution.anchor.printed, resolution.anchor.physical
    );
    let _ = writeln!(out, "Offset: {} pages\n", resolution.offset);

    out.push_str("Table of contents:\n");
    for entry in entries {
        let _ = writeln!(out, "{:<40} Page {}", entry.label, entry.printed_start);
    }

    out.push_str("\nChapters:\n");
    for file in files {
        let _ = writeln!(
            out,
            "{:<40} printed {}-{}  file {}-{}",
            file.label, file.printed_start, file.printed_end, file.file_start, file.file_end
        );
    }
    for skip in skipped {
        let _ = writeln!(
            out,
            "{:<40} printed {}-{}  file {}-{}  SKIPPED: {}",
            skip.label,
            skip.printed_start,
            skip.printed_end,
            skip.file_start,
            skip.file_end,
            skip.reason
        );
    }
    out
}

pub fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::offset::{Anchor, OffsetMethod};
    use crate::chapters::source::fake::FakeBook;

    #[test]
    fn test_toc_text_headers() {
        let book = FakeBook::new(10)
            .with_text(5, "Contents")
            .with_text(6, "1 Introduction 3");
        let text = toc_text(&book, 5, 7);
        assert_eq!(
            text,
            "--- File Page 5 ---\nContents\n--- File Page 6 ---\n1 Introduction 3"
        );
        assert!(toc_text(&book, 5, 11).starts_with("Warning"));
    }

    #[test]
    fn test_metadata_text() {
        let path = Path::new("book.pdf");
        assert!(metadata_text(path, &[]).ends_with("No metadata found."));
        let text = metadata_text(path, &[("/Title".into(), "Rust".into())]);
        assert!(text.contains("Title: Rust\n"));
    }

    #[test]
    fn test_results_report_written() {
        let resolution = OffsetResolution::from_anchor(
            Anchor {
                printed: 3,
                physical: 27,
            },
            OffsetMethod::ManualPrompt,
        );
        let entries = vec![ChapterEntry::new("1 Introduction", 3)];
        let files = vec![FileChapterRange {
            label: "1 Introduction".into(),
            printed_start: 3,
            printed_end: 19,
            file_start: 27,
            file_end: 43,
        }];
        let report = results_report(&entries, &resolution, &files, &[]);
        assert!(report.contains("Offset: +24 pages"));
        assert!(report.contains("file 27-43"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OFFSET_REPORT_FILE);
        write_report(&path, &report).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), report);
    }
}
