use super::offset::PageOffset;
use super::ranges::ChapterRange;
use super::source::ChapterWriter;
use super::toc::split_label;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A chapter range translated into physical pages of the source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChapterRange {
    pub label: String,
    pub printed_start: i64,
    pub printed_end: i64,
    pub file_start: u32,
    pub file_end: u32,
}

/// A chapter left out because its physical range does not fit the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChapter {
    pub label: String,
    pub printed_start: i64,
    pub printed_end: i64,
    pub file_start: i64,
    pub file_end: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenChapter {
    pub label: String,
    pub path: PathBuf,
    pub file_start: u32,
    pub file_end: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedChapter {
    pub label: String,
    pub path: PathBuf,
    pub error: String,
}

/// Apply the offset to one printed range and check it against the page count.
pub fn project_range(
    range: &ChapterRange,
    offset: PageOffset,
    total_pages: u32,
) -> Result<FileChapterRange, SkippedChapter> {
    let file_start = offset.to_physical(range.printed_start);
    let file_end = offset.to_physical(range.printed_end);
    let total = i64::from(total_pages);

    let reason = if file_start < 1 {
        Some("starts before the first page".to_string())
    } else if file_end > total {
        Some(format!("ends after the last page ({})", total_pages))
    } else if file_start > file_end {
        Some("start is after end".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SkippedChapter {
            label: range.label.clone(),
            printed_start: range.printed_start,
            printed_end: range.printed_end,
            file_start,
            file_end,
            reason,
        }),
        None => Ok(FileChapterRange {
            label: range.label.clone(),
            printed_start: range.printed_start,
            printed_end: range.printed_end,
            file_start: file_start as u32,
            file_end: file_end as u32,
        }),
    }
}

/// Project every range, splitting them into writable and skipped chapters.
pub fn project_ranges(
    ranges: &[ChapterRange],
    offset: PageOffset,
    total_pages: u32,
) -> (Vec<FileChapterRange>, Vec<SkippedChapter>) {
    let mut valid = Vec::new();
    let mut skipped = Vec::new();

    for range in ranges {
        match project_range(range, offset, total_pages) {
            Ok(file_range) => valid.push(file_range),
            Err(skip) => {
                warn!(
                    label = %skip.label,
                    printed = %format!("{}-{}", skip.printed_start, skip.printed_end),
                    file = %format!("{}-{}", skip.file_start, skip.file_end),
                    total_pages,
                    offset = %offset,
                    reason = %skip.reason,
                    "skipping chapter with invalid file page range"
                );
                skipped.push(skip);
            }
        }
    }

    (valid, skipped)
}

/// Replace anything but letters, digits, `_` and `-` with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Output file name for a chapter label: `<numeral>_<title>.pdf`.
pub fn chapter_filename(label: &str) -> String {
    let (numeral, title) = split_label(label);
    let title = match sanitize_title(title) {
        t if t.is_empty() => "chapter".to_string(),
        t => t,
    };
    match numeral {
        Some(numeral) => format!("{}_{}.pdf", numeral, title),
        None => format!("{}.pdf", title),
    }
}

/// `chapter_filename`, suffixed with `_2`, `_3`, ... if an earlier chapter of
/// this run already took the name.
fn unique_filename(label: &str, used: &mut HashSet<String>) -> String {
    let name = chapter_filename(label);
    if used.insert(name.clone()) {
        return name;
    }

    let stem = name.trim_end_matches(".pdf");
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}.pdf", stem, n);
        if used.insert(candidate.clone()) {
            warn!(label, file = %candidate, "file name already used by another chapter");
            return candidate;
        }
        n += 1;
    }
}

/// Write each chapter through `writer`. A failed chapter does not stop the rest.
pub fn write_chapters(
    writer: &mut dyn ChapterWriter,
    chapters: &[FileChapterRange],
    output_dir: &Path,
) -> (Vec<WrittenChapter>, Vec<FailedChapter>) {
    let mut written = Vec::new();
    let mut failed = Vec::new();
    let mut used = HashSet::new();

    for chapter in chapters {
        let path = output_dir.join(unique_filename(&chapter.label, &mut used));
        match writer.write_pages(chapter.file_start, chapter.file_end, &path) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    file_pages = %format!("{}-{}", chapter.file_start, chapter.file_end),
                    printed_pages = %format!("{}-{}", chapter.printed_start, chapter.printed_end),
                    "wrote chapter"
                );
                written.push(WrittenChapter {
                    label: chapter.label.clone(),
                    path,
                    file_start: chapter.file_start,
                    file_end: chapter.file_end,
                });
            }
            Err(e) => {
                error!(label = %chapter.label, path = %path.display(), error = %e, "failed to write chapter");
                failed.push(FailedChapter {
                    label: chapter.label.clone(),
                    path,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    (written, failed)
}
