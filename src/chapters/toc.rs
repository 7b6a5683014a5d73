use super::source::PageSource;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A numbered table of contents line: label and the printed page it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    /// `"<numeral> <title>"`, e.g. `"1.2 Ownership and Borrowing"`
    pub label: String,
    pub printed_start: u32,
}

impl ChapterEntry {
    pub fn new(label: impl Into<String>, printed_start: u32) -> Self {
        ChapterEntry {
            label: label.into(),
            printed_start,
        }
    }

    /// The leading numeral of the label, if it has one.
    pub fn numeral(&self) -> Option<&str> {
        split_label(&self.label).0
    }

    /// The label with its numeral prefix removed.
    pub fn title(&self) -> &str {
        split_label(&self.label).1
    }
}

/// Split a label at its first run of whitespace into `(numeral, title)`.
pub fn split_label(label: &str) -> (Option<&str>, &str) {
    let label = label.trim();
    match label.split_once(char::is_whitespace) {
        Some((head, rest)) if head.starts_with(|c: char| c.is_ascii_digit()) => {
            (Some(head), rest.trim_start())
        }
        None if label.starts_with(|c: char| c.is_ascii_digit()) => (Some(label), ""),
        _ => (None, label),
    }
}

/// Result of scanning the front matter for numbered entries.
#[derive(Debug, Clone, Serialize)]
pub struct TocScan {
    /// Entries sorted by printed page, labels unique
    pub entries: Vec<ChapterEntry>,
    /// Physical pages that contributed at least one entry, ascending
    pub toc_pages: Vec<u32>,
}

impl TocScan {
    pub fn first(&self) -> Option<&ChapterEntry> {
        self.entries.first()
    }

    /// Last physical page that held TOC entries.
    pub fn last_toc_page(&self) -> Option<u32> {
        self.toc_pages.last().copied()
    }
}

pub struct TocExtractor {
    pattern: Regex,
    min_title_chars: usize,
}

impl TocExtractor {
    pub fn new() -> Self {
        // numeral, title (lazy), separator run of dots/whitespace, trailing page number
        let pattern = Regex::new(r"^(\d+(?:\.\d+)*\.?)\s*(.+?)[\s.]+(\d+)$")
            .expect("TOC line pattern is valid");
        TocExtractor {
            pattern,
            min_title_chars: 6,
        }
    }

    /// Parse one line of text into an entry, applying the junk filters.
    pub fn parse_line(&self, line: &str) -> Option<ChapterEntry> {
        let caps = self.pattern.captures(line.trim())?;
        let numeral = caps[1].trim();
        let title = caps[2].trim();
        let printed_page: u32 = caps[3].parse().ok()?;

        if title.chars().count() < self.min_title_chars || printed_page <= 1 {
            return None;
        }

        Some(ChapterEntry::new(
            format!("{} {}", numeral, title),
            printed_page,
        ))
    }

    /// All entries found in a block of text, in line order.
    pub fn parse_text(&self, text: &str) -> Vec<ChapterEntry> {
        text.lines().filter_map(|line| self.parse_line(line)).collect()
    }

    /// Scan the first `pages_to_scan` physical pages for numbered entries.
    ///
    /// Returns `None` when no page yields an entry.
    pub fn extract(&self, source: &dyn PageSource, pages_to_scan: u32) -> Option<TocScan> {
        let scan_limit = pages_to_scan.min(source.total_pages());
        info!(pages = scan_limit, "scanning front matter for numbered chapter entries");

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut toc_pages = Vec::new();

        for page in 1..=scan_limit {
            let text = match source.page_text(page) {
                Ok(text) => text,
                Err(e) => {
                    warn!(page, error = %e, "text extraction failed, skipping page");
                    continue;
                }
            };
            if text.trim().is_empty() {
                debug!(page, "no text on page");
                continue;
            }

            let found = self.parse_text(&text);
            if !found.is_empty() {
                toc_pages.push(page);
            }
            for entry in found {
                if seen.insert(entry.label.clone()) {
                    entries.push(entry);
                }
            }
        }

        if entries.is_empty() {
            warn!(pages = scan_limit, "no numbered chapter entries found");
            return None;
        }

        entries.sort_by_key(|e| e.printed_start);
        info!(count = entries.len(), "found numbered chapter entries");
        Some(TocScan { entries, toc_pages })
    }
}

impl Default for TocExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::source::fake::FakeBook;

    #[test]
    fn test_parse_dotted_leader() {
        let ex = TocExtractor::new();
        let entry = ex.parse_line("1 Error Handling ............ 3").unwrap();
        assert_eq!(entry.label, "1 Error Handling");
        assert_eq!(entry.printed_start, 3);
    }

    #[test]
    fn test_parse_nested_numeral_and_digit_in_title() {
        let ex = TocExtractor::new();
        let entry = ex.parse_line("2.3.1 Part 1 of the Story 45").unwrap();
        assert_eq!(entry.label, "2.3.1 Part 1 of the Story");
        assert_eq!(entry.printed_start, 45);
        assert_eq!(entry.numeral(), Some("2.3.1"));
        assert_eq!(entry.title(), "Part 1 of the Story");
    }

    #[test]
    fn test_rejects_junk() {
        let ex = TocExtractor::new();
        // title too short
        assert!(ex.parse_line("3 Index 200").is_none());
        // printed page 1 or lower
        assert!(ex.parse_line("1 Introduction 1").is_none());
        // no leading numeral
        assert!(ex.parse_line("Introduction 12").is_none());
        // no trailing page number
        assert!(ex.parse_line("1 Introduction").is_none());
    }

    #[test]
    fn test_extract_dedups_and_sorts() {
        let book = FakeBook::new(30)
            .with_text(2, "Contents\n2 Basics of Things .... 20\n1 Introduction ..... 3")
            .with_text(3, "1 Introduction ..... 3\n3 Advanced Topics 41\nPreface v");
        let scan = TocExtractor::new().extract(&book, 15).unwrap();

        let labels: Vec<_> = scan.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["1 Introduction", "2 Basics of Things", "3 Advanced Topics"]
        );
        assert!(scan
            .entries
            .windows(2)
            .all(|w| w[0].printed_start < w[1].printed_start));
        assert_eq!(scan.toc_pages, vec![2, 3]);
        assert_eq!(scan.last_toc_page(), Some(3));
    }

    #[test]
    fn test_extract_respects_scan_limit() {
        let book = FakeBook::new(30).with_text(20, "1 Introduction ..... 3");
        assert!(TocExtractor::new().extract(&book, 15).is_none());
        assert!(TocExtractor::new().extract(&book, 25).is_some());
    }

    #[test]
    fn test_no_entries_is_none() {
        let book = FakeBook::new(4).with_text(1, "A Book Title\nby Someone");
        assert!(TocExtractor::new().extract(&book, 15).is_none());
    }

    #[test]
    fn test_split_label() {
        assert_eq!(split_label("1 Introduction"), (Some("1"), "Introduction"));
        assert_eq!(split_label("1.2   Spaced  Out"), (Some("1.2"), "Spaced  Out"));
        assert_eq!(split_label("Preface"), (None, "Preface"));
    }
}
