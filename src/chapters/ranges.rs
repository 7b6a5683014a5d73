use super::toc::ChapterEntry;
use serde::Serialize;
use tracing::debug;

/// A chapter's closed page range in printed-page space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRange {
    pub label: String,
    pub printed_start: i64,
    pub printed_end: i64,
}

impl ChapterRange {
    pub fn page_count(&self) -> i64 {
        self.printed_end - self.printed_start + 1
    }
}

/// Turn chapter start pages into closed ranges.
///
/// Each chapter ends the page before the next one starts; the last one ends at
/// `last_printed_page`. Entries must already be sorted by printed page.
/// Chapters that would end before they start are dropped.
pub fn map_starts_to_ranges(entries: &[ChapterEntry], last_printed_page: i64) -> Vec<ChapterRange> {
    let mut ranges = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let start = i64::from(entry.printed_start);
        let end = match entries.get(i + 1) {
            Some(next) => i64::from(next.printed_start) - 1,
            None => last_printed_page,
        };

        if start > end {
            debug!(label = %entry.label, start, end, "dropping empty chapter range");
            continue;
        }

        ranges.push(ChapterRange {
            label: entry.label.clone(),
            printed_start: start,
            printed_end: end,
        });
    }

    ranges
}
