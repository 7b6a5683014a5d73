//! Title-anchored offset scanning.
//!
//! Chapter openings are typeset larger than body text, and the opening page
//! carries the chapter's printed page number. A page that shows the chapter
//! title in large type *and* the expected number pins down the offset.

use super::PageOffset;
use crate::chapters::source::{PageSource, Word};
use crate::chapters::toc::{split_label, ChapterEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Which qualifying page wins when several pages pass both checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Stop at the first qualifying page
    #[default]
    First,
    /// Scan the whole window and keep the page with the largest title text
    Best,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of physical pages after the TOC to inspect
    pub window: u32,
    /// A word is "large" when its size is at least this multiple of the page baseline
    pub large_font_ratio: f32,
    /// Number of title words used for the search key
    pub title_key_words: usize,
    pub policy: MatchPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            window: 50,
            large_font_ratio: 1.5,
            title_key_words: 5,
            policy: MatchPolicy::First,
        }
    }
}

/// A page that satisfied both the title and page-number checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanHit {
    pub physical_page: u32,
    pub offset: PageOffset,
    /// Largest font size of the span that matched the title
    pub title_size: f32,
}

/// A run of consecutive large words.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageVerdict {
    /// No word on the page carries size metadata
    NoSizes,
    Miss,
    /// Title in large type, but the printed page number is absent
    TitleOnly,
    Match { title_size: f32 },
}

/// Build the search key from a chapter label: numeral stripped, first `words` words, normalized.
pub fn search_key(label: &str, words: usize) -> String {
    let (_, title) = split_label(label);
    normalize(title)
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, drop punctuation and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn round_tenth(size: f32) -> f32 {
    (size * 10.0).round() / 10.0
}

/// Most common size (rounded to one decimal); ties go to the size seen first.
pub fn baseline_size(sizes: &[f32]) -> Option<f32> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for &size in sizes {
        let tenths = (size * 10.0).round() as i64;
        match counts.iter_mut().find(|(t, _)| *t == tenths) {
            Some((_, n)) => *n += 1,
            None => counts.push((tenths, 1)),
        }
    }

    let mut best: Option<(i64, usize)> = None;
    for &(tenths, n) in &counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((tenths, n));
        }
    }
    best.map(|(tenths, _)| tenths as f32 / 10.0)
}

/// Fold the sized words of a page into spans of consecutive words at or above `threshold`.
pub fn large_spans(words: &[Word], threshold: f32) -> Vec<Span> {
    let (spans, _) = words
        .iter()
        .filter_map(|w| w.size.map(|s| (w.text.as_str(), round_tenth(s))))
        .fold(
            (Vec::<Span>::new(), false),
            |(mut spans, open), (text, size)| {
                if size < threshold {
                    return (spans, false);
                }
                match spans.last_mut() {
                    Some(span) if open => {
                        span.text.push(' ');
                        span.text.push_str(text);
                        span.size = span.size.max(size);
                    }
                    _ => spans.push(Span {
                        text: text.to_string(),
                        size,
                    }),
                }
                (spans, true)
            },
        );
    spans
}

/// Judge one page against the title key and the expected printed page number.
pub fn inspect_page(
    words: &[Word],
    page_text: &str,
    key: &str,
    page_number: &str,
    large_font_ratio: f32,
) -> PageVerdict {
    let sizes: Vec<f32> = words.iter().filter_map(|w| w.size).collect();
    let Some(baseline) = baseline_size(&sizes) else {
        return PageVerdict::NoSizes;
    };

    let title_size = large_spans(words, baseline * large_font_ratio)
        .into_iter()
        .filter(|span| normalize(&span.text).contains(key))
        .map(|span| span.size)
        .reduce(f32::max);

    match title_size {
        Some(title_size) if page_text.contains(page_number) => PageVerdict::Match { title_size },
        Some(_) => PageVerdict::TitleOnly,
        None => PageVerdict::Miss,
    }
}

/// Look for the opening page of `chapter` in the pages following `toc_end`.
///
/// Returns `None` when no page in the window shows the title in large type
/// together with the chapter's printed start page.
pub fn scan_for_title(
    source: &dyn PageSource,
    chapter: &ChapterEntry,
    toc_end: u32,
    options: &ScanOptions,
) -> Option<ScanHit> {
    let key = search_key(&chapter.label, options.title_key_words);
    if key.is_empty() {
        warn!(label = %chapter.label, "chapter title is empty after cleanup, cannot scan");
        return None;
    }
    let page_number = chapter.printed_start.to_string();

    let first = toc_end.saturating_add(1);
    let last = toc_end
        .saturating_add(options.window)
        .min(source.total_pages());
    if first > last {
        warn!(toc_end, total = source.total_pages(), "no pages to scan after the TOC");
        return None;
    }

    info!(
        key = %key,
        page_number = %page_number,
        first,
        last,
        "scanning for large-type chapter title"
    );

    let mut sized_pages = 0;
    let mut best: Option<ScanHit> = None;

    for page in first..=last {
        let words = match source.page_words(page) {
            Ok(words) if !words.is_empty() => words,
            Ok(_) => {
                debug!(page, "no words on page");
                continue;
            }
            Err(e) => {
                warn!(page, error = %e, "word extraction failed, skipping page");
                continue;
            }
        };
        let text = source.page_text(page).unwrap_or_else(|e| {
            warn!(page, error = %e, "text extraction failed");
            String::new()
        });

        match inspect_page(&words, &text, &key, &page_number, options.large_font_ratio) {
            PageVerdict::NoSizes => debug!(page, "no font size metadata on page"),
            PageVerdict::Miss => sized_pages += 1,
            PageVerdict::TitleOnly => {
                sized_pages += 1;
                info!(
                    page,
                    key = %key,
                    page_number = %page_number,
                    "large title found but printed page number missing, continuing"
                );
            }
            PageVerdict::Match { title_size } => {
                sized_pages += 1;
                let hit = ScanHit {
                    physical_page: page,
                    offset: PageOffset::from_anchor(chapter.printed_start, page),
                    title_size,
                };
                info!(page, offset = %hit.offset, "large title and printed page number found");
                match options.policy {
                    MatchPolicy::First => return Some(hit),
                    MatchPolicy::Best => {
                        if best.map_or(true, |b| title_size > b.title_size) {
                            best = Some(hit);
                        }
                    }
                }
            }
        }
    }

    if best.is_none() {
        if sized_pages == 0 {
            warn!(first, last, "no font size metadata in scan window");
        } else {
            warn!(
                label = %chapter.label,
                window = options.window,
                "chapter title and page number combination not found"
            );
        }
    }
    best
}
