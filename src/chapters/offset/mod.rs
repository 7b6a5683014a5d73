//! Printed-page to physical-page offset resolution.
//!
//! An offset is solved from a single anchor (a printed page and the physical
//! page it appears on). Strategies are tried in order until one produces an
//! anchor; the resulting offset is then fixed for the rest of the run.

pub mod scan;

use crate::chapters::source::PageSource;
use crate::chapters::toc::ChapterEntry;
use anyhow::{Context, Result};
use scan::{scan_for_title, ScanOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::{info, warn};

/// `physical = printed + offset` for every numbered body page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageOffset(i64);

impl PageOffset {
    pub fn new(value: i64) -> Self {
        PageOffset(value)
    }

    /// Solve the offset from a printed page and the physical page it sits on.
    pub fn from_anchor(printed: u32, physical: u32) -> Self {
        PageOffset(i64::from(physical) - i64::from(printed))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn to_physical(self, printed: i64) -> i64 {
        printed + self.0
    }

    pub fn to_printed(self, physical: i64) -> i64 {
        physical - self.0
    }
}

impl fmt::Display for PageOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// A printed page paired with the physical page that shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub printed: u32,
    pub physical: u32,
}

impl Anchor {
    pub fn offset(&self) -> PageOffset {
        PageOffset::from_anchor(self.printed, self.physical)
    }
}

impl FromStr for Anchor {
    type Err = String;

    /// Parse `PRINTED:PHYSICAL`, e.g. `3:27`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (printed, physical) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid anchor '{}': expected PRINTED:PHYSICAL", s))?;
        let parse = |part: &str| -> Result<u32, String> {
            match part.trim().parse::<u32>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(format!("Invalid page number in anchor: {}", part)),
            }
        };
        Ok(Anchor {
            printed: parse(printed)?,
            physical: parse(physical)?,
        })
    }
}

/// The printed page whose physical location a human is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorTarget {
    pub label: Option<String>,
    pub printed: u32,
}

impl AnchorTarget {
    /// Prefer the first chapter's start page; fall back to `default_page`.
    pub fn choose(first_chapter: Option<&ChapterEntry>, default_page: u32) -> Self {
        match first_chapter {
            Some(entry) if entry.printed_start > default_page => AnchorTarget {
                label: Some(entry.label.clone()),
                printed: entry.printed_start,
            },
            _ => AnchorTarget {
                label: None,
                printed: default_page,
            },
        }
    }

    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("chapter '{}' (printed page {})", label, self.printed),
            None => format!("the book's core content (printed page {})", self.printed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMethod {
    TitleScan,
    ManualPrompt,
    ConfiguredAnchor,
}

impl fmt::Display for OffsetMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OffsetMethod::TitleScan => "title-based scan (large font title & page number)",
            OffsetMethod::ManualPrompt => "manual input",
            OffsetMethod::ConfiguredAnchor => "configured anchor",
        };
        f.write_str(name)
    }
}

/// A resolved offset together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetResolution {
    pub offset: PageOffset,
    pub method: OffsetMethod,
    pub anchor: Anchor,
}

impl OffsetResolution {
    pub fn from_anchor(anchor: Anchor, method: OffsetMethod) -> Self {
        OffsetResolution {
            offset: anchor.offset(),
            method,
            anchor,
        }
    }
}

/// What the strategies know about the document.
pub struct OffsetContext<'a> {
    pub source: &'a dyn PageSource,
    pub first_chapter: Option<&'a ChapterEntry>,
    pub target: AnchorTarget,
}

pub trait OffsetStrategy {
    fn method(&self) -> OffsetMethod;

    /// `Ok(None)` means this strategy could not produce an anchor.
    fn resolve(&mut self, ctx: &OffsetContext<'_>) -> Result<Option<OffsetResolution>>;
}

/// Find the first chapter's opening page by its large-type title.
pub struct TitleScan {
    pub toc_end: u32,
    pub options: ScanOptions,
}

impl OffsetStrategy for TitleScan {
    fn method(&self) -> OffsetMethod {
        OffsetMethod::TitleScan
    }

    fn resolve(&mut self, ctx: &OffsetContext<'_>) -> Result<Option<OffsetResolution>> {
        let Some(chapter) = ctx.first_chapter else {
            info!("no chapter entry to anchor a title scan, skipping");
            return Ok(None);
        };
        Ok(
            scan_for_title(ctx.source, chapter, self.toc_end, &self.options).map(|hit| {
                OffsetResolution::from_anchor(
                    Anchor {
                        printed: chapter.printed_start,
                        physical: hit.physical_page,
                    },
                    OffsetMethod::TitleScan,
                )
            }),
        )
    }
}

/// Ask a human for the physical page of the anchor target.
///
/// A blank line or end of input declines, letting the next strategy run.
pub struct ManualPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ManualPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ManualPrompt { input, output }
    }

    fn read_page(&mut self, target: &AnchorTarget) -> Result<Option<u32>> {
        let target = target.describe();
        writeln!(
            self.output,
            "\nAutomatic detection failed. Open the PDF and navigate to the start of {}.",
            target
        )?;

        loop {
            write!(
                self.output,
                "Enter the file page number (1-indexed) shown in your PDF viewer, or leave blank to skip: "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("Failed to read page number")?;
            let line = line.trim();
            if read == 0 || line.is_empty() {
                return Ok(None);
            }

            match line.parse::<i64>() {
                Ok(n) if n >= 1 && n <= i64::from(u32::MAX) => return Ok(Some(n as u32)),
                Ok(_) => writeln!(self.output, "Invalid input: page number must be 1 or greater.")?,
                Err(_) => writeln!(self.output, "Invalid input: please enter a whole number.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> OffsetStrategy for ManualPrompt<R, W> {
    fn method(&self) -> OffsetMethod {
        OffsetMethod::ManualPrompt
    }

    fn resolve(&mut self, ctx: &OffsetContext<'_>) -> Result<Option<OffsetResolution>> {
        Ok(self.read_page(&ctx.target)?.map(|physical| {
            OffsetResolution::from_anchor(
                Anchor {
                    printed: ctx.target.printed,
                    physical,
                },
                OffsetMethod::ManualPrompt,
            )
        }))
    }
}

/// An anchor supplied up front in configuration.
pub struct ConfiguredAnchor(pub Anchor);

impl OffsetStrategy for ConfiguredAnchor {
    fn method(&self) -> OffsetMethod {
        OffsetMethod::ConfiguredAnchor
    }

    fn resolve(&mut self, _ctx: &OffsetContext<'_>) -> Result<Option<OffsetResolution>> {
        Ok(Some(OffsetResolution::from_anchor(
            self.0,
            OffsetMethod::ConfiguredAnchor,
        )))
    }
}

/// Try each strategy in order; the first one to produce an offset wins.
pub fn resolve_offset(
    strategies: &mut [Box<dyn OffsetStrategy + '_>],
    ctx: &OffsetContext<'_>,
) -> Result<Option<OffsetResolution>> {
    for strategy in strategies.iter_mut() {
        let method = strategy.method();
        match strategy.resolve(ctx)? {
            Some(resolution) => {
                info!(
                    method = %method,
                    offset = %resolution.offset,
                    printed = resolution.anchor.printed,
                    physical = resolution.anchor.physical,
                    "page offset resolved"
                );
                return Ok(Some(resolution));
            }
            None => warn!(method = %method, "offset strategy did not produce an anchor"),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::source::fake::FakeBook;
    use std::io::Cursor;

    #[test]
    fn test_offset_round_trip() {
        for offset in [-7, 0, 3, 24, 400] {
            let o = PageOffset::new(offset);
            for printed in [1, 2, 19, 20, 640] {
                let physical = o.to_physical(printed);
                assert_eq!(physical, printed + offset);
                assert_eq!(o.to_printed(physical), printed);
            }
        }
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(PageOffset::new(24).to_string(), "+24");
        assert_eq!(PageOffset::new(-2).to_string(), "-2");
        assert_eq!(PageOffset::new(0).to_string(), "+0");
    }

    #[test]
    fn test_anchor_parse() {
        let anchor: Anchor = "3:27".parse().unwrap();
        assert_eq!(anchor, Anchor { printed: 3, physical: 27 });
        assert_eq!(anchor.offset().value(), 24);
        assert!("27".parse::<Anchor>().is_err());
        assert!("0:5".parse::<Anchor>().is_err());
        assert!("3:x".parse::<Anchor>().is_err());
    }

    #[test]
    fn test_anchor_target_choice() {
        let entry = ChapterEntry::new("1 Error Handling", 3);
        let target = AnchorTarget::choose(Some(&entry), 1);
        assert_eq!(target.printed, 3);
        assert_eq!(target.label.as_deref(), Some("1 Error Handling"));

        let fallback = AnchorTarget::choose(None, 1);
        assert_eq!(fallback.printed, 1);
        assert!(fallback.label.is_none());
    }

    fn ctx<'a>(book: &'a FakeBook, entry: Option<&'a ChapterEntry>) -> OffsetContext<'a> {
        OffsetContext {
            source: book,
            first_chapter: entry,
            target: AnchorTarget::choose(entry, 1),
        }
    }

    #[test]
    fn test_manual_prompt_revalidates() {
        let book = FakeBook::new(50);
        let entry = ChapterEntry::new("1 Error Handling", 3);
        let mut out = Vec::new();
        let mut prompt = ManualPrompt::new(Cursor::new("abc\n-4\n0\n27\n"), &mut out);

        let resolution = prompt.resolve(&ctx(&book, Some(&entry))).unwrap().unwrap();
        assert_eq!(resolution.offset.value(), 24);
        assert_eq!(resolution.method, OffsetMethod::ManualPrompt);
        assert_eq!(resolution.anchor, Anchor { printed: 3, physical: 27 });

        let transcript = String::from_utf8(out).unwrap();
        assert_eq!(transcript.matches("Invalid input").count(), 3);
    }

    #[test]
    fn test_manual_prompt_blank_or_eof_declines() {
        let book = FakeBook::new(50);
        let mut blank = ManualPrompt::new(Cursor::new("\n"), Vec::new());
        assert!(blank.resolve(&ctx(&book, None)).unwrap().is_none());

        let mut eof = ManualPrompt::new(Cursor::new(""), Vec::new());
        assert!(eof.resolve(&ctx(&book, None)).unwrap().is_none());
    }

    #[test]
    fn test_pipeline_falls_through_in_order() {
        // no sized words anywhere: the scan cannot succeed
        let book = FakeBook::new(50).with_text(27, "Error Handling 3");
        let entry = ChapterEntry::new("1 Error Handling", 3);
        let mut strategies: Vec<Box<dyn OffsetStrategy>> = vec![
            Box::new(TitleScan {
                toc_end: 8,
                options: ScanOptions::default(),
            }),
            Box::new(ManualPrompt::new(Cursor::new("\n"), Vec::new())),
            Box::new(ConfiguredAnchor(Anchor {
                printed: 1,
                physical: 25,
            })),
        ];

        let resolution = resolve_offset(&mut strategies, &ctx(&book, Some(&entry)))
            .unwrap()
            .unwrap();
        assert_eq!(resolution.method, OffsetMethod::ConfiguredAnchor);
        assert_eq!(resolution.offset.value(), 24);
    }

    #[test]
    fn test_pipeline_stops_at_first_success() {
        let book = FakeBook::new(50).with_words(
            27,
            &[
                ("Error", 24.0),
                ("Handling", 24.0),
                ("body", 10.0),
                ("text", 10.0),
                ("3", 10.0),
            ],
        );
        let entry = ChapterEntry::new("1 Error Handling", 3);
        let mut strategies: Vec<Box<dyn OffsetStrategy>> = vec![
            Box::new(TitleScan {
                toc_end: 8,
                options: ScanOptions::default(),
            }),
            Box::new(ConfiguredAnchor(Anchor {
                printed: 1,
                physical: 1,
            })),
        ];

        let resolution = resolve_offset(&mut strategies, &ctx(&book, Some(&entry)))
            .unwrap()
            .unwrap();
        assert_eq!(resolution.method, OffsetMethod::TitleScan);
        assert_eq!(resolution.anchor, Anchor { printed: 3, physical: 27 });
    }

    #[test]
    fn test_pipeline_exhausted() {
        let book = FakeBook::new(10);
        let mut strategies: Vec<Box<dyn OffsetStrategy>> = vec![Box::new(ManualPrompt::new(
            Cursor::new(""),
            Vec::new(),
        ))];
        assert!(resolve_offset(&mut strategies, &ctx(&book, None))
            .unwrap()
            .is_none());
    }
}
