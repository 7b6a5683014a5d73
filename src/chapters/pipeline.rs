//! End-to-end split of one document: TOC, offset, ranges, projection, output.

use super::offset::{
    resolve_offset, AnchorTarget, ConfiguredAnchor, OffsetContext, OffsetResolution,
    OffsetStrategy, TitleScan,
};
use super::project::{
    project_ranges, write_chapters, FailedChapter, FileChapterRange, SkippedChapter,
    WrittenChapter,
};
use super::ranges::{map_starts_to_ranges, ChapterRange};
use super::report;
use super::source::{ChapterWriter, PageSource};
use super::toc::{TocExtractor, TocScan};
use crate::config::SplitConfig;
use crate::page_range::resolve_span;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Everything decided before any file is written.
#[derive(Debug, Clone, Serialize)]
pub struct SplitPlan {
    pub toc: TocScan,
    /// Physical pages treated as the TOC, inclusive
    pub toc_bounds: (u32, u32),
    pub resolution: OffsetResolution,
    pub last_printed_page: i64,
    pub ranges: Vec<ChapterRange>,
    pub files: Vec<FileChapterRange>,
    pub skipped: Vec<SkippedChapter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub plan: SplitPlan,
    pub written: Vec<WrittenChapter>,
    pub failed: Vec<FailedChapter>,
    /// Side reports that could not be written
    pub failed_reports: Vec<PathBuf>,
}

/// Scan the front matter for numbered entries, failing if there are none.
pub fn detect_chapters(source: &dyn PageSource, config: &SplitConfig) -> Result<TocScan> {
    TocExtractor::new()
        .extract(source, config.toc_scan_pages)
        .ok_or_else(|| {
            anyhow!(
                "No numbered chapter entries found in the first {} pages; nothing to split. \
                 Make sure the PDF is text-based.",
                config.toc_scan_pages
            )
        })
}

/// The configured TOC pages, or the pages that actually held entries.
pub fn toc_bounds(source: &dyn PageSource, config: &SplitConfig, toc: &TocScan) -> Result<(u32, u32)> {
    if let Some(pages) = &config.toc_pages {
        return resolve_span(pages, source.total_pages())
            .with_context(|| format!("Invalid TOC page range: {}", pages));
    }
    match (toc.toc_pages.first(), toc.last_toc_page()) {
        (Some(&first), Some(last)) => Ok((first, last)),
        _ => Err(anyhow!("TOC scan recorded no pages")),
    }
}

/// Title scan first, then whatever fallback the caller supplies, then the configured anchor.
pub fn default_strategies<'a>(
    config: &SplitConfig,
    toc_end: u32,
    prompt: Option<Box<dyn OffsetStrategy + 'a>>,
) -> Vec<Box<dyn OffsetStrategy + 'a>> {
    let mut strategies: Vec<Box<dyn OffsetStrategy + 'a>> = vec![Box::new(TitleScan {
        toc_end,
        options: config.scan_options(),
    })];
    strategies.extend(prompt);
    if let Some(anchor) = config.anchor {
        strategies.push(Box::new(ConfiguredAnchor(anchor)));
    }
    strategies
}

/// Resolve the offset and compute every chapter's physical page range.
pub fn plan_split<'a>(
    source: &dyn PageSource,
    config: &SplitConfig,
    prompt: Option<Box<dyn OffsetStrategy + 'a>>,
) -> Result<SplitPlan> {
    let toc = detect_chapters(source, config)?;
    let bounds = toc_bounds(source, config, &toc)?;

    let target = AnchorTarget::choose(toc.first(), config.default_anchor_page);
    let ctx = OffsetContext {
        source,
        first_chapter: toc.first(),
        target: target.clone(),
    };
    let mut strategies = default_strategies(config, bounds.1, prompt);
    let resolution = resolve_offset(&mut strategies, &ctx)?.ok_or_else(|| {
        anyhow!(
            "Could not determine the page offset. Find the file page showing {} \
             and pass it with --anchor {}:<file page>",
            target.describe(),
            target.printed
        )
    })?;

    let total = source.total_pages();
    let last_printed_page = config
        .last_printed_page
        .unwrap_or_else(|| resolution.offset.to_printed(i64::from(total)));

    let ranges = map_starts_to_ranges(&toc.entries, last_printed_page);
    let (files, skipped) = project_ranges(&ranges, resolution.offset, total);
    info!(
        chapters = ranges.len(),
        writable = files.len(),
        skipped = skipped.len(),
        offset = %resolution.offset,
        "planned chapter split"
    );

    Ok(SplitPlan {
        toc,
        toc_bounds: bounds,
        resolution,
        last_printed_page,
        ranges,
        files,
        skipped,
    })
}

/// Plan the split, write the side reports and then every chapter file.
pub fn run_split<'a>(
    source: &dyn PageSource,
    writer: &mut dyn ChapterWriter,
    config: &SplitConfig,
    pdf_path: &Path,
    prompt: Option<Box<dyn OffsetStrategy + 'a>>,
) -> Result<SplitOutcome> {
    let output_dir = config.output_dir.as_path();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let plan = plan_split(source, config, prompt)?;

    let failed_reports = if config.write_reports {
        write_reports(source, &plan, pdf_path, output_dir)
    } else {
        Vec::new()
    };

    let (written, failed) = write_chapters(writer, &plan.files, output_dir);
    Ok(SplitOutcome {
        plan,
        written,
        failed,
        failed_reports,
    })
}

/// Write the side reports. A report that cannot be written is logged and
/// returned; it never stops the chapters from being written.
fn write_reports(
    source: &dyn PageSource,
    plan: &SplitPlan,
    pdf_path: &Path,
    output_dir: &Path,
) -> Vec<PathBuf> {
    let (first, last) = plan.toc_bounds;
    let reports = [
        (report::TOC_CONTENTS_FILE, report::toc_text(source, first, last)),
        (
            report::METADATA_FILE,
            report::metadata_text(pdf_path, &source.metadata()),
        ),
        (
            report::OFFSET_REPORT_FILE,
            report::results_report(
                &plan.toc.entries,
                &plan.resolution,
                &plan.files,
                &plan.skipped,
            ),
        ),
    ];

    let mut failed = Vec::new();
    for (name, content) in reports {
        let path = output_dir.join(name);
        if let Err(e) = report::write_report(&path, &content) {
            error!(error = %format!("{:#}", e), "report not written");
            failed.push(path);
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::offset::{Anchor, ManualPrompt, OffsetMethod, PageOffset};
    use crate::chapters::project::project_ranges;
    use crate::chapters::source::fake::{FakeBook, RecordingWriter};
    use crate::chapters::toc::ChapterEntry;
    use std::io::Cursor;

    /// 45 physical pages; TOC on page 2; chapter 1 (printed 3) opens on file page 27.
    fn book() -> FakeBook {
        FakeBook::new(45)
            .with_text(1, "The Book\nA. Author")
            .with_text(2, "Contents\n1 Introduction ........ 3\n2 Basics ........ 20")
            .with_words(
                27,
                &[
                    ("1", 28.0),
                    ("Introduction", 28.0),
                    ("This", 10.0),
                    ("book", 10.0),
                    ("is", 10.0),
                    ("about", 10.0),
                    ("3", 9.0),
                ],
            )
    }

    #[test]
    fn test_documented_scenario() {
        let entries = vec![
            ChapterEntry::new("1 Introduction", 3),
            ChapterEntry::new("2 Basics", 20),
        ];
        let ranges = map_starts_to_ranges(&entries, 40);
        assert_eq!(
            ranges
                .iter()
                .map(|r| (r.printed_start, r.printed_end))
                .collect::<Vec<_>>(),
            vec![(3, 19), (20, 40)]
        );

        let (files, skipped) = project_ranges(&ranges, PageOffset::new(24), 45);
        assert_eq!(files.len(), 1);
        assert_eq!((files[0].file_start, files[0].file_end), (27, 43));
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].label, "2 Basics");
        assert_eq!((skipped[0].file_start, skipped[0].file_end), (44, 64));

        let mut writer = RecordingWriter::default();
        let (written, failed) = write_chapters(&mut writer, &files, Path::new("out"));
        assert!(failed.is_empty());
        assert_eq!(written[0].path, Path::new("out").join("1_Introduction.pdf"));
        assert_eq!(
            writer.written,
            vec![(27, 43, Path::new("out").join("1_Introduction.pdf"))]
        );
    }

    #[test]
    fn test_run_split_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = SplitConfig {
            output_dir: dir.path().join("chapters"),
            last_printed_page: Some(40),
            ..Default::default()
        };
        let source = book();
        let mut writer = RecordingWriter::default();

        let outcome = run_split(&source, &mut writer, &config, Path::new("book.pdf"), None).unwrap();
        let plan = &outcome.plan;
        assert_eq!(plan.toc_bounds, (2, 2));
        assert_eq!(plan.resolution.method, OffsetMethod::TitleScan);
        assert_eq!(plan.resolution.offset.value(), 24);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(
            writer.written,
            vec![(27, 43, config.output_dir.join("1_Introduction.pdf"))]
        );

        for name in [
            report::TOC_CONTENTS_FILE,
            report::METADATA_FILE,
            report::OFFSET_REPORT_FILE,
        ] {
            assert!(config.output_dir.join(name).exists(), "{} missing", name);
        }
        let toc = std::fs::read_to_string(config.output_dir.join(report::TOC_CONTENTS_FILE)).unwrap();
        assert!(toc.starts_with("--- File Page 2 ---"));
    }

    #[test]
    fn test_report_failure_does_not_stop_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let config = SplitConfig {
            output_dir: dir.path().join("chapters"),
            last_printed_page: Some(40),
            ..Default::default()
        };
        // a directory where the TOC dump should go makes that write fail
        std::fs::create_dir_all(config.output_dir.join(report::TOC_CONTENTS_FILE)).unwrap();
        let source = book();
        let mut writer = RecordingWriter::default();

        let outcome = run_split(&source, &mut writer, &config, Path::new("book.pdf"), None).unwrap();
        assert_eq!(
            outcome.failed_reports,
            vec![config.output_dir.join(report::TOC_CONTENTS_FILE)]
        );
        assert!(config.output_dir.join(report::METADATA_FILE).exists());
        assert!(config.output_dir.join(report::OFFSET_REPORT_FILE).exists());
        assert_eq!(
            writer.written,
            vec![(27, 43, config.output_dir.join("1_Introduction.pdf"))]
        );
    }

    #[test]
    fn test_last_printed_page_defaults_to_count_minus_offset() {
        let config = SplitConfig {
            write_reports: false,
            ..Default::default()
        };
        let plan = plan_split(&book(), &config, None).unwrap();
        assert_eq!(plan.last_printed_page, 21);
        assert_eq!(plan.files.len(), 2);
        assert_eq!((plan.files[1].file_start, plan.files[1].file_end), (44, 45));
    }

    #[test]
    fn test_falls_back_to_prompt_then_anchor() {
        // no sized words: the scan cannot run
        let source = FakeBook::new(45).with_text(2, "1 Introduction ........ 3\n2 Basics ........ 20");

        let prompt = ManualPrompt::new(Cursor::new("27\n"), Vec::new());
        let plan = plan_split(&source, &SplitConfig::default(), Some(Box::new(prompt))).unwrap();
        assert_eq!(plan.resolution.method, OffsetMethod::ManualPrompt);
        assert_eq!(plan.resolution.offset.value(), 24);

        let config = SplitConfig {
            anchor: Some(Anchor {
                printed: 3,
                physical: 26,
            }),
            ..Default::default()
        };
        let declined = ManualPrompt::new(Cursor::new("\n"), Vec::new());
        let plan = plan_split(&source, &config, Some(Box::new(declined))).unwrap();
        assert_eq!(plan.resolution.method, OffsetMethod::ConfiguredAnchor);
        assert_eq!(plan.resolution.offset.value(), 23);
    }

    #[test]
    fn test_no_offset_is_an_error() {
        let source = FakeBook::new(45).with_text(2, "1 Introduction ........ 3");
        let err = plan_split(&source, &SplitConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("--anchor 3:"));
    }

    #[test]
    fn test_no_toc_is_an_error() {
        let source = FakeBook::new(45).with_text(1, "Just a title page");
        let err = plan_split(&source, &SplitConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("No numbered chapter entries"));
    }

    #[test]
    fn test_explicit_toc_pages() {
        let config = SplitConfig {
            toc_pages: Some("1-3".into()),
            ..Default::default()
        };
        let source = book();
        let toc = detect_chapters(&source, &config).unwrap();
        assert_eq!(toc_bounds(&source, &config, &toc).unwrap(), (1, 3));
    }
}
