use crate::chapters::offset::scan::scan_for_title;
use crate::chapters::pipeline::{detect_chapters, toc_bounds};
use crate::config::SplitConfig;
use crate::pdf::PdfDocument;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct OffsetReport {
    pub chapter: String,
    pub printed_page: u32,
    pub toc_end: u32,
    pub file_page: Option<u32>,
    pub offset: Option<i64>,
}

/// Run only the title scan and report what it found.
pub fn find<P: AsRef<Path>>(path: P, config: &SplitConfig) -> Result<OffsetReport> {
    let doc = PdfDocument::open(&path)?;
    let toc = detect_chapters(&doc, config)?;
    let (_, toc_end) = toc_bounds(&doc, config, &toc)?;
    let first = toc.first().context("TOC has no entries")?;

    let hit = scan_for_title(&doc, first, toc_end, &config.scan_options());
    Ok(OffsetReport {
        chapter: first.label.clone(),
        printed_page: first.printed_start,
        toc_end,
        file_page: hit.map(|h| h.physical_page),
        offset: hit.map(|h| h.offset.value()),
    })
}

pub fn run<P: AsRef<Path>>(path: P, config: &SplitConfig, json: bool) -> Result<()> {
    let report = find(&path, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "First chapter: {} (printed page {})",
        report.chapter, report.printed_page
    );
    println!("TOC ends on file page {}", report.toc_end);
    match (report.file_page, report.offset) {
        (Some(file_page), Some(offset)) => {
            println!("Found on file page {}", file_page);
            println!("Page offset: {:+}", offset);
        }
        _ => println!(
            "Not found within {} pages after the TOC; use `split --anchor {}:<file page>`",
            config.scan_window, report.printed_page
        ),
    }

    Ok(())
}
