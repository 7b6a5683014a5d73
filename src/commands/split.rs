use crate::chapters::offset::{ManualPrompt, OffsetStrategy};
use crate::chapters::pipeline::{run_split, SplitOutcome};
use crate::config::SplitConfig;
use crate::pdf::{PdfChapterWriter, PdfDocument};
use anyhow::{bail, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

/// Split one PDF, or every PDF below a directory, into chapter files.
pub fn run<P: AsRef<Path>>(path: P, config: &SplitConfig) -> Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return run_batch(path, config);
    }

    let outcome = split_one(path, config)?;
    if !outcome.failed.is_empty() {
        bail!("{} chapter(s) could not be written", outcome.failed.len());
    }
    Ok(())
}

fn run_batch(dir: &Path, config: &SplitConfig) -> Result<()> {
    let pdfs = find_pdfs(dir);
    if pdfs.is_empty() {
        bail!("No PDF files found in {}", dir.display());
    }
    info!(count = pdfs.len(), dir = %dir.display(), "splitting PDFs in directory");

    let mut failures = 0;
    for pdf in &pdfs {
        let stem = pdf.file_stem().and_then(|s| s.to_str()).unwrap_or("book");
        let book_config = SplitConfig {
            output_dir: config.output_dir.join(stem),
            ..config.clone()
        };
        match split_one(pdf, &book_config) {
            Ok(outcome) if outcome.failed.is_empty() => {}
            Ok(outcome) => {
                error!(path = %pdf.display(), failed = outcome.failed.len(), "some chapters could not be written");
                failures += 1;
            }
            Err(e) => {
                error!(path = %pdf.display(), error = %format!("{:#}", e), "failed to split PDF");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} PDF(s) failed to split", failures, pdfs.len());
    }
    Ok(())
}

/// All `.pdf` files below `dir`, sorted by path
fn find_pdfs(dir: &Path) -> Vec<PathBuf> {
    let mut pdfs: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    pdfs
}

fn split_one(path: &Path, config: &SplitConfig) -> Result<SplitOutcome> {
    info!(path = %path.display(), "processing PDF");
    let doc = PdfDocument::open(path)?;
    info!(pages = doc.page_count(), "total physical pages detected");

    let prompt: Option<Box<dyn OffsetStrategy>> =
        if config.prompt && std::io::stdin().is_terminal() {
            Some(Box::new(ManualPrompt::new(
                std::io::stdin().lock(),
                std::io::stderr(),
            )))
        } else {
            None
        };

    let mut writer = PdfChapterWriter::new(&doc);
    let outcome = run_split(&doc, &mut writer, config, path, prompt)?;
    print_outcome(&outcome, &config.output_dir);
    Ok(outcome)
}

fn print_outcome(outcome: &SplitOutcome, output_dir: &Path) {
    let plan = &outcome.plan;

    println!("========================================");
    println!("  CALCULATED CHAPTER LIST (Printed Pages)");
    println!("========================================");
    for range in &plan.ranges {
        println!(
            "{:<40} {}-{}",
            range.label, range.printed_start, range.printed_end
        );
    }
    println!("========================================");
    println!(
        "Page offset: {} (via {})",
        plan.resolution.offset, plan.resolution.method
    );
    println!();

    for chapter in &outcome.written {
        println!(
            "Created: {} (File Pages {}-{})",
            chapter.path.display(),
            chapter.file_start,
            chapter.file_end
        );
    }
    for skip in &plan.skipped {
        println!(
            "Skipped: {} (File Pages {}-{}): {}",
            skip.label, skip.file_start, skip.file_end, skip.reason
        );
    }
    for failed in &outcome.failed {
        println!("Failed: {}: {}", failed.path.display(), failed.error);
    }
    for report in &outcome.failed_reports {
        println!("Report not written: {}", report.display());
    }

    println!(
        "\nSplit {} chapter(s) into {}",
        outcome.written.len(),
        output_dir.display()
    );
}
