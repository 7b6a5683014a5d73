use crate::chapters::pipeline::detect_chapters;
use crate::config::SplitConfig;
use crate::pdf::PdfDocument;
use anyhow::Result;
use std::path::Path;

pub fn run<P: AsRef<Path>>(path: P, config: &SplitConfig, json: bool) -> Result<()> {
    let doc = PdfDocument::open(&path)?;
    let toc = detect_chapters(&doc, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&toc)?);
        return Ok(());
    }

    for entry in &toc.entries {
        println!("{:<40} Page {}", entry.label, entry.printed_start);
    }
    let pages: Vec<String> = toc.toc_pages.iter().map(|p| p.to_string()).collect();
    println!(
        "\n{} entries found on file page(s) {}",
        toc.entries.len(),
        pages.join(", ")
    );

    Ok(())
}
