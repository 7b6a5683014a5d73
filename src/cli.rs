use crate::chapters::offset::scan::MatchPolicy;
use crate::chapters::offset::Anchor;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdfchapters")]
#[command(about = "Split a PDF book into one file per numbered chapter using its printed table of contents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a book (or every PDF in a directory) into chapter PDFs
    Split {
        /// PDF file or directory of PDF files
        path: PathBuf,

        /// Output directory (default: chapters_output)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Known page pair used if automatic detection fails, as PRINTED:PHYSICAL (e.g. "3:27")
        #[arg(long)]
        anchor: Option<Anchor>,

        /// Override the last printed page (default: page count minus offset)
        #[arg(long)]
        last_printed_page: Option<i64>,

        /// Never ask for a page number interactively
        #[arg(long)]
        no_prompt: bool,

        /// Do not write the TOC, metadata and offset report files
        #[arg(long)]
        no_reports: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Print the numbered chapter entries found in the front matter
    Toc {
        /// PDF file to inspect
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Find the first chapter's opening page and print the page offset
    Offset {
        /// PDF file to inspect
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Display PDF metadata
    Info {
        /// PDF file to inspect
        path: PathBuf,
    },

    /// Run as MCP server on stdio
    Mcp,
}

/// Detection settings shared by the commands that look at a book's contents.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// JSON file with default settings; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of leading pages searched for TOC entries
    #[arg(long)]
    pub toc_scan_pages: Option<u32>,

    /// Physical pages holding the TOC (e.g. "5-8"); inferred when omitted
    #[arg(long)]
    pub toc_pages: Option<String>,

    /// Number of pages after the TOC searched for the first chapter title
    #[arg(long)]
    pub scan_window: Option<u32>,

    /// Size multiple of the body text that counts as title text
    #[arg(long)]
    pub large_font_ratio: Option<f32>,

    /// Which page wins when several match the title and page number
    #[arg(long, value_enum)]
    pub match_policy: Option<MatchPolicy>,
}
