use anyhow::{anyhow, Result};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::chapters::offset::Anchor;
use crate::chapters::pipeline::{detect_chapters, run_split, SplitOutcome};
use crate::chapters::toc::TocScan;
use crate::commands::offset::find;
use crate::config::SplitConfig;
use crate::pdf::{PdfChapterWriter, PdfDocument};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PathRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DetectRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Number of leading pages searched for TOC entries (default: 15)")]
    pub toc_scan_pages: Option<u32>,
    #[schemars(description = "Physical pages holding the TOC, e.g. '5-8' (default: inferred)")]
    pub toc_pages: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SplitRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Directory for the chapter files (default: chapters_output)")]
    pub output_dir: Option<String>,
    #[schemars(description = "Known page pair used if automatic detection fails, as 'PRINTED:PHYSICAL' (e.g. '3:27')")]
    pub anchor: Option<String>,
    #[schemars(description = "Physical pages holding the TOC, e.g. '5-8' (default: inferred)")]
    pub toc_pages: Option<String>,
    #[schemars(description = "Write the TOC, metadata and offset report files (default: true)")]
    #[serde(default = "default_write_reports")]
    pub write_reports: bool,
}

fn default_write_reports() -> bool {
    true
}

impl DetectRequest {
    fn config(&self) -> Result<SplitConfig> {
        let mut config = SplitConfig {
            prompt: false,
            ..Default::default()
        };
        if let Some(n) = self.toc_scan_pages {
            config.toc_scan_pages = n;
        }
        config.toc_pages = self.toc_pages.clone();
        config.validate()?;
        Ok(config)
    }
}

impl SplitRequest {
    fn config(&self) -> Result<SplitConfig> {
        let mut config = SplitConfig {
            prompt: false,
            write_reports: self.write_reports,
            toc_pages: self.toc_pages.clone(),
            ..Default::default()
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(anchor) = &self.anchor {
            config.anchor = Some(anchor.parse::<Anchor>().map_err(|e| anyhow!(e))?);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct PdfServer {
    tool_router: ToolRouter<Self>,
}

impl PdfServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json<T: Serialize>(result: Result<T>) -> String {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("Error: {}", e)),
        Err(e) => format!("Error: {:#}", e),
    }
}

#[tool_router]
impl PdfServer {
    #[tool(description = "Get the page count and document info entries (title, author, producer, ...) of a PDF")]
    fn pdf_info(&self, Parameters(PathRequest { path }): Parameters<PathRequest>) -> String {
        to_json(pdf_info(path))
    }

    #[tool(description = "Find the numbered chapter entries (e.g. '3 Error Handling ..... 42') in the printed table of contents of a PDF book")]
    fn detect_chapters(&self, Parameters(req): Parameters<DetectRequest>) -> String {
        to_json(detect(&req))
    }

    #[tool(description = "Locate the first chapter's opening page by its large-font title and report the printed-to-physical page offset")]
    fn find_offset(&self, Parameters(req): Parameters<DetectRequest>) -> String {
        to_json(req.config().and_then(|config| find(&req.path, &config)))
    }

    #[tool(description = "Split a PDF book into one PDF per numbered chapter. Never prompts; pass 'anchor' if the offset cannot be detected.")]
    fn split_chapters(&self, Parameters(req): Parameters<SplitRequest>) -> String {
        to_json(split(&req).map(SplitResult::from))
    }
}

fn pdf_info(path: String) -> Result<PdfInfoResult> {
    let doc = PdfDocument::open(&path)?;
    Ok(PdfInfoResult {
        page_count: doc.page_count(),
        info: doc.info_entries().into_iter().collect(),
        path,
    })
}

fn detect(req: &DetectRequest) -> Result<TocScan> {
    let config = req.config()?;
    let doc = PdfDocument::open(&req.path)?;
    detect_chapters(&doc, &config)
}

fn split(req: &SplitRequest) -> Result<SplitOutcome> {
    let config = req.config()?;
    let path = PathBuf::from(&req.path);
    let doc = PdfDocument::open(&path)?;
    let mut writer = PdfChapterWriter::new(&doc);
    run_split(&doc, &mut writer, &config, &path, None)
}

// Result types for MCP tools

#[derive(Debug, Serialize)]
pub struct PdfInfoResult {
    pub path: String,
    pub page_count: u32,
    pub info: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SplitResult {
    pub offset: i64,
    pub method: String,
    pub written: Vec<ChapterFileResult>,
    pub skipped: Vec<SkippedResult>,
    pub failed: Vec<FailedResult>,
    pub failed_reports: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChapterFileResult {
    pub label: String,
    pub path: String,
    pub file_start: u32,
    pub file_end: u32,
}

#[derive(Debug, Serialize)]
pub struct SkippedResult {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct FailedResult {
    pub label: String,
    pub error: String,
}

impl From<SplitOutcome> for SplitResult {
    fn from(outcome: SplitOutcome) -> Self {
        SplitResult {
            offset: outcome.plan.resolution.offset.value(),
            method: outcome.plan.resolution.method.to_string(),
            written: outcome
                .written
                .into_iter()
                .map(|c| ChapterFileResult {
                    label: c.label,
                    path: c.path.display().to_string(),
                    file_start: c.file_start,
                    file_end: c.file_end,
                })
                .collect(),
            skipped: outcome
                .plan
                .skipped
                .into_iter()
                .map(|s| SkippedResult {
                    label: s.label,
                    reason: s.reason,
                })
                .collect(),
            failed: outcome
                .failed
                .into_iter()
                .map(|f| FailedResult {
                    label: f.label,
                    error: f.error,
                })
                .collect(),
            failed_reports: outcome
                .failed_reports
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        }
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF book splitting tools. Use pdf_info for document metadata, detect_chapters \
                 to read the numbered entries of the printed table of contents, find_offset to \
                 see how printed page numbers map to file pages, and split_chapters to write \
                 one PDF per chapter."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server() -> Result<()> {
    let server = PdfServer::new();

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools_are_listed() {
        let server = PdfServer::new();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["detect_chapters", "find_offset", "pdf_info", "split_chapters"]
        );
    }

    #[test]
    fn test_split_request_config() {
        let req = SplitRequest {
            path: "book.pdf".into(),
            output_dir: Some("out".into()),
            anchor: Some("3:27".into()),
            toc_pages: None,
            write_reports: false,
        };
        let config = req.config().unwrap();
        assert!(!config.prompt);
        assert!(!config.write_reports);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.anchor.unwrap().offset().value(), 24);
    }

    #[test]
    fn test_split_request_bad_anchor() {
        let req = SplitRequest {
            path: "book.pdf".into(),
            output_dir: None,
            anchor: Some("27".into()),
            toc_pages: None,
            write_reports: true,
        };
        assert!(req.config().is_err());
    }

    #[test]
    fn test_missing_file_is_reported_as_error() {
        let server = PdfServer::new();
        let out = server.pdf_info(Parameters(PathRequest {
            path: "/nonexistent/book.pdf".into(),
        }));
        assert!(out.starts_with("Error: "));
    }
}
