use crate::chapters::offset::scan::{MatchPolicy, ScanOptions};
use crate::chapters::offset::Anchor;
use crate::cli::EngineArgs;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings for one split run. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub toc_scan_pages: u32,
    /// Physical TOC pages, e.g. "5-8"
    pub toc_pages: Option<String>,
    pub scan_window: u32,
    pub large_font_ratio: f32,
    pub title_key_words: usize,
    pub match_policy: MatchPolicy,
    /// Printed page asked about when no chapter start is known
    pub default_anchor_page: u32,
    pub anchor: Option<Anchor>,
    pub last_printed_page: Option<i64>,
    pub output_dir: PathBuf,
    pub write_reports: bool,
    pub prompt: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            toc_scan_pages: 15,
            toc_pages: None,
            scan_window: 50,
            large_font_ratio: 1.5,
            title_key_words: 5,
            match_policy: MatchPolicy::First,
            default_anchor_page: 1,
            anchor: None,
            last_printed_page: None,
            output_dir: PathBuf::from("chapters_output"),
            write_reports: true,
            prompt: true,
        }
    }
}

impl SplitConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Config file (if any) with the command-line overrides applied.
    pub fn from_args(args: &EngineArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(n) = args.toc_scan_pages {
            config.toc_scan_pages = n;
        }
        if let Some(pages) = &args.toc_pages {
            config.toc_pages = Some(pages.clone());
        }
        if let Some(n) = args.scan_window {
            config.scan_window = n;
        }
        if let Some(ratio) = args.large_font_ratio {
            config.large_font_ratio = ratio;
        }
        if let Some(policy) = args.match_policy {
            config.match_policy = policy;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.toc_scan_pages == 0 {
            bail!("toc_scan_pages must be at least 1");
        }
        if self.scan_window == 0 {
            bail!("scan_window must be at least 1");
        }
        if self.large_font_ratio.is_nan() || self.large_font_ratio <= 1.0 {
            bail!(
                "large_font_ratio must be greater than 1 (got {})",
                self.large_font_ratio
            );
        }
        if self.title_key_words == 0 {
            bail!("title_key_words must be at least 1");
        }
        if self.default_anchor_page == 0 {
            bail!("default_anchor_page must be at least 1");
        }
        if let Some(anchor) = &self.anchor {
            if anchor.printed == 0 || anchor.physical == 0 {
                bail!(
                    "anchor pages must be at least 1 (got {}:{})",
                    anchor.printed,
                    anchor.physical
                );
            }
        }
        Ok(())
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            window: self.scan_window,
            large_font_ratio: self.large_font_ratio,
            title_key_words: self.title_key_words,
            policy: self.match_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SplitConfig::default();
        config.validate().unwrap();
        assert_eq!(config.toc_scan_pages, 15);
        assert_eq!(config.scan_window, 50);
    }

    #[test]
    fn test_partial_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scan_window": 80, "match_policy": "best", "anchor": {{"printed": 3, "physical": 27}}}}"#
        )
        .unwrap();

        let args = EngineArgs {
            config: Some(file.path().to_path_buf()),
            scan_window: Some(20),
            toc_pages: Some("5-8".into()),
            ..Default::default()
        };
        let config = SplitConfig::from_args(&args).unwrap();
        assert_eq!(config.scan_window, 20);
        assert_eq!(config.match_policy, MatchPolicy::Best);
        assert_eq!(
            config.anchor,
            Some(Anchor {
                printed: 3,
                physical: 27
            })
        );
        assert_eq!(config.toc_pages.as_deref(), Some("5-8"));
        assert_eq!(config.toc_scan_pages, 15);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scan_windw": 80}}"#).unwrap();
        assert!(SplitConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_zero_anchor_from_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"anchor": {{"printed": 0, "physical": 0}}}}"#).unwrap();
        let args = EngineArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = SplitConfig::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("anchor pages must be at least 1"));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let args = EngineArgs {
            large_font_ratio: Some(0.9),
            ..Default::default()
        };
        assert!(SplitConfig::from_args(&args).is_err());
    }
}
