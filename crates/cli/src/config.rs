//! Settings file for the `--config` flag.
//!
//! One TOML table per check; absent tables and keys keep their defaults.
//!
//! ```toml
//! [pdf_md]
//! page_offset = 2
//!
//! [images]
//! tolerance = false
//! pdf = { decorative_per_page = 0 }
//!
//! [links]
//! match_by_domain = false
//! ```

use anyhow::{Context, Result};
use doccheck_verify::{
    CodeBlocksConfig, DeckMarkdownConfig, DeckVersionsConfig, ImageCheckConfig, LinkCheckConfig,
    LintConfig, MarkdownPdfConfig, MarkdownVersionsConfig, PdfMarkdownConfig,
};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub deck_md: DeckMarkdownConfig,
    pub md_pdf: MarkdownPdfConfig,
    pub pdf_md: PdfMarkdownConfig,
    pub md_md: MarkdownVersionsConfig,
    pub deck_deck: DeckVersionsConfig,
    pub images: ImageCheckConfig,
    pub links: LinkCheckConfig,
    pub code_blocks: CodeBlocksConfig,
    pub lint: LintConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
