//! Document consistency checks.
//!
//! Each check reads its two inputs through the extractor crates, aligns the
//! units, diffs every pair and returns a [`Report`](doccheck_core::Report).
//! `run` works from paths; `compare` works from already extracted inputs.

mod common;
#[cfg(test)]
mod fixtures;

pub mod code_blocks;
pub mod deck_deck;
pub mod deck_md;
pub mod images;
pub mod links;
pub mod lint;
pub mod md_md;
pub mod md_pdf;
pub mod pdf_md;

pub use code_blocks::{CodeBlocks, CodeBlocksConfig};
pub use deck_deck::{workbook_file_name, DeckVersions, DeckVersionsConfig};
pub use deck_md::{bullet_issues, DeckMarkdownConfig, DeckToMarkdown};
pub use images::{CountStatus, ImageCheckConfig, ImageCounts};
pub use links::{LinkCheck, LinkCheckConfig, LinkMatch};
pub use lint::{LintConfig, MarkdownLint};
pub use md_md::{MarkdownVersions, MarkdownVersionsConfig};
pub use md_pdf::{MarkdownPdfConfig, MarkdownToPdf};
pub use pdf_md::{PdfMarkdownConfig, PdfToMarkdown};
