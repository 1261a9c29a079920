//! PDF pages against Markdown files keyed by page number.

use crate::common::{check_threshold, load_markdown, missing_section, pair_section};
use doccheck_core::normalize::collapse_whitespace;
use doccheck_core::{
    unclaimed, AlignConfig, Aligner, Confidence, Corpus, Differ, Granularity, Issue, Metric,
    Report, Result, TextNormalizer,
};
use doccheck_markdown::{KeyBy, MarkdownCleaner, MarkdownDir};
use doccheck_pdf::PdfExtractor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// PDF-to-Markdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfMarkdownConfig {
    /// Scores at or above this are strict matches.
    pub strict: f64,
    /// Pages scoring below this are reported as changed.
    pub report_threshold: f64,
    /// Markdown prefix `n` belongs to PDF page `n + page_offset`.
    pub page_offset: i64,
    /// Drop the first and last line of every page with more than two lines.
    pub trim_headers_footers: bool,
}

impl Default for PdfMarkdownConfig {
    fn default() -> Self {
        Self {
            strict: 0.90,
            report_threshold: 0.70,
            page_offset: 0,
            trim_headers_footers: true,
        }
    }
}

/// Compares every PDF page with the Markdown file numbered after it.
#[derive(Debug, Clone, Default)]
pub struct PdfToMarkdown {
    config: PdfMarkdownConfig,
}

impl PdfToMarkdown {
    pub fn new(config: PdfMarkdownConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, pdf: &Path, markdown: &Path) -> Result<Report> {
        check_threshold("strict threshold", self.config.strict)?;
        check_threshold("report threshold", self.config.report_threshold)?;
        let pages = PdfExtractor::load(pdf)?
            .with_normalizer(TextNormalizer::new().with_standardize_bullets(true))
            .with_trim_headers_footers(self.config.trim_headers_footers)
            .pages();
        let markdown = load_markdown(markdown, KeyBy::Prefix)?;
        Ok(self.compare(&pages, &markdown))
    }

    /// Compare extracted pages (already trimmed) with the Markdown files.
    pub fn compare(&self, pages: &Corpus, markdown: &MarkdownDir) -> Report {
        let mut pages = pages.clone();
        pages.map_text(collapse_whitespace);

        let flatten = TextNormalizer::new()
            .with_strip_table_markup(true)
            .with_preserve_line_breaks(false);
        let mut files = markdown.to_corpus(&MarkdownCleaner::new());
        files.map_text(|text| flatten.normalize(text));

        let aligner = Aligner::new(
            AlignConfig::default()
                .with_metric(Metric::SequenceRatio)
                .with_thresholds(self.config.strict, self.config.report_threshold),
        );
        let differ = Differ::with_granularity(Granularity::Word);
        let matches = aligner.pair_by_key(&files, &pages, -self.config.page_offset);

        let mut report = Report::new("PDF to Markdown Comparison")
            .with_labels(pages.source.clone(), files.source.clone());
        report.summary.total = pages.len();

        for (page, m) in pages.units().iter().zip(&matches) {
            let Some(file) = m.reference.as_ref().and_then(|id| files.get(id)) else {
                report.summary.record_skipped(page.label.clone());
                report.push_section(
                    missing_section(page, "No Markdown file found for this page")
                        .with_score(0.0, Confidence::Unmatched),
                );
                continue;
            };

            report.summary.record_matched();
            if m.confidence == Confidence::Low {
                report.summary.record_low_confidence();
            }
            if m.score < self.config.report_threshold {
                log::debug!("{}: similarity {:.2} below report threshold", page.label, m.score);
                report.summary.record_changed(page.label.clone());
            }
            let diff = differ.compare(&page.text, &file.text);
            report.push_section(
                pair_section(&page.label, &file.label, page, file, diff)
                    .with_score(m.score, m.confidence),
            );
        }

        for file in unclaimed(&files, &matches) {
            report.summary.record_skipped(file.label.clone());
            report
                .issues
                .push(Issue::info(format!("'{}' has no matching page", file.label)));
        }
        report.issues.extend(files.issues.iter().cloned());
        report.note(format!(
            "Strict threshold: {:.2}, report threshold: {:.2}, page offset: {}",
            self.config.strict, self.config.report_threshold, self.config.page_offset
        ));
        report
    }
}
