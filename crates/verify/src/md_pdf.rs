//! Markdown files against the pages of the PDF they were written from.

use crate::common::{load_markdown, missing_section, pair_section};
use doccheck_core::{
    unclaimed, AlignConfig, Aligner, Confidence, Corpus, Differ, Granularity, Issue, Metric,
    Report, Result, TextNormalizer, TokenPattern,
};
use doccheck_markdown::{KeyBy, MarkdownCleaner, MarkdownDir};
use doccheck_pdf::PdfExtractor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Markdown-to-PDF settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownPdfConfig {
    pub align: AlignConfig,
}

impl Default for MarkdownPdfConfig {
    fn default() -> Self {
        Self {
            align: AlignConfig::default()
                .with_thresholds(0.85, 0.75)
                .with_metric(Metric::Tfidf {
                    tokens: TokenPattern::Word,
                })
                // Several files may come from the same page
                .with_exclusive(false),
        }
    }
}

/// Finds the best PDF page for every Markdown file.
#[derive(Debug, Clone, Default)]
pub struct MarkdownToPdf {
    config: MarkdownPdfConfig,
}

impl MarkdownToPdf {
    pub fn new(config: MarkdownPdfConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, markdown: &Path, pdf: &Path) -> Result<Report> {
        self.config.align.validate()?;
        let markdown = load_markdown(markdown, KeyBy::FileName)?;
        let pages = PdfExtractor::load(pdf)?.pages();
        Ok(self.compare(&markdown, &pages))
    }

    pub fn compare(&self, markdown: &MarkdownDir, pages: &Corpus) -> Report {
        let mut pages = pages.clone();
        let flatten = TextNormalizer::new()
            .with_strip_table_markup(true)
            .with_preserve_line_breaks(false);
        pages.map_text(|text| flatten.normalize(text));
        let files = markdown.to_corpus(&MarkdownCleaner::plain());

        let aligner = Aligner::new(self.config.align.clone());
        let differ = Differ::with_granularity(Granularity::Char);
        let matches = aligner.align(&pages, &files);

        let mut report = Report::new("Markdown to PDF Comparison")
            .with_labels(pages.source.clone(), files.source.clone());
        report.summary.total = files.len();

        for (file, m) in files.units().iter().zip(&matches) {
            let Some(page) = m.reference.as_ref().and_then(|id| pages.get(id)) else {
                report.summary.record_skipped(file.label.clone());
                report.push_section(missing_section(
                    file,
                    format!(
                        "No matching page found (best similarity {:.2}%)",
                        m.score * 100.0
                    ),
                ));
                continue;
            };

            report.summary.record_matched();
            let diff = differ.compare(&page.text, &file.text);
            if !diff.is_unchanged() {
                report.summary.record_changed(file.label.clone());
            }
            let mut section =
                pair_section(&file.label, &page.label, page, file, diff).with_score(m.score, m.confidence);
            if m.confidence == Confidence::Low {
                report.summary.record_low_confidence();
                section.push_messages(vec![Issue::warning("Low-confidence match")]);
            }
            report.push_section(section);
        }

        for page in unclaimed(&pages, &matches) {
            report.summary.record_skipped(page.label.clone());
            report.issues.push(Issue::info(format!(
                "{} has no matching Markdown file",
                page.label
            )));
        }
        report.issues.extend(files.issues.iter().cloned());
        report.note(format!(
            "Strict threshold: {:.2}, low threshold: {:.2}, assignment: {:?}",
            self.config.align.strict, self.config.align.low, self.config.align.assignment
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccheck_core::DiffTag;
    use crate::fixtures::markdown;

    fn pages(texts: &[&str]) -> Corpus {
        Corpus::from_texts(
            "guide.pdf",
            texts.iter().enumerate().map(|(i, t)| (i as u32 + 1, *t)),
        )
    }

    #[test]
    fn test_files_find_their_pages() {
        let md = markdown("md", KeyBy::FileName, &[
            ("safety.md", "# Safety rules\nWear gloves when handling the unit."),
            ("install.md", "## Installation\nMount the bracket on the wall."),
        ]);
        let pdf = pages(&[
            "Installation\nMount the bracket on the wall.",
            "Safety rules\nWear gloves when handling the unit.",
        ]);

        let report = MarkdownToPdf::default().compare(&md, &pdf);
        assert_eq!(report.summary.matched, 2);
        assert_eq!(report.summary.changed, 0);

        // Files are visited in name order
        assert_eq!(report.sections[0].title, "install.md");
        assert_eq!(report.sections[0].target.as_deref(), Some("1"));
        assert_eq!(report.sections[1].target.as_deref(), Some("2"));
        assert_eq!(report.sections[1].confidence, Some(Confidence::Strict));
    }

    #[test]
    fn test_table_markup_ignored_on_pdf_side() {
        let md = markdown("md", KeyBy::FileName, &[("parts.md", "| Part | Qty |\n|---|---|\n| Bolt | 4 |")]);
        let pdf = pages(&["| Part | Qty |\n|------|-----|\n| Bolt | 4 |"]);

        let report = MarkdownToPdf::default().compare(&md, &pdf);
        assert_eq!(report.sections[0].score, Some(1.0));
        assert_eq!(report.summary.changed, 0);
    }

    #[test]
    fn test_unrelated_file_is_skipped() {
        let md = markdown("md", KeyBy::FileName, &[("notes.md", "Completely unrelated words here")]);
        let pdf = pages(&["Installation guide for the bracket"]);

        let report = MarkdownToPdf::default().compare(&md, &pdf);
        assert_eq!(report.summary.skipped_units, vec!["notes.md", "1"]);
        assert_eq!(report.summary.matched, 0);
    }

    #[test]
    fn test_small_edit_is_changed_with_char_diff() {
        let md = markdown("md", KeyBy::FileName, &[("fox.md", "The quick brown fox.")]);
        let pdf = pages(&["The quick brown fox"]);

        let report = MarkdownToPdf::default().compare(&md, &pdf);
        assert_eq!(report.summary.changed_units, vec!["fox.md"]);
        let doccheck_core::Block::Diff(pane) = &report.sections[0].blocks[0] else {
            panic!("expected a diff");
        };
        let inserted: Vec<_> = pane.spans.iter().filter(|s| s.tag == DiffTag::Insert).collect();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].new_text(&pane.new), ".");
    }
}
