//! Slide deck against its Markdown conversion, one file per slide.

use crate::common::{check_threshold, load_deck, load_markdown, missing_section, pair_section};
use doccheck_core::{
    unclaimed, AlignConfig, Aligner, Differ, Granularity, Issue, Metric, Report, Result,
};
use doccheck_markdown::{KeyBy, MarkdownCleaner, MarkdownDir};
use doccheck_pptx::{Deck, DeckRenderer, RenderStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Deck-to-Markdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckMarkdownConfig {
    /// Pairs scoring at or below this are reported as changed.
    pub threshold: f64,
    pub metric: Metric,
    /// Render speaker notes into the slide text.
    pub include_notes: bool,
    /// Compare `*` bullet lines between slide and file.
    pub check_bullets: bool,
}

impl Default for DeckMarkdownConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            metric: Metric::default(),
            include_notes: true,
            check_bullets: true,
        }
    }
}

/// Compares every slide with the Markdown file carrying its number as prefix.
#[derive(Debug, Clone, Default)]
pub struct DeckToMarkdown {
    config: DeckMarkdownConfig,
}

impl DeckToMarkdown {
    pub fn new(config: DeckMarkdownConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, deck: &Path, markdown: &Path) -> Result<Report> {
        check_threshold("threshold", self.config.threshold)?;
        let deck = load_deck(deck)?;
        let markdown = load_markdown(markdown, KeyBy::Prefix)?;
        Ok(self.compare(&deck, &markdown))
    }

    pub fn compare(&self, deck: &Deck, markdown: &MarkdownDir) -> Report {
        let slides = DeckRenderer::new(RenderStyle::Markdown)
            .with_notes(self.config.include_notes)
            .to_corpus(deck);
        let files = markdown.to_corpus(&MarkdownCleaner::new());

        let aligner = Aligner::new(
            AlignConfig::default()
                .with_metric(self.config.metric)
                .with_thresholds(self.config.threshold, self.config.threshold),
        );
        let differ = Differ::with_granularity(Granularity::Word);
        let matches = aligner.pair_by_key(&files, &slides, 0);

        let mut report = Report::new("PowerPoint to Markdown Comparison")
            .with_labels(deck.filename.clone(), files.source.clone());
        report.summary.total = slides.len();

        for (slide, m) in slides.units().iter().zip(&matches) {
            let Some(file) = m.reference.as_ref().and_then(|id| files.get(id)) else {
                report.summary.record_skipped(slide.label.clone());
                report.push_section(missing_section(
                    slide,
                    "No corresponding Markdown file found",
                ));
                continue;
            };

            report.summary.record_matched();
            if m.score <= self.config.threshold {
                log::debug!("{}: similarity {:.2} at or below threshold", slide.label, m.score);
                report.summary.record_changed(slide.label.clone());
            }

            let diff = differ.compare(&slide.text, &file.text);
            let mut section = pair_section(&slide.label, &file.label, slide, file, diff)
                .with_score(m.score, m.confidence);
            if self.config.check_bullets {
                section.push_messages(bullet_issues(&slide.text, &file.text));
            }
            report.push_section(section);
        }

        for file in unclaimed(&files, &matches) {
            report.summary.record_skipped(file.label.clone());
            report
                .issues
                .push(Issue::info(format!("'{}' has no matching slide", file.label)));
        }
        report.issues.extend(files.issues.iter().cloned());
        report.note(format!("Change threshold: {:.2}", self.config.threshold));
        report
    }
}

/// Soft checks on `*` bullet lines: same count, same text in order.
pub fn bullet_issues(slide: &str, markdown: &str) -> Vec<Issue> {
    let bullets = |text: &str| -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|line| line.starts_with('*'))
            .map(str::to_string)
            .collect()
    };
    let slide_bullets = bullets(slide);
    let markdown_bullets = bullets(markdown);

    let mut issues = Vec::new();
    if slide_bullets.len() != markdown_bullets.len() {
        issues.push(Issue::warning(
            "Number of bullet points do not match between PPT and Markdown.",
        ));
    }
    for (a, b) in slide_bullets.iter().zip(&markdown_bullets) {
        if a != b {
            issues.push(Issue::warning(format!("Bullet point mismatch: {} != {}", a, b)));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{deck, markdown, slide};
    use doccheck_core::{Block, Confidence};

    #[test]
    fn test_identical_slide_and_file() {
        let deck = deck("training.pptx", vec![slide(1, "Welcome", &["First point", "Second point"])]);
        let md = markdown("md", KeyBy::Prefix, &[("1_welcome.md", "# Welcome\n* First point\n* Second point")]);

        let report = DeckToMarkdown::default().compare(&deck, &md);
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.matched, 1);
        assert_eq!(report.summary.changed, 0);

        let section = &report.sections[0];
        assert_eq!(section.title, "Slide 1");
        assert_eq!(section.target.as_deref(), Some("1_welcome.md"));
        assert_eq!(section.score, Some(1.0));
        assert_eq!(section.confidence, Some(Confidence::Strict));
        assert!(!section.blocks.iter().any(|b| matches!(b, Block::Messages(_))));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let deck = deck("training.pptx", vec![
            slide(1, "Welcome", &["First point"]),
            slide(2, "Agenda", &["Topics"]),
        ]);
        let md = markdown("md", KeyBy::Prefix, &[("1_welcome.md", "# Welcome\n* First point")]);

        let report = DeckToMarkdown::default().compare(&deck, &md);
        assert_eq!(report.summary.skipped_units, vec!["Slide 2"]);
        let Block::Messages(issues) = &report.sections[1].blocks[0] else {
            panic!("expected messages");
        };
        assert_eq!(issues[0].message, "No corresponding Markdown file found");
    }

    #[test]
    fn test_low_similarity_is_changed() {
        let deck = deck("training.pptx", vec![slide(1, "Welcome", &["Alpha beta gamma"])]);
        let md = markdown("md", KeyBy::Prefix, &[("1_other.md", "# Summary\n* Delta epsilon zeta")]);

        let report = DeckToMarkdown::default().compare(&deck, &md);
        assert_eq!(report.summary.changed_units, vec!["Slide 1"]);
        assert!(report.sections[0].score.unwrap() <= 0.75);
    }

    #[test]
    fn test_unmatched_and_unprefixed_files_reported() {
        let deck = deck("training.pptx", vec![slide(1, "Welcome", &["First point"])]);
        let md = markdown("md", KeyBy::Prefix, &[
            ("1_welcome.md", "# Welcome\n* First point"),
            ("9_extra.md", "# Extra"),
            ("readme.md", "# Readme"),
        ]);

        let report = DeckToMarkdown::default().compare(&deck, &md);
        assert_eq!(report.summary.skipped_units, vec!["9_extra.md"]);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message == "Skipped 'readme.md': no numeric prefix"));
    }

    #[test]
    fn test_bullet_issues() {
        let issues = bullet_issues("* a\n* b", "* a");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("Number of bullet points"));

        let issues = bullet_issues("# T\n* a", "# T\n* c");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Bullet point mismatch: * a != * c");

        assert!(bullet_issues("* same", "  * same").is_empty());
    }

    #[test]
    fn test_run_rejects_threshold_above_one() {
        let check = DeckToMarkdown::new(DeckMarkdownConfig {
            threshold: 7.0,
            ..Default::default()
        });
        let result = check.run(Path::new("deck.pptx"), Path::new("markdown"));
        assert!(matches!(result, Err(doccheck_core::Error::ConfigError(_))));
    }
}
