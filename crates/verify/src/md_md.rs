//! Two versions of a Markdown tree, matched file by file.

use crate::common::{load_markdown, missing_section, pair_section};
use doccheck_core::{
    unclaimed, AlignConfig, Aligner, Confidence, Differ, Granularity, Issue, Metric, Report,
    Result, TextNormalizer, TokenPattern, Unit,
};
use doccheck_markdown::{KeyBy, MarkdownCleaner, MarkdownDir};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Markdown-to-Markdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownVersionsConfig {
    pub align: AlignConfig,
    /// Matched files scoring at or below this are reported as changed.
    pub change_threshold: f64,
    /// Old files may open with a `--- AuthorInformation:` line to drop.
    pub old_header_line: bool,
}

impl Default for MarkdownVersionsConfig {
    fn default() -> Self {
        Self {
            align: AlignConfig::default()
                .with_thresholds(0.90, 0.85)
                .with_metric(Metric::Tfidf {
                    tokens: TokenPattern::Word,
                })
                .with_exclusive(false),
            change_threshold: 0.97,
            old_header_line: true,
        }
    }
}

/// Matches every file of the new tree to its best counterpart in the old one.
#[derive(Debug, Clone, Default)]
pub struct MarkdownVersions {
    config: MarkdownVersionsConfig,
}

impl MarkdownVersions {
    pub fn new(config: MarkdownVersionsConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, old: &Path, new: &Path) -> Result<Report> {
        self.config.align.validate()?;
        let old = load_markdown(old, KeyBy::FileName)?;
        let new = load_markdown(new, KeyBy::FileName)?;
        Ok(self.compare(&old, &new))
    }

    pub fn compare(&self, old: &MarkdownDir, new: &MarkdownDir) -> Report {
        let cleaner = MarkdownCleaner::new().with_front_matter(false);
        let old_files = old.to_corpus(&cleaner.clone().with_old_variant(self.config.old_header_line));
        let new_files = new.to_corpus(&cleaner);

        let aligner = Aligner::new(self.config.align.clone());
        let differ = Differ::with_granularity(Granularity::Word);
        let periods = TextNormalizer::new().with_strip_trailing_periods(true);
        let matches = aligner.align(&old_files, &new_files);

        let mut report = Report::new("Markdown Version Comparison")
            .with_labels(old_files.source.clone(), new_files.source.clone());
        report.summary.total = new_files.len();

        for (file, m) in new_files.units().iter().zip(&matches) {
            let Some(previous) = m.reference.as_ref().and_then(|id| old_files.get(id)) else {
                report.summary.record_skipped(file.label.clone());
                report.push_section(missing_section(
                    file,
                    "Not present in old version directory",
                ));
                continue;
            };

            report.summary.record_matched();
            if m.score <= self.config.change_threshold {
                report.summary.record_changed(file.label.clone());
            }

            // Full stops at line ends are not content edits
            let old_text = Unit {
                text: periods.normalize(&previous.text),
                ..previous.clone()
            };
            let new_text = Unit {
                text: periods.normalize(&file.text),
                ..file.clone()
            };
            let diff = differ.compare(&old_text.text, &new_text.text);
            let mut section = pair_section(&file.label, &previous.label, &old_text, &new_text, diff)
                .with_score(m.score, m.confidence);
            if m.confidence == Confidence::Low {
                report.summary.record_low_confidence();
                section.push_messages(vec![Issue::warning("Low-confidence match")]);
            }
            report.push_section(section);
        }

        for file in unclaimed(&old_files, &matches) {
            report.summary.record_skipped(file.label.clone());
            report.issues.push(Issue::info(format!(
                "'{}' is not present in new version directory",
                file.label
            )));
        }
        report.note(format!(
            "Strict threshold: {:.2}, low threshold: {:.2}, change threshold: {:.2}",
            self.config.align.strict, self.config.align.low, self.config.change_threshold
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccheck_core::{Block, DiffTag};
    use crate::fixtures::markdown;

    fn tree(root: &str, files: &[(&str, &str)]) -> MarkdownDir {
        markdown(root, KeyBy::FileName, files)
    }

    #[test]
    fn test_renamed_file_is_matched_by_content() {
        let old = tree(
            "v1",
            &[("setup.md", "# Setup\nConnect the power cable to the rear port.")],
        );
        let new = tree(
            "v2",
            &[("01_setup.md", "# Setup\nConnect the power cable to the rear port.")],
        );

        let report = MarkdownVersions::default().compare(&old, &new);
        assert_eq!(report.summary.matched, 1);
        assert!(report.summary.is_clean());
        assert_eq!(report.sections[0].target.as_deref(), Some("setup.md"));
    }

    #[test]
    fn test_old_header_line_is_dropped() {
        let old = tree(
            "v1",
            &[(
                "a.md",
                "--- AuthorInformation: Jane audience: operators\nPress the green button.",
            )],
        );
        let new = tree("v2", &[("a.md", "Press the green button.")]);

        let report = MarkdownVersions::default().compare(&old, &new);
        assert_eq!(report.sections[0].score, Some(1.0));
    }

    #[test]
    fn test_trailing_periods_do_not_show_in_diff() {
        let old = tree("v1", &[("a.md", "Press the green button.\nWait for the beep.")]);
        let new = tree("v2", &[("a.md", "Press the green button\nWait for the beep")]);

        let report = MarkdownVersions::default().compare(&old, &new);
        let Block::Diff(pane) = &report.sections[0].blocks[0] else {
            panic!("expected a diff");
        };
        assert!(pane.spans.iter().all(|s| s.tag == DiffTag::Equal));
    }

    #[test]
    fn test_unmatched_files_in_both_directions() {
        let old = tree(
            "v1",
            &[
                ("keep.md", "Shared paragraph about calibration steps"),
                ("gone.md", "Retired appendix on legacy firmware"),
            ],
        );
        let new = tree(
            "v2",
            &[
                ("keep.md", "Shared paragraph about calibration steps"),
                ("fresh.md", "Brand new chapter on cloud sync"),
            ],
        );

        let report = MarkdownVersions::default().compare(&old, &new);
        assert_eq!(report.summary.skipped_units, vec!["fresh.md", "gone.md"]);
        assert_eq!(report.summary.matched, 1);
    }

    #[test]
    fn test_edit_below_change_threshold() {
        let words: Vec<String> = (1..=30).map(|i| format!("word{}", i)).collect();
        let before = words.join(" ");
        let after = before.replace("word30", "changed");
        let old = tree("v1", &[("a.md", before.as_str())]);
        let new = tree("v2", &[("a.md", after.as_str())]);

        // One word in thirty: still a strict match, but an edit
        let report = MarkdownVersions::default().compare(&old, &new);
        assert_eq!(report.sections[0].confidence, Some(Confidence::Strict));
        assert_eq!(report.summary.changed_units, vec!["a.md"]);
    }
}
