//! Code spans and fenced blocks must survive translation unchanged.

use crate::common::{check_threshold, load_markdown};
use doccheck_core::diff::char_ratio;
use doccheck_core::{
    Block, Confidence, DiffPane, Differ, Granularity, Issue, Report, Result, Section,
};
use doccheck_markdown::{code_fragments, KeyBy, MarkdownDir, MarkdownDoc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Code comparison settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBlocksConfig {
    /// Pairs whose code similarity falls below this are reported.
    pub threshold: f64,
}

impl Default for CodeBlocksConfig {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

/// Compares the code of each source file with its translation.
#[derive(Debug, Clone, Default)]
pub struct CodeBlocks {
    config: CodeBlocksConfig,
}

impl CodeBlocks {
    pub fn new(config: CodeBlocksConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, source: &Path, translated: &Path) -> Result<Report> {
        check_threshold("threshold", self.config.threshold)?;
        let source = load_markdown(source, KeyBy::Prefix)?;
        let translated = load_markdown(translated, KeyBy::Prefix)?;
        Ok(self.compare(&source, &translated))
    }

    pub fn compare(&self, source: &MarkdownDir, translated: &MarkdownDir) -> Report {
        let mut report = Report::new("Code Block Comparison")
            .with_labels(source.source(), translated.source());
        let differ = Differ::with_granularity(Granularity::Line);

        let (source_docs, unkeyed) = source.keyed();
        let (translated_docs, _) = translated.keyed();
        for doc in unkeyed {
            report.issues.push(Issue::info(format!(
                "Skipped '{}': no numeric prefix",
                doc.file_name
            )));
        }

        // First translated file per prefix
        let mut by_prefix: BTreeMap<u32, &MarkdownDoc> = BTreeMap::new();
        for (id, doc) in translated_docs {
            if let Some(prefix) = id.number() {
                by_prefix.entry(prefix).or_insert(doc);
            }
        }

        for (id, doc) in source_docs {
            report.summary.total += 1;
            let Some(other) = id.number().and_then(|prefix| by_prefix.get(&prefix)) else {
                report.summary.record_skipped(doc.file_name.clone());
                report.issues.push(Issue::warning(format!(
                    "No translated file for '{}'",
                    doc.file_name
                )));
                continue;
            };

            report.summary.record_matched();
            let old = code_fragments(&doc.content).joined();
            let new = code_fragments(&other.content).joined();
            let ratio = char_ratio(&old, &new);
            if ratio >= self.config.threshold {
                continue;
            }

            log::debug!("{}: code similarity {:.2}", doc.file_name, ratio);
            report.summary.record_changed(doc.file_name.clone());
            let mut section = Section::new(doc.file_name.clone())
                .with_target(other.file_name.clone());
            section.score = Some(ratio);
            section.confidence = Some(Confidence::Strict);
            section.push(Block::Diff(DiffPane::new(
                "Code",
                old.clone(),
                new.clone(),
                differ.compare(&old, &new),
            )));
            report.push_section(section);
        }

        report.note(format!("Similarity threshold: {:.2}", self.config.threshold));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::markdown;

    #[test]
    fn test_translated_prose_with_same_code_passes() {
        let source = markdown("en", KeyBy::Prefix, &[(
            "1_start.md",
            "Run `make build` first.\n\n```\ncargo test\n```",
        )]);
        let translated = markdown("de", KeyBy::Prefix, &[(
            "1_start.md",
            "Zuerst `make build` ausführen.\n\n```\ncargo test\n```",
        )]);

        let report = CodeBlocks::default().compare(&source, &translated);
        assert_eq!(report.summary.matched, 1);
        assert!(report.summary.is_clean());
        assert!(report.sections.is_empty());
    }

    #[test]
    fn test_changed_code_is_reported_with_line_diff() {
        let source = markdown("en", KeyBy::Prefix, &[("2_api.md", "```\nlet x = 1;\nprint(x)\n```")]);
        let translated = markdown("fr", KeyBy::Prefix, &[("2_api.md", "```\nlet x = 2;\nprint(x)\n```")]);

        let report = CodeBlocks::default().compare(&source, &translated);
        assert_eq!(report.summary.changed_units, vec!["2_api.md"]);
        let section = &report.sections[0];
        assert!(section.score.unwrap() < 1.0);
        let Block::Diff(pane) = &section.blocks[0] else {
            panic!("expected a diff");
        };
        assert_eq!(pane.old, "let x = 1;\nprint(x)");
    }

    #[test]
    fn test_missing_translation_is_skipped() {
        let source = markdown("en", KeyBy::Prefix, &[("1_a.md", "`a`"), ("2_b.md", "`b`")]);
        let translated = markdown("fr", KeyBy::Prefix, &[("1_a_fr.md", "`a`")]);

        let report = CodeBlocks::default().compare(&source, &translated);
        assert_eq!(report.summary.skipped_units, vec!["2_b.md"]);
        assert_eq!(report.summary.changed, 0);
    }

    #[test]
    fn test_lower_threshold_tolerates_small_edits() {
        let source = markdown("en", KeyBy::Prefix, &[("1_a.md", "`configure --with-ssl --prefix=/usr`")]);
        let translated = markdown("fr", KeyBy::Prefix, &[("1_a.md", "`configure --with-ssl --prefix=/opt`")]);
        let check = CodeBlocks::new(CodeBlocksConfig { threshold: 0.8 });

        assert!(check.compare(&source, &translated).summary.is_clean());
        assert_eq!(CodeBlocks::default().compare(&source, &translated).summary.changed, 1);
    }

    #[test]
    fn test_run_rejects_threshold_above_one() {
        let check = CodeBlocks::new(CodeBlocksConfig { threshold: 7.0 });
        let result = check.run(Path::new("en"), Path::new("fr"));
        assert!(matches!(result, Err(doccheck_core::Error::ConfigError(_))));
    }
}
