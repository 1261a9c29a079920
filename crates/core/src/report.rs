//! Report model shared by all checks and renderers.

use crate::align::Confidence;
use crate::diff::{DiffSpan, TextDiff};
use crate::types::Issue;
use serde::{Deserialize, Serialize};

/// A side-by-side diff of two texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPane {
    pub caption: String,
    pub old: String,
    pub new: String,
    pub spans: Vec<DiffSpan>,
}

impl DiffPane {
    pub fn new(caption: impl Into<String>, old: impl Into<String>, new: impl Into<String>, diff: TextDiff) -> Self {
        Self {
            caption: caption.into(),
            old: old.into(),
            new: new.into(),
            spans: diff.spans,
        }
    }
}

/// A table with a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTable {
    /// Title of the table; also the worksheet name in workbooks.
    pub caption: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new<I, S>(caption: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            caption: caption.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One piece of content inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Diff(DiffPane),
    Table(ReportTable),
    Messages(Vec<Issue>),
    /// Preformatted text shown as is.
    Text { caption: String, body: String },
}

/// The report content for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Label of the matched counterpart, if any.
    pub target: Option<String>,
    pub score: Option<f64>,
    pub confidence: Option<Confidence>,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target: None,
            score: None,
            confidence: None,
            blocks: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_score(mut self, score: f64, confidence: Confidence) -> Self {
        self.score = Some(score);
        self.confidence = Some(confidence);
        self
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Add messages, skipping the block entirely when there are none.
    pub fn push_messages(&mut self, issues: Vec<Issue>) {
        if !issues.is_empty() {
            self.blocks.push(Block::Messages(issues));
        }
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub matched: usize,
    pub changed: usize,
    pub skipped: usize,
    pub mismatched: usize,
    pub low_confidence: usize,
    pub changed_units: Vec<String>,
    pub skipped_units: Vec<String>,
    pub mismatched_units: Vec<String>,
}

impl Summary {
    pub fn record_matched(&mut self) {
        self.matched += 1;
    }

    pub fn record_low_confidence(&mut self) {
        self.low_confidence += 1;
    }

    pub fn record_changed(&mut self, label: impl Into<String>) {
        self.changed += 1;
        self.changed_units.push(label.into());
    }

    pub fn record_skipped(&mut self, label: impl Into<String>) {
        self.skipped += 1;
        self.skipped_units.push(label.into());
    }

    pub fn record_mismatched(&mut self, label: impl Into<String>) {
        self.mismatched += 1;
        self.mismatched_units.push(label.into());
    }

    /// Counts as `(name, value)` pairs, in display order.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Total", self.total),
            ("Matched", self.matched),
            ("Changed", self.changed),
            ("Skipped", self.skipped),
            ("Mismatched", self.mismatched),
            ("Low confidence", self.low_confidence),
        ]
    }

    /// True when nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.changed == 0 && self.skipped == 0 && self.mismatched == 0
    }
}

/// Everything a check found, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    /// Label of the reference side (e.g. the source PDF).
    pub reference_label: String,
    /// Label of the candidate side (e.g. the Markdown directory).
    pub candidate_label: String,
    pub sections: Vec<Section>,
    pub summary: Summary,
    /// Extra tables appended after the summary (and written as worksheets).
    pub tables: Vec<ReportTable>,
    /// Problems that are not tied to a single section.
    pub issues: Vec<Issue>,
    /// Settings the run used, shown in the report footer.
    pub notes: Vec<String>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            reference_label: String::new(),
            candidate_label: String::new(),
            sections: Vec::new(),
            summary: Summary::default(),
            tables: Vec::new(),
            issues: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_labels(mut self, reference: impl Into<String>, candidate: impl Into<String>) -> Self {
        self.reference_label = reference.into();
        self.candidate_label = candidate.into();
        self
    }

    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Table by caption, if present.
    pub fn table(&self, caption: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.caption == caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_records() {
        let mut summary = Summary::default();
        summary.record_matched();
        summary.record_changed("Slide 2");
        summary.record_skipped("extra.md");
        assert_eq!(summary.changed_units, vec!["Slide 2"]);
        assert_eq!(summary.skipped_units, vec!["extra.md"]);
        assert!(!summary.is_clean());
        assert_eq!(summary.counts()[1], ("Matched", 1));
    }

    #[test]
    fn test_section_skips_empty_messages() {
        let mut section = Section::new("Page 1");
        section.push_messages(Vec::new());
        assert!(section.blocks.is_empty());
        section.push_messages(vec![Issue::warning("Table format invalid")]);
        assert_eq!(section.blocks.len(), 1);
    }

    #[test]
    fn test_report_table_lookup() {
        let mut report = Report::new("Deck comparison").with_labels("old.pptx", "new.pptx");
        let mut table = ReportTable::new("Slide Comparison", ["Title", "Changes Detected"]);
        table.push_row(["Intro", "Yes"]);
        report.tables.push(table);

        assert_eq!(report.table("Slide Comparison").map(|t| t.rows.len()), Some(1));
        assert!(report.table("Missing").is_none());
    }
}
