//! Domain types for representing extracted document content.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a unit inside its corpus.
///
/// Numbers are slide numbers, page numbers or numeric file prefixes
/// (`3_introduction.md` is unit 3). Names are used when a corpus is keyed
/// by file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitId {
    Number(u32),
    Name(String),
}

impl UnitId {
    /// Numeric value, if this identifier is a number.
    pub fn number(&self) -> Option<u32> {
        match self {
            UnitId::Number(n) => Some(*n),
            UnitId::Name(_) => None,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Number(n) => write!(f, "{}", n),
            UnitId::Name(name) => f.write_str(name),
        }
    }
}

impl PartialOrd for UnitId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnitId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (UnitId::Number(a), UnitId::Number(b)) => a.cmp(b),
            (UnitId::Number(_), UnitId::Name(_)) => Ordering::Less,
            (UnitId::Name(_), UnitId::Number(_)) => Ordering::Greater,
            (UnitId::Name(a), UnitId::Name(b)) => a.cmp(b),
        }
    }
}

impl From<u32> for UnitId {
    fn from(n: u32) -> Self {
        UnitId::Number(n)
    }
}

impl From<&str> for UnitId {
    fn from(name: &str) -> Self {
        UnitId::Name(name.to_string())
    }
}

impl From<String> for UnitId {
    fn from(name: String) -> Self {
        UnitId::Name(name)
    }
}

/// How serious a recorded problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A soft problem found during extraction or validation.
///
/// Issues are reported, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of an optional, best-effort extraction (notes, pictures, links).
///
/// Keeps "this input does not have the feature" apart from "extracting the
/// feature failed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Extracted<T> {
    /// The feature was present and extracted.
    Found(T),
    /// The input does not carry this feature.
    Unsupported(String),
    /// The feature exists but could not be read.
    Failed(String),
}

impl<T> Extracted<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Extracted::Found(_))
    }

    /// The extracted value, if any.
    pub fn found(&self) -> Option<&T> {
        match self {
            Extracted::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into an `Option`, turning a failure into an issue.
    pub fn into_option(self, what: &str, issues: &mut Vec<Issue>) -> Option<T> {
        match self {
            Extracted::Found(value) => Some(value),
            Extracted::Unsupported(_) => None,
            Extracted::Failed(reason) => {
                issues.push(Issue::warning(format!("{} extraction failed: {}", what, reason)));
                None
            }
        }
    }
}

impl<T: Default> Extracted<T> {
    /// The extracted value or the default when unsupported or failed.
    pub fn unwrap_or_default(self) -> T {
        match self {
            Extracted::Found(value) => value,
            _ => T::default(),
        }
    }
}

/// A picture placed on a slide, identified by the hash of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Hex SHA-256 of the image bytes, or the reference name when bytes are unavailable.
    pub hash: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// A table as a grid of cell texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Render as pipe-delimited rows (`| a | b |`).
    pub fn to_pipe_rows(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                let mut line = String::from("| ");
                for cell in row {
                    line.push_str(cell.trim());
                    line.push_str(" | ");
                }
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A run of text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRun {
    pub text: String,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    /// Hex RGB color, e.g. `FF0000`.
    pub color: Option<String>,
    pub font: Option<String>,
}

impl FormatRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// The text decorated with Markdown emphasis markers.
    pub fn to_markdown(&self) -> String {
        let text = self.text.trim();
        if text.is_empty() {
            return String::new();
        }
        match (self.bold == Some(true), self.italic == Some(true)) {
            (true, true) => format!("***{}***", text),
            (true, false) => format!("**{}**", text),
            (false, true) => format!("*{}*", text),
            (false, false) => text.to_string(),
        }
    }
}

/// A paragraph made of formatting runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Indent level (0 = top level).
    pub level: u32,
    pub runs: Vec<FormatRun>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Optional side-channel data attached to a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitMeta {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<ImageRef>,
    pub tables: Vec<Table>,
    pub paragraphs: Vec<Paragraph>,
    /// Number of images, for sources that count rather than hash them.
    pub image_count: Option<usize>,
}

/// One comparable chunk of a document: a slide, a page or a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,

    /// Human readable label ("Slide 3", "intro.md").
    pub label: String,

    /// Normalized text used for similarity and diffing.
    pub text: String,

    pub meta: UnitMeta,

    /// Soft problems found while extracting this unit.
    pub issues: Vec<Issue>,
}

impl Unit {
    /// Create a unit with the given id and text, labelled by its id.
    pub fn new(id: impl Into<UnitId>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            text: text.into(),
            meta: UnitMeta::default(),
            issues: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_meta(mut self, meta: UnitMeta) -> Self {
        self.meta = meta;
        self
    }

    /// A unit whose source could not be read: present, empty, flagged.
    pub fn unreadable(id: impl Into<UnitId>, reason: impl fmt::Display) -> Self {
        let mut unit = Self::new(id, "");
        unit.issues.push(Issue::error(format!("Unreadable: {}", reason)));
        unit
    }

    /// True if no text could be extracted.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Add the "no content found" issue if the unit is empty and not already flagged.
    pub fn flag_if_empty(&mut self) {
        if self.is_empty() && self.issues.is_empty() {
            self.issues.push(Issue::warning("No content found"));
        }
    }
}

/// The kind of document a corpus was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorpusKind {
    Deck,
    Pdf,
    MarkdownDir,
    Text,
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorpusKind::Deck => "Presentation",
            CorpusKind::Pdf => "PDF",
            CorpusKind::MarkdownDir => "Markdown",
            CorpusKind::Text => "Text",
        };
        f.write_str(s)
    }
}

/// The ordered set of units extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    /// Where the units came from (file or directory name).
    pub source: String,
    pub kind: CorpusKind,
    units: Vec<Unit>,
    /// Problems that concern the whole corpus.
    pub issues: Vec<Issue>,
}

impl Corpus {
    pub fn new(source: impl Into<String>, kind: CorpusKind) -> Self {
        Self {
            source: source.into(),
            kind,
            units: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Build a text corpus from `(id, text)` pairs, in order.
    pub fn from_texts<I, K, T>(source: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<UnitId>,
        T: Into<String>,
    {
        let mut corpus = Self::new(source, CorpusKind::Text);
        for (id, text) in items {
            corpus.push(Unit::new(id, text));
        }
        corpus
    }

    /// Append a unit. A unit with an id already present replaces nothing;
    /// the duplicate is recorded as an issue and dropped.
    pub fn push(&mut self, unit: Unit) {
        if self.get(&unit.id).is_some() {
            self.issues.push(Issue::warning(format!(
                "Duplicate unit '{}' ignored",
                unit.label
            )));
            return;
        }
        self.units.push(unit);
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    pub fn get(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.id == id)
    }

    pub fn position(&self, id: &UnitId) -> Option<usize> {
        self.units.iter().position(|u| &u.id == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sort units by id (numbers first, then names).
    pub fn sort_by_id(&mut self) {
        self.units.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// Apply a function to every unit's text.
    pub fn map_text(&mut self, f: impl Fn(&str) -> String) {
        for unit in &mut self.units {
            unit.text = f(&unit.text);
        }
    }
}
