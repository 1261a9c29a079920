//! Two versions of a slide deck.
//!
//! The new deck is the source of truth. Every titled slide of the new deck
//! looks for the nearest unclaimed old slide with the same title; slides left
//! over are then matched on title and body text within the same window. Each
//! pair gets a ledger row plus detailed text, notes, picture, table and
//! formatting comparisons.

use crate::common::load_deck;
use doccheck_core::normalize::format_filename;
use doccheck_core::{
    AlignConfig, Aligner, Block, Confidence, Corpus, CorpusKind, DiffPane, Differ, FormatRun,
    Granularity, ImageRef, Issue, Metric, Paragraph, Report, ReportTable, Result, Section,
    Similarity, Table, Unit, Window,
};
use doccheck_pptx::{Deck, Slide};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Caption of the ledger table (and its worksheet).
pub const LEDGER_CAPTION: &str = "Slide Comparison";

/// Caption of the per-kind change counts.
pub const CHANGE_SUMMARY_CAPTION: &str = "Change Summary";

/// Deck-to-deck settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckVersionsConfig {
    /// Content matching for slides whose title found no partner. Its window
    /// also bounds the title search.
    pub align: AlignConfig,
    /// Run the content pass after the title pass.
    pub match_by_content: bool,
}

impl Default for DeckVersionsConfig {
    fn default() -> Self {
        Self {
            align: AlignConfig::default()
                .with_thresholds(0.9, 0.6)
                .with_metric(Metric::SequenceRatio)
                .with_window(Window::new(10)),
            match_by_content: true,
        }
    }
}

/// A titled slide as seen by the matcher.
struct TitledSlide<'a> {
    slide: &'a Slide,
    title: String,
    /// Non-title text, one shape per line.
    body: String,
}

impl<'a> TitledSlide<'a> {
    fn new(slide: &'a Slide) -> Option<Self> {
        let title = slide.title()?;
        Some(Self {
            slide,
            title: clean_title(&title),
            body: slide.body_texts().join("\n"),
        })
    }

    fn matching_text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

/// How a new slide found its old counterpart.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pairing {
    Title(usize),
    Content { old: usize, score: f64, confidence: Confidence, windowed: bool },
    None,
}

impl Pairing {
    fn old(&self) -> Option<usize> {
        match self {
            Pairing::Title(old) | Pairing::Content { old, .. } => Some(*old),
            Pairing::None => None,
        }
    }
}

/// Differences between two slides beyond the ledger.
#[derive(Debug, Default)]
struct SlideChanges {
    text_changed: bool,
    notes_changed: bool,
    images_added: Vec<ImageRef>,
    images_removed: Vec<ImageRef>,
    tables: Vec<(usize, Option<Table>, Option<Table>)>,
    formatting: Vec<(usize, Paragraph, Paragraph)>,
}

/// Running totals for the change summary table.
#[derive(Debug, Default)]
struct ChangeTotals {
    slides: usize,
    text: usize,
    notes: usize,
    images_added: usize,
    images_removed: usize,
    tables: usize,
    formatting: usize,
}

impl ChangeTotals {
    fn add(&mut self, changes: &SlideChanges) {
        self.slides += 1;
        self.text += changes.text_changed as usize;
        self.notes += changes.notes_changed as usize;
        self.images_added += changes.images_added.len();
        self.images_removed += changes.images_removed.len();
        self.tables += changes.tables.len();
        self.formatting += changes.formatting.len();
    }

    fn table(&self) -> ReportTable {
        let mut table = ReportTable::new(CHANGE_SUMMARY_CAPTION, ["Metric", "Count"]);
        let rows = [
            ("Total Slides", self.slides),
            ("Slides with Text Changes", self.text),
            ("Slides with Notes Changes", self.notes),
            ("Total Images Added", self.images_added),
            ("Total Images Removed", self.images_removed),
            ("Table Changes", self.tables),
            ("Formatting Changes", self.formatting),
        ];
        for (name, count) in rows {
            table.push_row([name.to_string(), count.to_string()]);
        }
        table
    }
}

/// Compares an old and a new version of a deck.
#[derive(Debug, Clone, Default)]
pub struct DeckVersions {
    config: DeckVersionsConfig,
}

impl DeckVersions {
    pub fn new(config: DeckVersionsConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, old: &Path, new: &Path) -> Result<Report> {
        self.config.align.validate()?;
        let old = load_deck(old)?;
        let new = load_deck(new)?;
        Ok(self.compare(&old, &new))
    }

    pub fn compare(&self, old: &Deck, new: &Deck) -> Report {
        let mut report = Report::new("Presentation Version Comparison")
            .with_labels(old.filename.clone(), new.filename.clone());
        let old_slides = titled_slides(old, &mut report.issues);
        let new_slides = titled_slides(new, &mut report.issues);
        let pairings = self.pair(&old_slides, &new_slides);

        let differ = Differ::with_granularity(Granularity::Char);
        let mut ledger = ReportTable::new(
            LEDGER_CAPTION,
            ["Title", "Slide Number (New)", "Slide Number (Old)", "Changes Detected"],
        );
        let mut totals = ChangeTotals::default();
        report.summary.total = new_slides.len();

        for (current, pairing) in new_slides.iter().zip(&pairings) {
            let number = current.slide.number;
            let label = format!("Slide {}: {}", number, current.title);
            let Some(previous) = pairing.old().map(|i| &old_slides[i]) else {
                ledger.push_row([
                    current.title.clone(),
                    number.to_string(),
                    "Not Found".to_string(),
                    "New slide".to_string(),
                ]);
                report.summary.record_skipped(label);
                let mut section = Section::new(format!("Slide {} ({})", number, current.title));
                section.push_messages(vec![Issue::warning("Not found in old deck")]);
                report.push_section(section);
                continue;
            };

            report.summary.record_matched();
            let mut detected = Vec::new();
            if current.body != previous.body {
                detected.push("Text changed");
            }
            if current.slide.images().len() != previous.slide.images().len() {
                detected.push("Image changed");
            }
            let changes_detected = if detected.is_empty() {
                "No changes".to_string()
            } else {
                report.summary.record_changed(label);
                detected.join(", ")
            };
            ledger.push_row([
                current.title.clone(),
                number.to_string(),
                previous.slide.number.to_string(),
                changes_detected,
            ]);

            let changes = slide_changes(previous.slide, current.slide, &differ);
            totals.add(&changes);
            report.push_section(self.pair_section(previous, current, *pairing, changes, &differ));
        }

        let claimed: HashSet<usize> = pairings.iter().filter_map(Pairing::old).collect();
        for (i, previous) in old_slides.iter().enumerate() {
            if claimed.contains(&i) {
                continue;
            }
            report
                .summary
                .record_skipped(format!("Old slide {}: {}", previous.slide.number, previous.title));
            let mut section = Section::new(format!(
                "Old slide {} ({})",
                previous.slide.number, previous.title
            ));
            section.push_messages(vec![Issue::warning("Not found in new deck")]);
            report.push_section(section);
        }

        report.tables.push(ledger);
        report.tables.push(totals.table());
        if let Some(window) = self.config.align.window {
            report.note(format!("Slide window: ±{}", window.radius));
        }
        report
    }

    /// Title pass, then content pass over what is left.
    fn pair(&self, old: &[TitledSlide<'_>], new: &[TitledSlide<'_>]) -> Vec<Pairing> {
        let window = self.config.align.window;
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut pairings = vec![Pairing::None; new.len()];

        for (i, current) in new.iter().enumerate() {
            let number = current.slide.number as i64;
            let nearest = old
                .iter()
                .enumerate()
                .filter(|(j, previous)| !claimed.contains(j) && previous.title == current.title)
                .map(|(j, previous)| (j, (previous.slide.number as i64 - number).abs()))
                .filter(|(j, _)| {
                    window.map_or(true, |w| {
                        (old[*j].slide.number as i64 - number - w.offset).abs() <= w.radius as i64
                    })
                })
                .min_by_key(|(_, distance)| *distance);
            if let Some((j, _)) = nearest {
                claimed.insert(j);
                pairings[i] = Pairing::Title(j);
            }
        }

        if !self.config.match_by_content {
            return pairings;
        }

        let remaining_old = content_corpus(old, |j| !claimed.contains(&j));
        let remaining_new = content_corpus(new, |i| pairings[i] == Pairing::None);
        if remaining_old.is_empty() || remaining_new.is_empty() {
            return pairings;
        }

        let old_index: HashMap<u32, usize> = old
            .iter()
            .enumerate()
            .map(|(j, s)| (s.slide.number, j))
            .collect();
        let new_index: HashMap<u32, usize> = new
            .iter()
            .enumerate()
            .map(|(i, s)| (s.slide.number, i))
            .collect();

        let aligner = Aligner::new(self.config.align.clone());
        for m in aligner.align(&remaining_old, &remaining_new) {
            let (Some(i), Some(j)) = (
                m.candidate.number().and_then(|n| new_index.get(&n)),
                m.reference.as_ref().and_then(|id| id.number()).and_then(|n| old_index.get(&n)),
            ) else {
                continue;
            };
            log::debug!(
                "Slide {} matched old slide {} by content ({:.2})",
                new[*i].slide.number,
                old[*j].slide.number,
                m.score
            );
            pairings[*i] = Pairing::Content {
                old: *j,
                score: m.score,
                confidence: m.confidence,
                windowed: m.windowed,
            };
        }
        pairings
    }

    fn pair_section(
        &self,
        previous: &TitledSlide<'_>,
        current: &TitledSlide<'_>,
        pairing: Pairing,
        changes: SlideChanges,
        differ: &Differ,
    ) -> Section {
        let old_text = slide_text(previous.slide);
        let new_text = slide_text(current.slide);
        let (score, confidence) = match pairing {
            Pairing::Content { score, confidence, .. } => (score, confidence),
            _ => (
                Metric::SequenceRatio.score(&previous.matching_text(), &current.matching_text()),
                Confidence::Strict,
            ),
        };

        let mut section = Section::new(format!("Slide {} ({})", current.slide.number, current.title))
            .with_target(format!("Slide {}", previous.slide.number))
            .with_score(score, confidence);

        let mut messages = Vec::new();
        match pairing {
            Pairing::Content { windowed: false, .. } if self.config.align.window.is_some() => {
                messages.push(Issue::info("Matched by content outside the slide window"));
            }
            Pairing::Content { .. } => messages.push(Issue::info("Matched by content, title differs")),
            _ => {}
        }
        section.push_messages(messages);

        section.push(Block::Diff(DiffPane::new(
            "Text",
            old_text.clone(),
            new_text.clone(),
            differ.compare(&old_text, &new_text),
        )));
        let old_notes = previous.slide.notes.found().cloned().unwrap_or_default();
        let new_notes = current.slide.notes.found().cloned().unwrap_or_default();
        section.push(Block::Diff(DiffPane::new(
            "Notes",
            old_notes.clone(),
            new_notes.clone(),
            differ.compare(&old_notes, &new_notes),
        )));

        if !changes.images_added.is_empty() || !changes.images_removed.is_empty() {
            let mut table =
                ReportTable::new("Images", ["Change", "Hash", "Left", "Top", "Width", "Height"]);
            let rows = changes
                .images_added
                .iter()
                .map(|image| ("Added", image))
                .chain(changes.images_removed.iter().map(|image| ("Removed", image)));
            for (change, image) in rows {
                table.push_row([
                    change.to_string(),
                    image.hash.clone(),
                    image.left.to_string(),
                    image.top.to_string(),
                    image.width.to_string(),
                    image.height.to_string(),
                ]);
            }
            section.push(Block::Table(table));
        }

        if !changes.tables.is_empty() {
            let mut table = ReportTable::new("Table Differences", ["Table", "Old", "New"]);
            for (index, old, new) in &changes.tables {
                let render = |t: &Option<Table>| t.as_ref().map(Table::to_pipe_rows).unwrap_or_default();
                table.push_row([(index + 1).to_string(), render(old), render(new)]);
            }
            section.push(Block::Table(table));
        }

        if !changes.formatting.is_empty() {
            let mut table = ReportTable::new("Formatting Differences", ["Paragraph", "Old", "New"]);
            for (index, old, new) in &changes.formatting {
                table.push_row([(index + 1).to_string(), describe_runs(&old.runs), describe_runs(&new.runs)]);
            }
            section.push(Block::Table(table));
        }
        section
    }
}

/// Workbook file name for a comparison: the first titled slide of the new
/// deck reduced to alphanumerics, or `ComparisonReport`.
pub fn workbook_file_name(new: &Deck) -> String {
    let stem = new
        .slides
        .iter()
        .find_map(Slide::title)
        .map(|title| format_filename(&title))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "ComparisonReport".to_string());
    format!("{}.xlsx", stem)
}

fn titled_slides<'a>(deck: &'a Deck, issues: &mut Vec<Issue>) -> Vec<TitledSlide<'a>> {
    deck.slides
        .iter()
        .filter_map(|slide| {
            let titled = TitledSlide::new(slide);
            if titled.is_none() {
                issues.push(Issue::info(format!(
                    "{}: slide {} has no title and is not compared",
                    deck.filename, slide.number
                )));
            }
            titled
        })
        .collect()
}

/// Slide numbers are unique within a deck, so they serve as unit ids.
fn content_corpus(slides: &[TitledSlide<'_>], keep: impl Fn(usize) -> bool) -> Corpus {
    let mut corpus = Corpus::new("", CorpusKind::Deck);
    for (_, slide) in slides.iter().enumerate().filter(|(i, _)| keep(*i)) {
        corpus.push(Unit::new(slide.slide.number, slide.matching_text()));
    }
    corpus
}

fn clean_title(title: &str) -> String {
    title.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

/// Every text paragraph on the slide, title included.
fn slide_paragraphs(slide: &Slide) -> Vec<&Paragraph> {
    slide.shapes.iter().flat_map(|s| s.paragraphs()).collect()
}

fn slide_text(slide: &Slide) -> String {
    slide_paragraphs(slide)
        .iter()
        .map(|p| p.text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn slide_changes(old: &Slide, new: &Slide, differ: &Differ) -> SlideChanges {
    let old_images: HashSet<ImageRef> = old.images().into_iter().collect();
    let new_images: HashSet<ImageRef> = new.images().into_iter().collect();
    let mut images_added: Vec<ImageRef> = new_images.difference(&old_images).cloned().collect();
    let mut images_removed: Vec<ImageRef> = old_images.difference(&new_images).cloned().collect();
    let order = |a: &ImageRef, b: &ImageRef| (&a.hash, a.left, a.top).cmp(&(&b.hash, b.left, b.top));
    images_added.sort_by(order);
    images_removed.sort_by(order);

    let old_tables = old.tables();
    let new_tables = new.tables();
    let tables = (0..old_tables.len().max(new_tables.len()))
        .filter_map(|i| {
            let old = old_tables.get(i).map(|t| (*t).clone());
            let new = new_tables.get(i).map(|t| (*t).clone());
            (old != new).then_some((i, old, new))
        })
        .collect();

    let formatting = slide_paragraphs(old)
        .into_iter()
        .zip(slide_paragraphs(new))
        .enumerate()
        .filter(|(_, (a, b))| a.runs != b.runs)
        .map(|(i, (a, b))| (i, a.clone(), b.clone()))
        .collect();

    let notes = |slide: &Slide| slide.notes.found().cloned().unwrap_or_default();
    SlideChanges {
        text_changed: !differ.compare(&slide_text(old), &slide_text(new)).is_unchanged(),
        notes_changed: notes(old) != notes(new),
        images_added,
        images_removed,
        tables,
        formatting,
    }
}

/// `text [bold, italic, color=FF0000, font=Arial]` per run, joined by ` | `.
fn describe_runs(runs: &[FormatRun]) -> String {
    runs.iter()
        .map(|run| {
            let mut attrs = Vec::new();
            if run.bold == Some(true) {
                attrs.push("bold".to_string());
            }
            if run.italic == Some(true) {
                attrs.push("italic".to_string());
            }
            if let Some(color) = &run.color {
                attrs.push(format!("color={}", color));
            }
            if let Some(font) = &run.font {
                attrs.push(format!("font={}", font));
            }
            if attrs.is_empty() {
                run.text.clone()
            } else {
                format!("{} [{}]", run.text, attrs.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
