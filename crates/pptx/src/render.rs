//! Rendering parsed slides into comparable text units.

use crate::parser::{Deck, Slide};
use doccheck_core::{Corpus, CorpusKind, Issue, Paragraph, TextNormalizer, Unit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A trailing line that only holds a slide number (`* 12`, `12`).
static SLIDE_NUMBER_RESIDUE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*?\s*\d+\s*$").unwrap());

/// How slide text is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    /// `# title`, `* bullet` lines, pipe tables and a notes block.
    #[default]
    Markdown,
    /// Body text only, one shape per line group; the title stays in the metadata.
    Plain,
}

/// Turns slides into units.
#[derive(Debug, Clone)]
pub struct DeckRenderer {
    style: RenderStyle,
    include_notes: bool,
    include_tables: bool,
    normalizer: TextNormalizer,
}

impl Default for DeckRenderer {
    fn default() -> Self {
        Self::new(RenderStyle::Markdown)
    }
}

impl DeckRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            style,
            include_notes: true,
            include_tables: true,
            normalizer: TextNormalizer::new(),
        }
    }

    pub fn with_notes(mut self, enabled: bool) -> Self {
        self.include_notes = enabled;
        self
    }

    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.include_tables = enabled;
        self
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Render one slide.
    pub fn render_slide(&self, slide: &Slide) -> String {
        let text = match self.style {
            RenderStyle::Markdown => self.render_markdown(slide),
            RenderStyle::Plain => slide.body_texts().join("\n"),
        };
        self.normalizer.normalize(&text)
    }

    fn render_markdown(&self, slide: &Slide) -> String {
        let mut lines = Vec::new();
        let title = slide
            .title()
            .unwrap_or_else(|| format!("Slide_{}", slide.number));
        lines.push(format!("# {}", title.replace('\n', " ")));

        for shape in slide.body_shapes() {
            let bulleted = matches!(shape.placeholder.as_deref(), Some("body") | Some("obj"));
            for paragraph in shape.paragraphs() {
                let text = paragraph_markdown(paragraph);
                if text.is_empty() {
                    continue;
                }
                if bulleted {
                    let indent = "  ".repeat(paragraph.level as usize);
                    lines.push(format!("{}* {}", indent, text));
                } else {
                    lines.push(text);
                }
            }
        }
        trim_slide_number_residue(&mut lines);

        if self.include_tables {
            for table in slide.tables() {
                lines.push(table.to_pipe_rows());
            }
        }

        if self.include_notes {
            if let Some(notes) = slide.notes.found().filter(|n| !n.trim().is_empty()) {
                lines.push(format!("### Notes:\n{}", notes));
            }
        }

        lines.join("\n")
    }

    /// Build a corpus with one unit per slide, keyed by slide number.
    pub fn to_corpus(&self, deck: &Deck) -> Corpus {
        let mut corpus = Corpus::new(deck.filename.clone(), CorpusKind::Deck);
        for slide in &deck.slides {
            let mut unit = Unit::new(slide.number, self.render_slide(slide))
                .with_label(format!("Slide {}", slide.number))
                .with_meta(slide.meta());
            unit.issues.extend(slide.issues.iter().cloned());
            if slide.hidden {
                unit.issues.push(Issue::info("Hidden slide"));
            }
            unit.flag_if_empty();
            corpus.push(unit);
        }
        corpus
    }
}

/// Runs with Markdown emphasis, joined by single spaces.
fn paragraph_markdown(paragraph: &Paragraph) -> String {
    paragraph
        .runs
        .iter()
        .map(|run| run.to_markdown())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop trailing lines that are only a slide number.
fn trim_slide_number_residue(lines: &mut Vec<String>) {
    while lines.len() > 1
        && lines
            .last()
            .is_some_and(|l| SLIDE_NUMBER_RESIDUE_REGEX.is_match(l.trim()))
    {
        lines.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{build_pptx, TestSlide};
    use crate::PptxParser;
    use doccheck_core::{FormatRun, UnitId};
    use std::io::Cursor;

    fn deck() -> Deck {
        let bytes = build_pptx(&[
            TestSlide {
                title: "Welcome",
                body: &["First point", "Second point", "3"],
                notes: Some("Say hello"),
                image: None,
            },
            TestSlide {
                title: "Empty",
                body: &[],
                notes: None,
                image: None,
            },
        ]);
        PptxParser::new().parse(Cursor::new(bytes), "deck.pptx").unwrap()
    }

    #[test]
    fn test_markdown_rendering() {
        let deck = deck();
        let text = DeckRenderer::default().render_slide(&deck.slides[0]);
        assert_eq!(
            text,
            "# Welcome\n* First point\n* Second point\n### Notes:\nSay hello"
        );
    }

    #[test]
    fn test_plain_rendering() {
        let deck = deck();
        let renderer = DeckRenderer::new(RenderStyle::Plain);
        assert_eq!(renderer.render_slide(&deck.slides[0]), "First point\nSecond point\n3");
        assert_eq!(renderer.render_slide(&deck.slides[1]), "");
    }

    #[test]
    fn test_corpus_keeps_empty_slides() {
        let deck = deck();
        let corpus = DeckRenderer::new(RenderStyle::Plain).to_corpus(&deck);
        assert_eq!(corpus.len(), 2);

        let empty = corpus.get(&UnitId::Number(2)).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.issues[0].message, "No content found");
        assert_eq!(empty.label, "Slide 2");
        assert_eq!(empty.meta.title.as_deref(), Some("Empty"));
    }

    #[test]
    fn test_paragraph_emphasis() {
        let paragraph = Paragraph {
            level: 0,
            runs: vec![
                FormatRun {
                    text: "Bold".into(),
                    bold: Some(true),
                    ..Default::default()
                },
                FormatRun::plain("  "),
                FormatRun::plain("plain"),
            ],
        };
        assert_eq!(paragraph_markdown(&paragraph), "**Bold** plain");
    }

    #[test]
    fn test_slide_number_residue() {
        let mut lines = vec!["# Title".to_string(), "* body".to_string(), "* 12".to_string()];
        trim_slide_number_residue(&mut lines);
        assert_eq!(lines, vec!["# Title", "* body"]);
    }
}
