//! In-memory decks and Markdown trees for tests.

use doccheck_core::{Extracted, FormatRun, Paragraph};
use doccheck_markdown::{KeyBy, MarkdownDir, MarkdownDoc};
use doccheck_pptx::{Deck, Shape, ShapeContent, Slide};

pub(crate) fn text_shape(placeholder: &str, lines: &[&str]) -> Shape {
    Shape {
        name: placeholder.to_string(),
        placeholder: Some(placeholder.to_string()),
        left: 0,
        top: 0,
        width: 0,
        height: 0,
        content: ShapeContent::Text(
            lines
                .iter()
                .map(|line| Paragraph {
                    level: 0,
                    runs: vec![FormatRun::plain(*line)],
                })
                .collect(),
        ),
    }
}

pub(crate) fn picture(hash: &str, left: i64) -> Shape {
    Shape {
        name: "Picture".to_string(),
        placeholder: None,
        left,
        top: 100,
        width: 300,
        height: 200,
        content: ShapeContent::Picture {
            embed: "rId2".to_string(),
            hash: Some(hash.to_string()),
        },
    }
}

pub(crate) fn slide(number: u32, title: &str, bullets: &[&str]) -> Slide {
    let mut shapes = Vec::new();
    if !title.is_empty() {
        shapes.push(text_shape("title", &[title]));
    }
    shapes.push(text_shape("body", bullets));
    Slide {
        number,
        part: format!("ppt/slides/slide{}.xml", number),
        hidden: false,
        shapes,
        notes: Extracted::Unsupported("no notes part".to_string()),
        issues: Vec::new(),
    }
}

pub(crate) fn deck(filename: &str, slides: Vec<Slide>) -> Deck {
    Deck {
        filename: filename.to_string(),
        slides,
    }
}

pub(crate) fn markdown(root: &str, key_by: KeyBy, files: &[(&str, &str)]) -> MarkdownDir {
    let docs = files
        .iter()
        .map(|(name, content)| MarkdownDoc::from_content(*name, *content))
        .collect();
    MarkdownDir::from_docs(root, docs, key_by)
}
