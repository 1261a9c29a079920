//! PPTX (Office Open XML) extractor for document consistency checks.
//!
//! Parses .pptx files which are ZIP archives containing XML documents:
//! slide order, shapes, formatting runs, tables, pictures and notes.

pub mod parser;
pub mod render;
pub mod shapes;

pub use parser::{Deck, PptxParser, Slide};
pub use render::{DeckRenderer, RenderStyle};
pub use shapes::{Shape, ShapeContent};
