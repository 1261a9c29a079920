//! Core domain types, text normalization, similarity scoring, alignment and
//! diffing for document consistency checks.

pub mod align;
pub mod diff;
pub mod error;
pub mod normalize;
pub mod report;
pub mod similarity;
pub mod types;

pub use align::{unclaimed, AlignConfig, Aligner, Assignment, Confidence, Match, Window};
pub use diff::{DiffConfig, DiffSpan, DiffStats, DiffTag, Differ, Granularity, TextDiff};
pub use error::{Error, Result};
pub use normalize::TextNormalizer;
pub use report::{Block, DiffPane, Report, ReportTable, Section, Summary};
pub use similarity::{Metric, Similarity, TokenPattern};
pub use types::{
    Corpus, CorpusKind, Extracted, FormatRun, ImageRef, Issue, Paragraph, Severity, Table, Unit,
    UnitId, UnitMeta,
};
