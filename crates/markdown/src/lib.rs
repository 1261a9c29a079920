//! Markdown directory extractor for document consistency checks.
//!
//! Reads a flat directory of `.md` files, keys them by numeric prefix or
//! file name, strips markup for comparison and scans the side channels
//! (image references, tables, links, code, headings).

pub mod clean;
pub mod dir;
pub mod scan;

pub use clean::{strip_images, MarkdownCleaner};
pub use dir::{numeric_prefix, read_dir, KeyBy, MarkdownDir, MarkdownDoc, MarkdownOptions};
pub use scan::{
    anchor_targets, code_fragments, content_hash, find_tables, headings, image_refs, links,
    parent_topic_link, slugify, verify_table_format, CodeFragments, Heading, Link, LinkKind,
    TableBlock,
};
