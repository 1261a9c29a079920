//! PDF extractor: per-page text, header/footer trimming, image counts and
//! link annotations.

pub mod extract;
pub mod images;
pub mod links;

pub use extract::{trim_headers_footers, PdfExtractor};
pub use images::{CountMethod, ImageCountOptions, PageImageCount};
pub use links::{LinkTarget, PdfLink};
