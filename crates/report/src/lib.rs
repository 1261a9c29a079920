//! Renderers for check reports: a self-contained HTML page and an Excel
//! workbook.

pub mod html;
pub mod xlsx;

pub use html::{escape_html, similarity_class, write_html, HtmlRenderer};
pub use xlsx::XlsxWriter;
