//! Error types for document extraction, comparison and reporting.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting, comparing or reporting.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read an input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// Failed to parse the PDF file structure.
    #[error("PDF parsing error: {0}")]
    PdfParseError(String),

    /// The PDF is encrypted and cannot be read without a password.
    #[error("PDF is encrypted: {0}")]
    EncryptedPdf(String),

    /// Failed to read a Markdown source.
    #[error("Markdown error: {0}")]
    MarkdownError(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The report could not be written. Always fatal.
    #[error("Failed to write report '{path}': {reason}")]
    ReportWrite { path: String, reason: String },
}

impl Error {
    /// Build a report write error for the given path.
    pub fn report_write(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Error::ReportWrite {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
