//! Document error types
//!
//! Unified error handling for all document formats (PDF, EPUB).

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Bytes are neither a PDF nor an EPUB
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid content (encoding, structure)
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Document opened but carries no translatable text
    #[error("No translatable text found in document")]
    NoTranslatableText,

    /// Requested output cannot be produced from this source
    #[error("Cannot produce {target} output from a {source_format} document")]
    UnsupportedConversion {
        source_format: &'static str,
        target: &'static str,
    },

    /// Failed to rebuild the output document
    #[error("Rebuild error: {0}")]
    RebuildError(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result (used by format modules)
pub type DocumentResult<T> = Result<T>;

impl From<lopdf::Error> for DocumentError {
    fn from(err: lopdf::Error) -> Self {
        DocumentError::ParseError(format!("PDF: {}", err))
    }
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        DocumentError::ParseError(format!("Archive: {}", err))
    }
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        DocumentError::ParseError(format!("XML: {}", err))
    }
}

impl From<tokio::task::JoinError> for DocumentError {
    fn from(err: tokio::task::JoinError) -> Self {
        DocumentError::ThreadPoolError(err.to_string())
    }
}
