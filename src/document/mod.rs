//! Unified document abstraction
//!
//! Format-agnostic interfaces for turning a source document into ordered
//! text blocks and rebuilding it with translations.
//!
//! # Lifecycle
//!
//! ```text
//! opened ─▶ blocks-extracted ─▶ blocks-translated ─▶ rebuilt ─▶ saved
//!   │              │                                    │
//!   open()   extract_blocks()                      rebuild()
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use bitext_server::document::{
//!     integrity, open_document, GenerateMode, OutputFormat, RebuildOptions, TranslatedBlock,
//! };
//!
//! fn bilingual(bytes: Vec<u8>) -> bitext_server::document::Result<bool> {
//!     let doc = open_document(bytes)?;
//!     let options = RebuildOptions {
//!         mode: GenerateMode::Bilingual,
//!         output_format: OutputFormat::from(doc.format()),
//!         target_language: "fr".to_string(),
//!         title: "Example".to_string(),
//!     };
//!     let translated: Vec<TranslatedBlock> = doc
//!         .extract_blocks()?
//!         .into_iter()
//!         .map(|block| {
//!             let translation = format!("[fr] {}", block.text); // translate each block
//!             TranslatedBlock::new(block, Some(translation))
//!         })
//!         .collect();
//!     let output = doc.rebuild(&translated, &options)?;
//!     let report = integrity::check(
//!         &output.bytes,
//!         options.output_format,
//!         &translated,
//!         options.mode,
//!         integrity::DEFAULT_THRESHOLD,
//!     )?;
//!     Ok(report.passed)
//! }
//! ```

mod error;
pub mod integrity;
mod traits;
mod types;

pub use error::{DocumentError, DocumentResult, Result};
pub use integrity::IntegrityReport;
pub use traits::TranslatableDocument;
pub use types::{
    BlockLocator, DocumentFormat, GenerateMode, OutputFormat, RebuildOptions, RebuildOutput,
    TextBlock, TranslatedBlock,
};

use crate::formats::{epub::EpubDocument, pdf::PdfDocument};

/// Open a document, detecting its format from magic bytes
pub fn open_document(bytes: Vec<u8>) -> Result<Box<dyn TranslatableDocument>> {
    match DocumentFormat::from_magic_bytes(&bytes) {
        Some(DocumentFormat::Pdf) => Ok(Box::new(PdfDocument::from_bytes(bytes)?)),
        Some(DocumentFormat::Epub) => Ok(Box::new(EpubDocument::from_bytes(bytes)?)),
        None => Err(DocumentError::UnsupportedFormat(
            "expected a PDF or EPUB document".to_string(),
        )),
    }
}
