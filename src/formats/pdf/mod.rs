//! PDF format implementation
//!
//! # Architecture
//!
//! - [`PdfDocument`]: content-stream text extraction, implements
//!   `TranslatableDocument`
//! - `renderer`: operator-level regeneration of pages carrying translations
//! - `layout`: text-only document used when regeneration fails
//! - `fonts`/`decode`: encoding text for output and decoding it on input
//!
//! All object access goes through `lopdf`.

mod decode;
mod fonts;
mod layout;
mod objects;
mod parser;
mod renderer;

pub use layout::render_text_document;
pub use parser::PdfDocument;
