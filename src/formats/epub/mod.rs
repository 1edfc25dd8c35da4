//! EPUB format implementation
//!
//! - [`EpubDocument`]: archive + spine, implements `TranslatableDocument`
//! - `xhtml`: event-stream walker shared by extraction and rebuild
//! - `renderer`: archive re-serialization
//!
//! Archive access uses `zip`; XHTML is streamed with `quick-xml` so markup
//! outside translated blocks is written back untouched.

mod parser;
mod renderer;
mod xhtml;

pub use parser::EpubDocument;
pub use xhtml::TRANSLATION_CLASS;
