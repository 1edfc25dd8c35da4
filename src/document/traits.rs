//! Document traits
//!
//! Format-agnostic interface for extraction and rebuild.

use super::error::Result;
use super::types::{DocumentFormat, RebuildOptions, RebuildOutput, TextBlock, TranslatedBlock};

/// A source document that can be split into text blocks and rebuilt
///
/// Implementations are CPU-bound and synchronous; async callers run them on
/// the blocking pool.
pub trait TranslatableDocument: Send + Sync {
    /// Source format
    fn format(&self) -> DocumentFormat;

    /// Ordered text blocks with write-back locators
    fn extract_blocks(&self) -> Result<Vec<TextBlock>>;

    /// Produce the output document from translated blocks
    fn rebuild(&self, blocks: &[TranslatedBlock], options: &RebuildOptions) -> Result<RebuildOutput>;
}
