//! Format-specific document implementations
//!
//! Each format module provides a type implementing
//! [`TranslatableDocument`](crate::document::TranslatableDocument):
//! extraction of ordered text blocks and rebuild with translations.
//! `markup` holds the HTML and plain-text serializers shared by both.

pub mod epub;
pub mod markup;
pub mod pdf;

#[cfg(test)]
pub(crate) mod fixtures;
