//! Core document types
//!
//! Format-agnostic types shared by extraction and rebuild.

use serde::{Deserialize, Serialize};

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Epub,
}

impl DocumentFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PDF magic: %PDF
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        // EPUB: ZIP whose first entry is the `mimetype` file naming epub.
        // Plain ZIPs (.docx, .jar, ...) are rejected.
        if bytes.starts_with(b"PK\x03\x04") && bytes.len() > 30 {
            let head = &bytes[..bytes.len().min(100)];
            if head.windows(4).any(|w| w == b"epub") {
                return Some(Self::Epub);
            }
        }

        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
        }
    }
}

/// Where a block lives in its source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BlockLocator {
    /// Outermost block element inside an XHTML archive entry
    Epub {
        /// Archive path of the XHTML document
        entry: String,
        /// Position among the entry's translatable block elements
        ordinal: usize,
    },
    /// One text object (`BT` .. `ET`) of a page content stream
    Pdf {
        /// 1-based page number
        page: u32,
        /// Operator index of the `BT`
        bt_index: usize,
        /// Operator indices of the text-showing operators inside the object
        show_indices: Vec<usize>,
        /// Font size set by the last `Tf` before the first show
        font_size: f32,
        /// Approximate start position in text space
        x: f32,
        y: f32,
    },
}

/// One independently translatable unit of source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Position in extraction order
    pub index: usize,
    pub text: String,
    pub locator: BlockLocator,
}

/// A block and its translation; `None` keeps the original text
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedBlock {
    pub block: TextBlock,
    pub translation: Option<String>,
}

impl TranslatedBlock {
    pub fn new(block: TextBlock, translation: Option<String>) -> Self {
        Self { block, translation }
    }

    /// Text shown in monolingual output
    pub fn output_text(&self) -> &str {
        self.translation.as_deref().unwrap_or(&self.block.text)
    }
}

/// Original + translation, or translation only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    #[default]
    Bilingual,
    Monolingual,
}

impl GenerateMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "bilingual" | "dual" => Some(Self::Bilingual),
            "monolingual" | "mono" | "translation" => Some(Self::Monolingual),
            _ => None,
        }
    }
}

/// Output serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Epub,
    Html,
    Txt,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "txt" | "text" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Pick the output format from a requested extension or file name.
    ///
    /// Empty requests follow the source format. Unrecognized extensions
    /// fall back to PDF and return a warning describing the substitution.
    pub fn resolve(requested: Option<&str>, source: DocumentFormat) -> (Self, Option<String>) {
        let requested = requested.map(str::trim).unwrap_or_default();
        if requested.is_empty() {
            return (Self::from(source), None);
        }

        let ext = requested.rsplit('.').next().unwrap_or(requested);
        match Self::from_extension(ext) {
            Some(format) => (format, None),
            None => (
                Self::Pdf,
                Some(format!(
                    "Unrecognized output format '{}', producing PDF instead",
                    requested
                )),
            ),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Html => "html",
            Self::Txt => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Epub => "application/epub+zip",
            Self::Html => "text/html; charset=utf-8",
            Self::Txt => "text/plain; charset=utf-8",
        }
    }
}

impl From<DocumentFormat> for OutputFormat {
    fn from(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Pdf => Self::Pdf,
            DocumentFormat::Epub => Self::Epub,
        }
    }
}

/// Settings for one rebuild
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    pub mode: GenerateMode,
    pub output_format: OutputFormat,
    pub target_language: String,
    /// Title for outputs that carry one (HTML, laid-out PDF)
    pub title: String,
}

/// Rebuilt document bytes plus what went wrong along the way
#[derive(Debug, Clone, Default)]
pub struct RebuildOutput {
    pub bytes: Vec<u8>,
    /// Produced by the text-only fallback
    pub degraded: bool,
    pub warnings: Vec<String>,
}
