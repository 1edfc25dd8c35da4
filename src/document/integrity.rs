//! Post-generation integrity check
//!
//! Re-opens a rebuilt document, extracts its text again and measures how
//! many of the expected fragments survived. Whitespace is ignored on both
//! sides since layout may re-flow it.

use serde::{Deserialize, Serialize};

use crate::formats::epub::EpubDocument;
use crate::formats::markup;
use crate::formats::pdf::PdfDocument;

use super::{DocumentResult, GenerateMode, OutputFormat, TranslatableDocument, TranslatedBlock};

/// Default fraction of fragments that must be recoverable
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Outcome of an integrity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Fragments that should appear in the output
    pub expected: usize,
    /// Fragments found
    pub recovered: usize,
    pub ratio: f64,
    pub threshold: f64,
    pub passed: bool,
}

impl IntegrityReport {
    fn new(expected: usize, recovered: usize, threshold: f64) -> Self {
        let ratio = if expected == 0 {
            1.0
        } else {
            recovered as f64 / expected as f64
        };
        Self {
            expected,
            recovered,
            ratio,
            threshold,
            passed: ratio >= threshold,
        }
    }
}

/// Text of a rebuilt output, by format
pub fn output_text(output: &[u8], format: OutputFormat) -> DocumentResult<String> {
    Ok(match format {
        OutputFormat::Pdf => PdfDocument::from_bytes(output.to_vec())?.extract_text()?,
        OutputFormat::Epub => EpubDocument::from_bytes(output.to_vec())?
            .extract_blocks()?
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Html => markup::html_text(&String::from_utf8_lossy(output)),
        OutputFormat::Txt => String::from_utf8_lossy(output).into_owned(),
    })
}

fn squash(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Translations, plus their originals in bilingual mode
fn expected_fragments(blocks: &[TranslatedBlock], mode: GenerateMode) -> Vec<String> {
    let mut fragments = Vec::new();
    for item in blocks {
        let Some(translation) = item.translation.as_deref() else {
            continue;
        };
        fragments.push(squash(translation));
        if mode == GenerateMode::Bilingual {
            fragments.push(squash(&item.block.text));
        }
    }
    fragments.retain(|f| !f.is_empty());
    fragments
}

/// Check that the translated text is recoverable from `output`
pub fn check(
    output: &[u8],
    format: OutputFormat,
    blocks: &[TranslatedBlock],
    mode: GenerateMode,
    threshold: f64,
) -> DocumentResult<IntegrityReport> {
    let fragments = expected_fragments(blocks, mode);
    if fragments.is_empty() {
        return Ok(IntegrityReport::new(0, 0, threshold));
    }

    let haystack = squash(&output_text(output, format)?);
    let recovered = fragments.iter().filter(|f| haystack.contains(f.as_str())).count();

    let report = IntegrityReport::new(fragments.len(), recovered, threshold);
    tracing::debug!(
        expected = report.expected,
        recovered = report.recovered,
        passed = report.passed,
        "Integrity check"
    );
    Ok(report)
}
