//! PDF text extraction
//!
//! Walks each page's content stream with lopdf, tracking the text state
//! (`Tf`, `q`/`Q`) and producing one run per text object (`BT` .. `ET`).

use std::collections::HashMap;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};

use crate::cache::normalize_text;
use crate::document::{
    BlockLocator, DocumentError, DocumentFormat, DocumentResult, OutputFormat, RebuildOptions,
    RebuildOutput, TextBlock, TranslatableDocument, TranslatedBlock,
};
use crate::formats::markup;
use crate::translate::needs_translation;

use super::decode::{page_fonts, FontDecoder};
use super::objects::page_operations;
use super::{layout, renderer};

/// `TJ` adjustments below this (thousandths of an em) read as a word gap
const TJ_SPACE_THRESHOLD: f32 = -250.0;

/// An opened PDF
pub struct PdfDocument {
    doc: Document,
}

impl PdfDocument {
    /// Load a PDF from bytes
    pub fn from_bytes(bytes: Vec<u8>) -> DocumentResult<Self> {
        let doc = Document::load_mem(&bytes)?;
        if doc.get_pages().is_empty() {
            return Err(DocumentError::InvalidContent("PDF has no pages".to_string()));
        }
        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// All extracted text, one block per line
    pub fn extract_text(&self) -> DocumentResult<String> {
        Ok(self
            .extract_blocks()?
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl TranslatableDocument for PdfDocument {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract_blocks(&self) -> DocumentResult<Vec<TextBlock>> {
        let mut blocks = Vec::new();

        for (page, page_id) in self.doc.get_pages() {
            let runs = match extract_page(&self.doc, page_id) {
                Ok(runs) => runs,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Skipping unreadable page");
                    continue;
                }
            };

            for run in runs {
                blocks.push(TextBlock {
                    index: blocks.len(),
                    text: run.text,
                    locator: BlockLocator::Pdf {
                        page,
                        bt_index: run.bt_index,
                        show_indices: run.show_indices,
                        font_size: run.font_size,
                        x: run.x,
                        y: run.y,
                    },
                });
            }
        }

        Ok(blocks)
    }

    fn rebuild(
        &self,
        blocks: &[TranslatedBlock],
        options: &RebuildOptions,
    ) -> DocumentResult<RebuildOutput> {
        match options.output_format {
            OutputFormat::Pdf => match renderer::regenerate(&self.doc, blocks, options) {
                Ok(output) => Ok(output),
                Err(e) => {
                    tracing::warn!(error = %e, "Page regeneration failed, rebuilding as text pages");
                    Ok(RebuildOutput {
                        bytes: layout::render_text_document(blocks, options)?,
                        degraded: true,
                        warnings: vec![format!(
                            "Page regeneration failed ({}); output was rebuilt as text-only pages without the original graphics",
                            e
                        )],
                    })
                }
            },
            OutputFormat::Html => Ok(RebuildOutput {
                bytes: markup::render_html(blocks, options).into_bytes(),
                ..Default::default()
            }),
            OutputFormat::Txt => Ok(RebuildOutput {
                bytes: markup::render_text(blocks, options.mode).into_bytes(),
                ..Default::default()
            }),
            OutputFormat::Epub => Err(DocumentError::UnsupportedConversion {
                source_format: "pdf",
                target: "epub",
            }),
        }
    }
}

// ============================================================================
// Content stream walk
// ============================================================================

/// One text object with letter-bearing text
#[derive(Debug, Clone, PartialEq)]
pub(super) struct TextRun {
    pub bt_index: usize,
    pub show_indices: Vec<usize>,
    pub font_size: f32,
    /// Start of the first line
    pub x: f32,
    pub y: f32,
    /// Lowest baseline that showed text
    pub bottom_y: f32,
    /// Line matrix origin at `ET`
    pub end_x: f32,
    pub end_y: f32,
    pub text: String,
}

/// Font selection, saved and restored by `q`/`Q`
#[derive(Debug, Clone, Default)]
pub(super) struct TextState {
    pub font: Option<Vec<u8>>,
    pub size: f32,
}

impl TextState {
    /// Apply a state-changing operator; returns true when it was one
    pub fn apply(&mut self, op: &Operation, stack: &mut Vec<TextState>) -> bool {
        match op.operator.as_str() {
            "q" => stack.push(self.clone()),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    *self = saved;
                }
            }
            "Tf" => {
                if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                    self.font = Some(name.to_vec());
                }
                if let Some(size) = op.operands.get(1).and_then(|o| o.as_float().ok()) {
                    self.size = size;
                }
            }
            _ => return false,
        }
        true
    }
}

#[derive(Default)]
struct RunBuilder {
    bt_index: usize,
    show_indices: Vec<usize>,
    text: String,
    font_size: f32,
    line_x: f32,
    line_y: f32,
    x: f32,
    y: f32,
    bottom_y: f32,
    line_break: bool,
}

impl RunBuilder {
    fn push_text(&mut self, index: usize, text: &str, state: &TextState) {
        if self.show_indices.is_empty() {
            self.font_size = state.size;
            self.x = self.line_x;
            self.y = self.line_y;
            self.bottom_y = self.line_y;
        }
        self.bottom_y = self.bottom_y.min(self.line_y);
        self.show_indices.push(index);
        if self.line_break && !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
        self.line_break = false;
        self.text.push_str(text);
    }

    fn finish(self) -> Option<TextRun> {
        let text = normalize_text(&self.text);
        needs_translation(&text).then_some(TextRun {
            bt_index: self.bt_index,
            show_indices: self.show_indices,
            font_size: self.font_size,
            x: self.x,
            y: self.y,
            bottom_y: self.bottom_y,
            end_x: self.line_x,
            end_y: self.line_y,
            text,
        })
    }
}

fn operand_f32(op: &Operation, index: usize) -> f32 {
    op.operands
        .get(index)
        .and_then(|o| o.as_float().ok())
        .unwrap_or(0.0)
}

fn decode_string(object: &Object, decoder: Option<&FontDecoder<'_>>) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(match decoder {
            Some(decoder) => decoder.decode(bytes),
            None => FontDecoder::win_ansi().decode(bytes),
        }),
        _ => None,
    }
}

/// Text runs of one page
pub(super) fn extract_page(doc: &Document, page_id: ObjectId) -> DocumentResult<Vec<TextRun>> {
    let (operations, complete) = page_operations(doc, page_id)?;
    if !complete {
        tracing::warn!(?page_id, "Content stream only partially parsed, later text is skipped");
    }
    Ok(text_runs(&operations, &page_fonts(doc, page_id)))
}

pub(super) fn text_runs(operations: &[Operation], fonts: &HashMap<Vec<u8>, FontDecoder<'_>>) -> Vec<TextRun> {
    let mut state = TextState::default();
    let mut stack = Vec::new();
    let mut current: Option<RunBuilder> = None;
    let mut runs = Vec::new();

    for (index, op) in operations.iter().enumerate() {
        if state.apply(op, &mut stack) {
            continue;
        }
        let decoder = state.font.as_ref().and_then(|name| fonts.get(name));

        match op.operator.as_str() {
            "BT" => {
                current = Some(RunBuilder {
                    bt_index: index,
                    ..Default::default()
                });
            }
            "ET" => {
                if let Some(run) = current.take().and_then(RunBuilder::finish) {
                    runs.push(run);
                }
            }
            _ => {}
        }

        let Some(run) = current.as_mut() else {
            continue;
        };

        match op.operator.as_str() {
            "Td" | "TD" => {
                run.line_x += operand_f32(op, 0);
                run.line_y += operand_f32(op, 1);
                run.line_break = true;
            }
            "Tm" => {
                run.line_x = operand_f32(op, 4);
                run.line_y = operand_f32(op, 5);
                run.line_break = true;
            }
            "T*" => run.line_break = true,
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    run.line_break = true;
                }
                let position = if op.operator == "\"" { 2 } else { 0 };
                if let Some(text) = op.operands.get(position).and_then(|o| decode_string(o, decoder)) {
                    run.push_text(index, &text, &state);
                }
            }
            "TJ" => {
                let Some(items) = op.operands.first().and_then(|o| o.as_array().ok()) else {
                    continue;
                };
                let mut text = String::new();
                for item in items {
                    match item {
                        Object::String(..) => text.extend(decode_string(item, decoder)),
                        other => {
                            let gap = other.as_float().unwrap_or(0.0);
                            if gap < TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                                text.push(' ');
                            }
                        }
                    }
                }
                run.push_text(index, &text, &state);
            }
            _ => {}
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GenerateMode;
    use crate::formats::fixtures::{sample_pdf, sample_pdf_with_content, MALFORMED_CONTENT};

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    #[test]
    fn test_one_run_per_text_object() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("Hello")]),
            op("Td", vec![0.into(), (-14).into()]),
            op("Tj", vec![Object::string_literal("world")]),
            op("ET", vec![]),
            op("BT", vec![]),
            op("Tj", vec![Object::string_literal("42")]),
            op("ET", vec![]),
        ];

        let runs = text_runs(&ops, &HashMap::new());

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Hello world");
        assert_eq!(runs[0].bt_index, 0);
        assert_eq!(runs[0].show_indices, vec![3, 5]);
        assert_eq!(runs[0].font_size, 12.0);
        assert_eq!((runs[0].x, runs[0].y), (72.0, 700.0));
        assert_eq!(runs[0].bottom_y, 686.0);
        assert_eq!((runs[0].end_x, runs[0].end_y), (72.0, 686.0));
    }

    #[test]
    fn test_tj_array_gaps() {
        let ops = vec![
            op("BT", vec![]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Kern"),
                    (-40).into(),
                    Object::string_literal("ing"),
                    (-600).into(),
                    Object::string_literal("works"),
                ])],
            ),
            op("ET", vec![]),
        ];

        assert_eq!(text_runs(&ops, &HashMap::new())[0].text, "Kerning works");
    }

    #[test]
    fn test_font_restored_by_q() {
        let ops = vec![
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("q", vec![]),
            op("Tf", vec![Object::Name(b"F2".to_vec()), 20.into()]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tj", vec![Object::string_literal("Size")]),
            op("ET", vec![]),
        ];

        assert_eq!(text_runs(&ops, &HashMap::new())[0].font_size, 10.0);
    }

    #[test]
    fn test_extract_blocks_from_pdf() {
        let doc = PdfDocument::from_bytes(sample_pdf(&[&["First line", "Second line"], &["Page two"]])).unwrap();

        let blocks = doc.extract_blocks().unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].text, "Page two");
        assert!(matches!(blocks[2].locator, BlockLocator::Pdf { page: 2, .. }));
    }

    #[test]
    fn test_partially_parsed_page_rebuilds_as_text_layout() {
        let doc = PdfDocument::from_bytes(sample_pdf_with_content(MALFORMED_CONTENT)).unwrap();
        let blocks: Vec<TranslatedBlock> = doc
            .extract_blocks()
            .unwrap()
            .into_iter()
            .map(|b| {
                let translation = format!("[de] {}", b.text);
                TranslatedBlock::new(b, Some(translation))
            })
            .collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block.text, "Hello world");

        let options = RebuildOptions {
            mode: GenerateMode::Bilingual,
            output_format: OutputFormat::Pdf,
            target_language: "de".to_string(),
            title: "malformed".to_string(),
        };
        let output = doc.rebuild(&blocks, &options).unwrap();

        assert!(output.degraded);
        assert!(output.warnings[0].contains("text-only pages"));
        let text = PdfDocument::from_bytes(output.bytes).unwrap().extract_text().unwrap();
        assert!(text.contains("[de] Hello world"));
    }

    #[test]
    fn test_not_a_pdf() {
        assert!(PdfDocument::from_bytes(b"%PDF-1.4 garbage".to_vec()).is_err());
    }
}
