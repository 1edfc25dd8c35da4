//! Text-only PDF layout
//!
//! Builds a fresh document of A4 pages holding the block text, used when
//! page regeneration is impossible and for PDF output from EPUB sources.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{DocumentResult, GenerateMode, RebuildOptions, TranslatedBlock};

use super::fonts::{is_wide, FontRef, FontSet, PdfFont};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT: f32 = 15.0;
const PARAGRAPH_GAP: f32 = 8.0;

/// Paragraphs to lay out, in reading order
fn paragraphs(blocks: &[TranslatedBlock], mode: GenerateMode) -> Vec<&str> {
    let mut out = Vec::with_capacity(blocks.len() * 2);
    for item in blocks {
        match (mode, item.translation.as_deref()) {
            (GenerateMode::Bilingual, Some(translation)) => {
                out.push(item.block.text.as_str());
                out.push(translation);
            }
            _ => out.push(item.output_text()),
        }
    }
    out
}

/// Greedy line breaking: at spaces for Latin text, anywhere before a wide char
pub(super) fn wrap(text: &str, font: PdfFont, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for source_line in text.lines() {
        let mut line = String::new();
        let mut width = 0.0;
        let mut last_space: Option<usize> = None;

        for ch in source_line.chars() {
            let advance = font.char_width(ch) * size;

            if width + advance > max_width && !line.is_empty() {
                if ch == ' ' {
                    lines.push(line.trim_end().to_string());
                    line.clear();
                    width = 0.0;
                    last_space = None;
                    continue;
                }

                match last_space.filter(|_| !is_wide(ch)) {
                    Some(pos) => {
                        let rest = line.split_off(pos + 1);
                        lines.push(line.trim_end().to_string());
                        width = rest.chars().map(|c| font.char_width(c) * size).sum();
                        line = rest;
                    }
                    None => {
                        lines.push(std::mem::take(&mut line));
                        width = 0.0;
                    }
                }
                last_space = None;
            }

            if ch == ' ' {
                last_space = Some(line.len());
            }
            line.push(ch);
            width += advance;
        }

        if !line.trim().is_empty() {
            lines.push(line.trim_end().to_string());
        }
    }

    lines
}

fn text_line(font: &FontRef, text: &str, y: f32) -> [Operation; 5] {
    [
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.name.clone()), Object::Real(FONT_SIZE)]),
        Operation::new("Td", vec![Object::Real(MARGIN), Object::Real(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(font.font.encode(text), StringFormat::Hexadecimal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Lay out translated blocks as a new PDF
pub fn render_text_document(
    blocks: &[TranslatedBlock],
    options: &RebuildOptions,
) -> DocumentResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let fonts = FontSet::for_language(&options.target_language).register(&mut doc);

    let mut font_dict = Dictionary::new();
    for (name, id) in fonts.resource_entries() {
        font_dict.set(name, Object::Reference(id));
    }
    let resources_id = doc.add_object(dictionary! { "Font" => font_dict });

    let top = PAGE_HEIGHT - MARGIN;
    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut current = Vec::new();
    let mut y = top;

    for paragraph in paragraphs(blocks, options.mode) {
        let font = fonts.select(paragraph);
        for line in wrap(paragraph, font.font, FONT_SIZE, PAGE_WIDTH - 2.0 * MARGIN) {
            if y < MARGIN {
                pages.push(std::mem::take(&mut current));
                y = top;
            }
            current.extend(text_line(font, &line, y));
            y -= LINE_HEIGHT;
        }
        y -= PARAGRAPH_GAP;
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }

    let page_count = pages.len();
    let kids: Vec<Object> = pages
        .into_iter()
        .map(|operations| add_page(&mut doc, pages_id, operations))
        .collect::<DocumentResult<Vec<ObjectId>>>()?
        .into_iter()
        .map(Object::Reference)
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(PAGE_WIDTH), Object::Real(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if !options.title.is_empty() {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(utf16_text(&options.title), StringFormat::Hexadecimal),
            "Producer" => Object::string_literal("bitext-server"),
        });
        doc.trailer.set("Info", info_id);
    }

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn add_page(doc: &mut Document, parent: ObjectId, operations: Vec<Operation>) -> DocumentResult<ObjectId> {
    let content = Content { operations }.encode()?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    }))
}

/// PDF text string in UTF-16BE with BOM
fn utf16_text(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}
