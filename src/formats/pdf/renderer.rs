//! Operator-level PDF regeneration
//!
//! Every page carrying translations gets a new content stream: operators are
//! copied through unchanged except inside the text objects being rewritten.
//! Graphics, images and the original fonts stay where they were.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{
    BlockLocator, DocumentError, DocumentResult, GenerateMode, RebuildOptions, RebuildOutput,
    TranslatedBlock,
};

use super::decode::page_fonts;
use super::fonts::{FontSet, PdfFont, RegisteredFonts};
use super::layout::wrap;
use super::objects::{page_media_box, page_operations, page_resources, resolve_dict};
use super::parser::{text_runs, TextRun, TextState};

/// Line spacing relative to font size
const LEADING: f32 = 1.2;

/// Size used when the source never set one
const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Translations shrunk to fit are never drawn smaller than this
const MIN_FONT_SIZE: f32 = 4.0;

/// Right and bottom margin kept free of translated text
const PAGE_MARGIN: f32 = 36.0;

/// Narrowest column a translation is wrapped to
const MIN_LINE_WIDTH: f32 = 72.0;

/// A text object to rewrite, keyed by its `BT` index
#[derive(Debug)]
struct Rewrite<'a> {
    translation: &'a str,
    show_indices: &'a [usize],
    font_size: f32,
}

fn group_by_page(blocks: &[TranslatedBlock]) -> BTreeMap<u32, HashMap<usize, Rewrite<'_>>> {
    let mut pages: BTreeMap<u32, HashMap<usize, Rewrite<'_>>> = BTreeMap::new();
    for item in blocks {
        if let (
            BlockLocator::Pdf {
                page,
                bt_index,
                show_indices,
                font_size,
                ..
            },
            Some(translation),
        ) = (&item.block.locator, item.translation.as_deref())
        {
            pages.entry(*page).or_default().insert(
                *bt_index,
                Rewrite {
                    translation,
                    show_indices,
                    font_size: *font_size,
                },
            );
        }
    }
    pages
}

/// Rewrite the pages of `source` that carry translations.
///
/// Pages that fail are kept as they were and reported in warnings; an error
/// is returned only when no page could be rewritten.
pub(super) fn regenerate(
    source: &Document,
    blocks: &[TranslatedBlock],
    options: &RebuildOptions,
) -> DocumentResult<RebuildOutput> {
    let mut doc = source.clone();
    let grouped = group_by_page(blocks);
    let fonts = FontSet::for_language(&options.target_language).register(&mut doc);
    let pages = doc.get_pages();

    let mut warnings = Vec::new();
    let mut rewritten = 0;
    let mut last_error = None;

    for (page, rewrites) in &grouped {
        let Some(&page_id) = pages.get(page) else {
            warnings.push(format!("Page {} not found, translations dropped", page));
            continue;
        };

        match rewrite_page(&mut doc, page_id, rewrites, &fonts, options.mode) {
            Ok(()) => rewritten += 1,
            Err(e) => {
                tracing::warn!(page, error = %e, "Keeping original page");
                warnings.push(format!("Page {} kept its original text: {}", page, e));
                last_error = Some(e);
            }
        }
    }

    if rewritten == 0 {
        if let Some(e) = last_error {
            return Err(DocumentError::RebuildError(format!(
                "No page could be regenerated: {}",
                e
            )));
        }
    }

    let pruned = doc.prune_objects();
    tracing::debug!(pages = rewritten, pruned = pruned.len(), "Regenerated PDF pages");

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    Ok(RebuildOutput {
        bytes,
        degraded: false,
        warnings,
    })
}

/// Replace one page's contents. Nothing is written to the page until every
/// fallible step has succeeded.
fn rewrite_page(
    doc: &mut Document,
    page_id: ObjectId,
    rewrites: &HashMap<usize, Rewrite<'_>>,
    fonts: &RegisteredFonts,
    mode: GenerateMode,
) -> DocumentResult<()> {
    let (operations, complete) = page_operations(doc, page_id)?;
    if !complete {
        return Err(DocumentError::InvalidContent(
            "Content stream could not be parsed to the end".to_string(),
        ));
    }

    let placements = {
        let runs = text_runs(&operations, &page_fonts(doc, page_id));
        plan_page(&runs, rewrites, fonts, mode, page_media_box(doc, page_id))
    };

    let mut resources = page_resources(doc, page_id)?;
    let mut font_dict = match resources.get(b"Font") {
        Ok(fonts) => resolve_dict(doc, fonts)?.clone(),
        Err(_) => Dictionary::new(),
    };
    for (name, id) in fonts.resource_entries() {
        font_dict.set(name, Object::Reference(id));
    }
    resources.set("Font", Object::Dictionary(font_dict));

    let operations = rewrite_operations(operations, rewrites, &placements, fonts, mode);
    let encoded = Content { operations }.encode()?;
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Wrapped lines of one translation and where they go
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    lines: Vec<String>,
    size: f32,
    leading: f32,
    /// Move from the line origin at `ET` to the first translated baseline
    offset: (f32, f32),
}

/// Lay out every translation of a page.
///
/// A translation is wrapped at the page's right margin and, when its lines
/// would reach the next text object below, shrunk so that every translated
/// baseline stays above that object's first baseline. Bilingual text goes
/// below the source's lowest line, monolingual text starts on its first.
fn plan_page(
    runs: &[TextRun],
    rewrites: &HashMap<usize, Rewrite<'_>>,
    fonts: &RegisteredFonts,
    mode: GenerateMode,
    media_box: [f32; 4],
) -> HashMap<usize, Placement> {
    let right = media_box[2] - PAGE_MARGIN;
    let floor = media_box[1] + PAGE_MARGIN;
    let extra_slots = match mode {
        GenerateMode::Bilingual => 1,
        GenerateMode::Monolingual => 0,
    };

    rewrites
        .iter()
        .map(|(bt_index, rewrite)| {
            let size = effective_size(rewrite.font_size);
            let font = fonts.select(rewrite.translation).font;

            let Some(run) = runs.iter().find(|r| r.bt_index == *bt_index) else {
                let width = (right - media_box[0] - PAGE_MARGIN).max(MIN_LINE_WIDTH);
                let lines = wrap(rewrite.translation, font, size, width);
                return (
                    *bt_index,
                    Placement {
                        lines,
                        size,
                        leading: size * LEADING,
                        offset: (0.0, -size * LEADING),
                    },
                );
            };

            let top = match mode {
                GenerateMode::Bilingual => run.bottom_y,
                GenerateMode::Monolingual => run.y,
            };
            let limit = runs
                .iter()
                .filter(|other| other.bt_index != run.bt_index && other.y < top - 0.5)
                .map(|other| other.y)
                .fold(floor, f32::max);
            let gap = if top > limit { top - limit } else { f32::INFINITY };
            let max_width = (right - run.x).max(MIN_LINE_WIDTH);

            let (lines, size, leading) = fit(rewrite.translation, font, size, max_width, gap, extra_slots);
            let offset = (run.x - run.end_x, run.bottom_y - leading - run.end_y);
            (
                *bt_index,
                Placement {
                    lines,
                    size,
                    leading,
                    offset,
                },
            )
        })
        .collect()
}

/// Wrap `text`, shrinking it until its lines plus `extra_slots` fit in `gap`.
/// Returns the lines, font size and leading.
fn fit(
    text: &str,
    font: PdfFont,
    mut size: f32,
    max_width: f32,
    gap: f32,
    extra_slots: usize,
) -> (Vec<String>, f32, f32) {
    let mut lines = wrap(text, font, size, max_width);
    for _ in 0..8 {
        let slots = (lines.len() + extra_slots).max(1) as f32;
        let leading = (size * LEADING).min(gap / slots);
        let fitted = (leading / LEADING).max(MIN_FONT_SIZE);
        if fitted >= size - 0.01 {
            return (lines, size, leading);
        }
        size = fitted;
        lines = wrap(text, font, size, max_width);
    }

    // a smaller size never needs more lines, so the last wrap still fits
    let slots = (lines.len() + extra_slots).max(1) as f32;
    let leading = (size * LEADING).min(gap / slots);
    (lines, size, leading)
}

fn rewrite_operations(
    operations: Vec<Operation>,
    rewrites: &HashMap<usize, Rewrite<'_>>,
    placements: &HashMap<usize, Placement>,
    fonts: &RegisteredFonts,
    mode: GenerateMode,
) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len() + rewrites.len() * 6);
    let mut state = TextState::default();
    let mut stack = Vec::new();
    let mut active: Option<(&Rewrite<'_>, &Placement)> = None;

    for (index, op) in operations.into_iter().enumerate() {
        state.apply(&op, &mut stack);
        if op.operator == "BT" {
            active = rewrites.get(&index).zip(placements.get(&index));
        }

        let Some((rewrite, placement)) = active else {
            out.push(op);
            continue;
        };

        if mode == GenerateMode::Monolingual && rewrite.show_indices.contains(&index) {
            if rewrite.show_indices.first() == Some(&index) {
                out.extend(line_advance(&op));
                out.extend(show_lines(fonts, rewrite.translation, placement));
                // later source moves are relative to this line
                if placement.lines.len() > 1 {
                    let rewind = placement.leading * (placement.lines.len() - 1) as f32;
                    out.push(Operation::new("Td", vec![0.into(), Object::Real(rewind)]));
                }
            }
            continue;
        }

        if op.operator == "ET" {
            if mode == GenerateMode::Bilingual {
                let (dx, dy) = placement.offset;
                out.push(Operation::new("Td", vec![Object::Real(dx), Object::Real(dy)]));
                out.extend(show_lines(fonts, rewrite.translation, placement));
            }
            out.push(op);
            // text state outlives ET
            out.extend(restore_font(&state));
            active = None;
            continue;
        }

        out.push(op);
    }

    out
}

fn effective_size(size: f32) -> f32 {
    if size > 0.0 {
        size
    } else {
        DEFAULT_FONT_SIZE
    }
}

/// `Tf` then one `Tj` per line, each line one leading below the last
fn show_lines(fonts: &RegisteredFonts, text: &str, placement: &Placement) -> Vec<Operation> {
    let font = fonts.select(text);
    let mut ops = Vec::with_capacity(placement.lines.len() * 2 + 1);
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.name.clone()), Object::Real(placement.size)],
    ));
    for (i, line) in placement.lines.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("Td", vec![0.into(), Object::Real(-placement.leading)]));
        }
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(font.font.encode(line), StringFormat::Hexadecimal)],
        ));
    }
    ops
}

/// Line movement implied by `'` and `"`, which move before showing
fn line_advance(op: &Operation) -> Vec<Operation> {
    match op.operator.as_str() {
        "'" => vec![Operation::new("T*", vec![])],
        "\"" => {
            let mut ops = Vec::with_capacity(3);
            if let Some(word_spacing) = op.operands.first() {
                ops.push(Operation::new("Tw", vec![word_spacing.clone()]));
            }
            if let Some(char_spacing) = op.operands.get(1) {
                ops.push(Operation::new("Tc", vec![char_spacing.clone()]));
            }
            ops.push(Operation::new("T*", vec![]));
            ops
        }
        _ => Vec::new(),
    }
}

fn restore_font(state: &TextState) -> Option<Operation> {
    state.font.as_ref().map(|name| {
        Operation::new(
            "Tf",
            vec![Object::Name(name.clone()), Object::Real(state.size)],
        )
    })
}
