//! Object graph and content stream helpers

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::document::{DocumentError, DocumentResult};

/// Longest reference chain followed before giving up
const MAX_REFERENCE_DEPTH: usize = 32;

/// Parent chain walked when looking for inherited attributes
const MAX_TREE_DEPTH: usize = 64;

/// Follow references until a direct object is reached
pub fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> DocumentResult<&'a Object> {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id)?,
            direct => return Ok(direct),
        }
    }
    Err(DocumentError::InvalidContent("Reference chain too deep".to_string()))
}

/// Dictionary behind an object, following references
pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> DocumentResult<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Ok(dict),
        Object::Stream(stream) => Ok(&stream.dict),
        other => Err(DocumentError::InvalidContent(format!(
            "Expected a dictionary, found {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(object: &Object) -> &'static str {
    match object {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        _ => "object",
    }
}

/// A page's effective `/Resources`, inherited through `/Parent` when absent
pub fn page_resources(doc: &Document, page_id: ObjectId) -> DocumentResult<Dictionary> {
    let mut node = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources).cloned();
        }
        match node.get(b"Parent") {
            Ok(parent) => node = resolve_dict(doc, parent)?,
            Err(_) => return Ok(Dictionary::new()),
        }
    }
    Err(DocumentError::InvalidContent("Page tree too deep".to_string()))
}

/// Page size used when no `/MediaBox` is found (US Letter)
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// A page's `/MediaBox` as `[x0, y0, x1, y1]`, inherited through `/Parent`
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Ok(mut node) = doc.get_dictionary(page_id) else {
        return DEFAULT_MEDIA_BOX;
    };
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(media_box) = node.get(b"MediaBox") {
            return rectangle(doc, media_box).unwrap_or(DEFAULT_MEDIA_BOX);
        }
        match node.get(b"Parent").map(|parent| resolve_dict(doc, parent)) {
            Ok(Ok(parent)) => node = parent,
            _ => break,
        }
    }
    DEFAULT_MEDIA_BOX
}

fn rectangle(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let items = resolve(doc, object).ok()?.as_array().ok()?;
    let mut rect = [0.0; 4];
    if items.len() != 4 {
        return None;
    }
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = resolve(doc, item).ok()?.as_float().ok()?;
    }
    Some([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

// ============================================================================
// Content streams
// ============================================================================

/// A page's parsed operators, and whether they cover the whole stream.
///
/// `Content::decode` stops at the first token it cannot parse and returns
/// the operators read so far, so the count is checked against a raw scan.
pub fn page_operations(doc: &Document, page_id: ObjectId) -> DocumentResult<(Vec<Operation>, bool)> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;
    let complete = content.operations.len() >= operator_count(&data);
    Ok((content.operations, complete))
}

fn is_regular(byte: u8) -> bool {
    !byte.is_ascii_whitespace() && byte != 0 && !b"()<>[]{}/%".contains(&byte)
}

fn is_operator(token: &[u8]) -> bool {
    let starts_like_operator = token
        .first()
        .map(|b| b.is_ascii_alphabetic() || b"*'\"".contains(b))
        .unwrap_or(false);
    starts_like_operator && !matches!(token, b"true" | b"false" | b"null")
}

/// Operators in a raw content stream; an inline image (`BI` .. `EI`) is one
pub fn operator_count(data: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'(' => i = skip_literal_string(data, i),
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                i = data[i..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(data.len(), |p| i + p + 1);
            }
            b'/' => {
                i += 1;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
            }
            b if is_regular(b) => {
                let start = i;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
                let token = &data[start..i];
                if token == b"ID" {
                    i = skip_inline_image_data(data, i);
                } else if is_operator(token) {
                    count += 1;
                }
            }
            _ => i += 1,
        }
    }

    count
}

/// Index just past the literal string opening at `start`
fn skip_literal_string(data: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < data.len() {
        match data[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    data.len()
}

/// Index just past the `EI` closing the image data that starts at `start`
fn skip_inline_image_data(data: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i + 2 <= data.len() {
        let delimited_before = data[i - 1].is_ascii_whitespace();
        let delimited_after = data.get(i + 2).map_or(true, |b| !is_regular(*b));
        if delimited_before && delimited_after && &data[i..i + 2] == b"EI" {
            return i + 2;
        }
        i += 1;
    }
    data.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fixtures::{sample_pdf, MALFORMED_CONTENT};

    #[test]
    fn test_operator_count_skips_operands() {
        let data = b"q 0.9 g /GS1 gs BT /F1 12 Tf [(a) -250 (b\\) c)] TJ <48ff> Tj (x (nested) y) ' ET Q % trailing comment ET";
        assert_eq!(operator_count(data), 10);
        assert_eq!(operator_count(b"true false null"), 0);
    }

    #[test]
    fn test_operator_count_inline_image() {
        let data = b"q BI /W 1 /H 1 /CS /G /BPC 8 ID \xff EI Q";
        assert_eq!(operator_count(data), 3);
    }

    #[test]
    fn test_well_formed_page_is_complete() {
        let doc = Document::load_mem(&sample_pdf(&[&["One", "Two"]])).unwrap();
        let page_id = doc.get_pages()[&1];
        let (operations, complete) = page_operations(&doc, page_id).unwrap();
        assert!(complete);
        assert_eq!(operations.len(), 15);
    }

    #[test]
    fn test_stray_delimiter_is_incomplete() {
        let content = Content::decode(MALFORMED_CONTENT).unwrap();
        assert_eq!(content.operations.len(), 5);
        assert_eq!(operator_count(MALFORMED_CONTENT), 10);
    }

    #[test]
    fn test_media_box_inherited() {
        let doc = Document::load_mem(&sample_pdf(&[&["One"]])).unwrap();
        let page_id = doc.get_pages()[&1];
        assert_eq!(page_media_box(&doc, page_id), [0.0, 0.0, 595.0, 842.0]);
    }
}
