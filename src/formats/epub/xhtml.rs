//! XHTML block walking
//!
//! Extraction and rebuild replay the same quick-xml event stream, so the
//! n-th translatable block seen during extraction is the n-th one seen
//! during rebuild. A block is an outermost block-level element whose text
//! contains at least one letter.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::cache::normalize_text;
use crate::document::{DocumentError, GenerateMode, Result};
use crate::translate::needs_translation;

/// Class carried by inserted translation elements
pub const TRANSLATION_CLASS: &str = "bitext-translation";

const BLOCK_TAGS: &[&[u8]] = &[
    b"p",
    b"h1",
    b"h2",
    b"h3",
    b"h4",
    b"h5",
    b"h6",
    b"li",
    b"blockquote",
    b"dt",
    b"dd",
    b"td",
    b"th",
    b"caption",
    b"figcaption",
];

const TRANSLATION_STYLE: &str = ".bitext-translation { color: #4a4a4a; font-style: italic; }";

fn is_block(start: &BytesStart) -> bool {
    let name = start.local_name();
    let lower = name.as_ref().to_ascii_lowercase();
    BLOCK_TAGS.contains(&lower.as_slice())
}

fn reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);
    reader
}

/// Decoded text of a text node; unknown entities (`&nbsp;`) go through the
/// HTML entity table instead of failing.
fn node_text(text: &BytesText) -> String {
    match text.unescape() {
        Ok(value) => value.into_owned(),
        Err(_) => {
            let raw = String::from_utf8_lossy(text);
            html_escape::decode_html_entities(&raw).into_owned()
        }
    }
}

/// Accumulates the text of the block currently being walked
#[derive(Default)]
struct BlockText {
    depth: usize,
    text: String,
}

impl BlockText {
    fn active(&self) -> bool {
        self.depth > 0
    }

    fn begin(&mut self) {
        self.depth = 1;
        self.text.clear();
    }

    /// Feed an event inside the block; returns the finished text on close
    fn feed(&mut self, event: &Event) -> Option<String> {
        match event {
            Event::Start(_) => self.depth += 1,
            Event::Empty(_) => self.text.push(' '),
            Event::Text(t) => self.text.push_str(&node_text(t)),
            Event::CData(c) => self.text.push_str(&String::from_utf8_lossy(c)),
            Event::End(_) => {
                self.depth -= 1;
                if self.depth == 0 {
                    return Some(normalize_text(&self.text));
                }
            }
            _ => {}
        }
        None
    }
}

/// Texts of the translatable blocks of one XHTML document, in order
pub fn extract_blocks(xml: &str) -> Result<Vec<String>> {
    let mut reader = reader(xml);
    let mut current = BlockText::default();
    let mut blocks = Vec::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Start(e) if !current.active() && is_block(e) => current.begin(),
            _ if current.active() => {
                if let Some(text) = current.feed(&event) {
                    if needs_translation(&text) {
                        blocks.push(text);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(blocks)
}

/// Replay an XHTML document, writing translations by block ordinal
pub fn rebuild_entry(xml: &str, translations: &HashMap<usize, &str>, mode: GenerateMode) -> Result<String> {
    let mut reader = reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut current = BlockText::default();
    let mut pending: Vec<Event<'static>> = Vec::new();
    let mut block_start: Option<BytesStart<'static>> = None;
    let mut ordinal = 0usize;

    loop {
        let event = reader.read_event()?;
        if matches!(event, Event::Eof) {
            break;
        }

        if !current.active() {
            let starts_block = matches!(&event, Event::Start(e) if is_block(e));
            if starts_block {
                let owned = event.into_owned();
                if let Event::Start(e) = &owned {
                    block_start = Some(e.clone());
                }
                pending.push(owned);
                current.begin();
                continue;
            }

            let closes_head = matches!(&event, Event::End(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"head"));
            if closes_head && mode == GenerateMode::Bilingual {
                write_style(&mut writer)?;
            }
            writer.write_event(event)?;
            continue;
        }

        let finished = current.feed(&event);
        pending.push(event.into_owned());

        let Some(text) = finished else {
            continue;
        };

        let translation = if needs_translation(&text) {
            let found = translations.get(&ordinal).copied();
            ordinal += 1;
            found
        } else {
            None
        };

        match (translation, block_start.take()) {
            (Some(translation), Some(start)) => {
                if mode == GenerateMode::Bilingual {
                    for e in pending.drain(..) {
                        writer.write_event(e)?;
                    }
                    write_translation_sibling(&mut writer, &start, translation)?;
                } else {
                    pending.clear();
                    writer.write_event(Event::Start(start.clone()))?;
                    writer.write_event(Event::Text(BytesText::new(translation)))?;
                    writer.write_event(Event::End(end_of(&start)))?;
                }
            }
            _ => {
                for e in pending.drain(..) {
                    writer.write_event(e)?;
                }
            }
        }
    }

    // Unterminated block at end of input is copied as-is
    for e in pending.drain(..) {
        writer.write_event(e)?;
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DocumentError::InvalidContent(format!("Rebuilt XHTML is not UTF-8: {}", e)))
}

fn end_of(start: &BytesStart) -> BytesEnd<'static> {
    BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned())
}

/// Copy of the source element (minus `id`) holding the translation
fn write_translation_sibling<W: std::io::Write>(
    writer: &mut Writer<W>,
    source: &BytesStart,
    translation: &str,
) -> Result<()> {
    let name = String::from_utf8_lossy(source.name().as_ref()).into_owned();
    let mut element = BytesStart::new(name);
    let mut has_class = false;

    for attr in source.attributes().with_checks(false).flatten() {
        match attr.key.as_ref() {
            b"id" => continue,
            b"class" => {
                has_class = true;
                let existing = attr
                    .unescape_value()
                    .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attr.value).into_owned()));
                let merged = format!("{} {}", existing.trim(), TRANSLATION_CLASS);
                element.push_attribute(("class", merged.trim()));
            }
            _ => element.push_attribute(attr),
        }
    }
    if !has_class {
        element.push_attribute(("class", TRANSLATION_CLASS));
    }

    writer.write_event(Event::Start(element))?;
    writer.write_event(Event::Text(BytesText::new(translation)))?;
    writer.write_event(Event::End(end_of(source)))?;
    Ok(())
}

fn write_style<W: std::io::Write>(writer: &mut Writer<W>) -> Result<()> {
    let mut style = BytesStart::new("style");
    style.push_attribute(("type", "text/css"));
    writer.write_event(Event::Start(style))?;
    writer.write_event(Event::Text(BytesText::new(TRANSLATION_STYLE)))?;
    writer.write_event(Event::End(BytesEnd::new("style")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>One</title></head>
<body>
<h1 id="t">Chapter One</h1>
<p class="first">It was a <em>bright</em> cold day.</p>
<p>1984</p>
<ul><li>First&nbsp;item</li><li><p>Nested paragraph</p></li></ul>
<p/>
</body></html>"#;

    fn translations(pairs: &[(usize, &'static str)]) -> HashMap<usize, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_extract_outermost_letter_blocks() {
        let blocks = extract_blocks(CHAPTER).unwrap();
        assert_eq!(
            blocks,
            vec![
                "Chapter One",
                "It was a bright cold day.",
                "First item",
                "Nested paragraph",
            ]
        );
    }

    #[test]
    fn test_bilingual_inserts_sibling() {
        let out = rebuild_entry(
            CHAPTER,
            &translations(&[(0, "Chapitre un"), (1, "Il faisait froid & clair.")]),
            GenerateMode::Bilingual,
        )
        .unwrap();

        assert!(out.contains(r#"<h1 id="t">Chapter One</h1><h1 class="bitext-translation">Chapitre un</h1>"#));
        assert!(out.contains("<em>bright</em>"));
        assert!(out.contains(r#"<p class="first bitext-translation">Il faisait froid &amp; clair.</p>"#));
        assert!(out.contains("<style type=\"text/css\">"));
        assert!(out.contains("First&nbsp;item"));

        let reextracted = extract_blocks(&out).unwrap();
        assert_eq!(reextracted.len(), 6);
    }

    #[test]
    fn test_monolingual_replaces_content() {
        let out = rebuild_entry(
            CHAPTER,
            &translations(&[(1, "Il faisait froid."), (3, "Paragraphe")]),
            GenerateMode::Monolingual,
        )
        .unwrap();

        assert!(out.contains(r#"<p class="first">Il faisait froid.</p>"#));
        assert!(!out.contains("bright"));
        assert!(out.contains("<li>Paragraphe</li>"));
        assert!(out.contains("<h1 id=\"t\">Chapter One</h1>"));
        assert!(!out.contains("<style"));
    }

    #[test]
    fn test_untranslated_entry_round_trips() {
        let out = rebuild_entry(CHAPTER, &HashMap::new(), GenerateMode::Monolingual).unwrap();
        assert_eq!(out, CHAPTER);
    }
}
