//! EPUB container parsing and block extraction
//!
//! Locates the package document through `META-INF/container.xml`, walks the
//! spine in reading order and extracts block text from every XHTML item.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::document::{
    BlockLocator, DocumentError, DocumentFormat, DocumentResult, RebuildOptions, RebuildOutput,
    TextBlock, TranslatableDocument, TranslatedBlock,
};

use super::{renderer, xhtml};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// An opened EPUB archive
pub struct EpubDocument {
    bytes: Vec<u8>,
    /// XHTML entries in spine order
    spine: Vec<String>,
}

impl EpubDocument {
    /// Open an EPUB from bytes
    pub fn from_bytes(bytes: Vec<u8>) -> DocumentResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;

        let container = read_entry(&mut archive, CONTAINER_PATH)?;
        let opf_path = find_rootfile(&container)?;
        let opf = read_entry(&mut archive, &opf_path)?;

        let spine: Vec<String> = parse_spine(&opf, &opf_path)?
            .into_iter()
            .filter(|entry| archive.by_name(entry).is_ok())
            .collect();

        if spine.is_empty() {
            return Err(DocumentError::InvalidContent(
                "EPUB spine has no readable XHTML documents".to_string(),
            ));
        }

        tracing::debug!(opf = %opf_path, items = spine.len(), "Opened EPUB");
        Ok(Self { bytes, spine })
    }

    /// XHTML entries in reading order
    pub fn spine(&self) -> &[String] {
        &self.spine
    }

    pub(super) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl TranslatableDocument for EpubDocument {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Epub
    }

    fn extract_blocks(&self) -> DocumentResult<Vec<TextBlock>> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut blocks = Vec::new();

        for entry in &self.spine {
            let texts = match read_entry(&mut archive, entry).and_then(|xml| xhtml::extract_blocks(&xml)) {
                Ok(texts) => texts,
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Skipping unreadable EPUB item");
                    continue;
                }
            };

            for (ordinal, text) in texts.into_iter().enumerate() {
                blocks.push(TextBlock {
                    index: blocks.len(),
                    text,
                    locator: BlockLocator::Epub {
                        entry: entry.clone(),
                        ordinal,
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
        renderer::rebuild(self, blocks, options)
    }
}

// ============================================================================
// Archive helpers
// ============================================================================

pub(super) fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> DocumentResult<String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| DocumentError::InvalidContent(format!("Missing archive entry: {}", name)))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    String::from_utf8(data)
        .map_err(|_| DocumentError::InvalidContent(format!("Entry is not UTF-8: {}", name)))
}

fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Path of the package document named by `container.xml`
fn find_rootfile(container: &str) -> DocumentResult<String> {
    let mut reader = Reader::from_str(container);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Err(DocumentError::InvalidContent(
        "container.xml names no rootfile".to_string(),
    ))
}

/// Archive paths of the spine's XHTML items, in order
fn parse_spine(opf: &str, opf_path: &str) -> DocumentResult<Vec<String>> {
    let mut reader = Reader::from_str(opf);
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut itemrefs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attribute(&e, b"id"), attribute(&e, b"href")) {
                        let media_type = attribute(&e, b"media-type").unwrap_or_default();
                        manifest.insert(id, (href, media_type));
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attribute(&e, b"idref") {
                        itemrefs.push(idref);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let base = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    Ok(itemrefs
        .iter()
        .filter_map(|idref| manifest.get(idref))
        .filter(|(href, media_type)| is_xhtml(href, media_type))
        .map(|(href, _)| resolve_href(base, href))
        .collect())
}

fn is_xhtml(href: &str, media_type: &str) -> bool {
    matches!(media_type, "application/xhtml+xml" | "text/html")
        || matches!(
            mime_guess::from_path(href).first_raw(),
            Some("application/xhtml+xml") | Some("text/html")
        )
}

/// Resolve an OPF-relative href to an archive path
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let href = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut parts: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
