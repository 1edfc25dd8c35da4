//! EPUB rebuild
//!
//! Re-serializes the archive entry by entry. `mimetype` is written first and
//! stored uncompressed; spine documents carrying translations are replayed
//! through the XHTML walker, everything else is copied byte for byte.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::{
    BlockLocator, DocumentError, DocumentResult, GenerateMode, OutputFormat, RebuildOptions,
    RebuildOutput, TranslatedBlock,
};
use crate::formats::{markup, pdf};

use super::parser::EpubDocument;
use super::xhtml;

const MIMETYPE: &[u8] = b"application/epub+zip";

pub(super) fn rebuild(
    doc: &EpubDocument,
    blocks: &[TranslatedBlock],
    options: &RebuildOptions,
) -> DocumentResult<RebuildOutput> {
    match options.output_format {
        OutputFormat::Epub => rebuild_archive(doc.bytes(), blocks, options.mode),
        OutputFormat::Pdf => Ok(RebuildOutput {
            bytes: pdf::render_text_document(blocks, options)?,
            ..Default::default()
        }),
        OutputFormat::Html => Ok(RebuildOutput {
            bytes: markup::render_html(blocks, options).into_bytes(),
            ..Default::default()
        }),
        OutputFormat::Txt => Ok(RebuildOutput {
            bytes: markup::render_text(blocks, options.mode).into_bytes(),
            ..Default::default()
        }),
    }
}

/// Translations grouped by archive entry, then by block ordinal
fn group_by_entry(blocks: &[TranslatedBlock]) -> HashMap<&str, HashMap<usize, &str>> {
    let mut grouped: HashMap<&str, HashMap<usize, &str>> = HashMap::new();
    for item in blocks {
        if let (BlockLocator::Epub { entry, ordinal }, Some(translation)) =
            (&item.block.locator, item.translation.as_deref())
        {
            grouped
                .entry(entry.as_str())
                .or_default()
                .insert(*ordinal, translation);
        }
    }
    grouped
}

fn rebuild_archive(
    source: &[u8],
    blocks: &[TranslatedBlock],
    mode: GenerateMode,
) -> DocumentResult<RebuildOutput> {
    let grouped = group_by_entry(blocks);
    let mut archive = ZipArchive::new(Cursor::new(source))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut warnings = Vec::new();

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored)?;
    writer.write_all(MIMETYPE)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();

        if name == "mimetype" {
            continue;
        }
        if file.is_dir() {
            writer.add_directory(name, deflated)?;
            continue;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if let Some(translations) = grouped.get(name.as_str()) {
            let rebuilt = std::str::from_utf8(&data)
                .map_err(|e| DocumentError::InvalidContent(e.to_string()))
                .and_then(|xml| xhtml::rebuild_entry(xml, translations, mode));
            match rebuilt {
                Ok(xml) => data = xml.into_bytes(),
                Err(e) => {
                    tracing::warn!(entry = %name, error = %e, "Copying EPUB item untranslated");
                    warnings.push(format!("{}: kept original ({})", name, e));
                }
            }
        }

        writer.start_file(name, deflated)?;
        writer.write_all(&data)?;
    }

    let bytes = writer.finish()?.into_inner();
    Ok(RebuildOutput {
        bytes,
        degraded: false,
        warnings,
    })
}
