//! Document Pipeline Benchmarks
//!
//! Block extraction and bilingual rebuild for PDF and EPUB inputs.
//!
//! Run with: `cargo bench --bench document_parsing`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use bitext_server::document::{
    open_document, DocumentFormat, GenerateMode, OutputFormat, RebuildOptions, TranslatedBlock,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const PAGES: usize = 20;
const LINES_PER_PAGE: usize = 30;

/// Text-heavy PDF: Helvetica, one BT block per line
fn create_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 0..PAGES {
        let mut operations = Vec::new();
        for line in 0..LINES_PER_PAGE {
            let text = format!("Page {} line {}: the quick brown fox jumps over the lazy dog.", page, line);
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), (760 - 24 * line as i64).into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let encoded = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => PAGES as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to write benchmark PDF");
    buffer
}

/// EPUB with a handful of paragraph-heavy chapters
fn create_epub() -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::{write::SimpleFileOptions, ZipWriter};

    const CHAPTERS: usize = 10;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        zip.start_file("META-INF/container.xml", stored).unwrap();
        zip.write_all(br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#).unwrap();

        let manifest: String = (1..=CHAPTERS)
            .map(|i| format!(r#"<item id="ch{i}" href="ch{i}.xhtml" media-type="application/xhtml+xml"/>"#))
            .collect();
        let spine: String = (1..=CHAPTERS)
            .map(|i| format!(r#"<itemref idref="ch{i}"/>"#))
            .collect();
        zip.start_file("OEBPS/content.opf", stored).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">benchmark-epub-001</dc:identifier>
    <dc:title>Benchmark EPUB</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
        )
        .unwrap();

        for i in 1..=CHAPTERS {
            let paragraphs: String = (0..50)
                .map(|p| format!("<p>Chapter {i}, paragraph {p}: <em>benchmark</em> prose for block extraction.</p>\n"))
                .collect();
            zip.start_file(format!("OEBPS/ch{i}.xhtml"), stored).unwrap();
            write!(
                zip,
                r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter {i}</title></head>
<body>
<h1>Chapter {i}</h1>
{paragraphs}</body>
</html>"#
            )
            .unwrap();
        }

        zip.finish().unwrap();
    }
    buffer
}

fn bench_extraction(c: &mut Criterion) {
    let inputs = [("pdf", create_pdf()), ("epub", create_epub())];

    let mut group = c.benchmark_group("block_extraction");
    group.measurement_time(Duration::from_secs(10));

    for (name, data) in &inputs {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new(*name, data.len()), data, |b, data| {
            b.iter(|| {
                let document = open_document(black_box(data.clone())).expect("Failed to open document");
                let blocks = document.extract_blocks().expect("Failed to extract blocks");
                black_box(blocks)
            })
        });
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let inputs = [("pdf", create_pdf()), ("epub", create_epub())];

    let mut group = c.benchmark_group("bilingual_rebuild");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for (name, data) in &inputs {
        let document = open_document(data.clone()).expect("Failed to open document");
        let translated: Vec<TranslatedBlock> = document
            .extract_blocks()
            .expect("Failed to extract blocks")
            .into_iter()
            .map(|block| {
                let translation = format!("[fr] {}", block.text);
                TranslatedBlock::new(block, Some(translation))
            })
            .collect();
        let options = RebuildOptions {
            mode: GenerateMode::Bilingual,
            output_format: OutputFormat::from(document.format()),
            target_language: "fr".to_string(),
            title: "benchmark".to_string(),
        };

        group.bench_function(*name, |b| {
            b.iter(|| {
                let output = document
                    .rebuild(black_box(&translated), &options)
                    .expect("Failed to rebuild document");
                black_box(output)
            })
        });
    }

    group.finish();
}

/// Format detection from magic bytes
fn bench_format_detection(c: &mut Criterion) {
    let pdf_data = create_pdf();
    let epub_data = create_epub();

    let mut group = c.benchmark_group("format_detection");

    group.bench_function("pdf_magic_bytes", |b| {
        b.iter(|| black_box(DocumentFormat::from_magic_bytes(black_box(&pdf_data))))
    });

    group.bench_function("epub_magic_bytes", |b| {
        b.iter(|| black_box(DocumentFormat::from_magic_bytes(black_box(&epub_data))))
    });

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_rebuild, bench_format_detection);
criterion_main!(benches);
