//! In-memory sample documents for tests and benches

use std::io::{Cursor, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// EPUB with one XHTML chapter per entry of `chapters`, one `<p>` per string
pub fn sample_epub(chapters: &[&[&str]]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut manifest = String::new();
    let mut spine = String::new();
    for n in 1..=chapters.len() {
        manifest.push_str(&format!(
            "<item id=\"ch{n}\" href=\"ch{n}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("<itemref idref=\"ch{n}\"/>\n"));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:identifier id="id">urn:uuid:sample</dc:identifier>
<dc:title>Sample</dc:title>
<dc:language>en</dc:language>
</metadata>
<manifest>
<item id="css" href="style.css" media-type="text/css"/>
{manifest}</manifest>
<spine>
{spine}</spine>
</package>"#
    );

    let files: Vec<(String, String)> = [
        (
            "META-INF/container.xml".to_string(),
            r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
<rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#
                .to_string(),
        ),
        ("OEBPS/content.opf".to_string(), opf),
        ("OEBPS/style.css".to_string(), "p { margin: 0; }".to_string()),
    ]
    .into_iter()
    .chain(chapters.iter().enumerate().map(|(i, paragraphs)| {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<p>{}</p>\n", html_escape::encode_text(p)))
            .collect();
        (
            format!("OEBPS/ch{}.xhtml", i + 1),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter {}</title></head>
<body>
{}</body>
</html>"#,
                i + 1,
                body
            ),
        )
    }))
    .collect();

    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    for (name, content) in files {
        writer.start_file(name, deflated).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn page_operations(lines: &[&str], spacing: f32) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![Object::Real(0.9), Object::Real(0.9), Object::Real(0.9)]),
        Operation::new("re", vec![50.into(), 50.into(), 100.into(), 100.into()]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ];
    for (i, line) in lines.iter().enumerate() {
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), Object::Real(750.0 - spacing * i as f32)]),
            Operation::new("Tj", vec![Object::string_literal(*line)]),
            Operation::new("ET", vec![]),
        ]);
    }
    ops
}

fn build_pdf(contents: Vec<Vec<u8>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let page_count = contents.len();
    let mut kids: Vec<Object> = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => font_resources.clone(),
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// PDF with one text object per string, Helvetica, plus a filled rectangle
/// on every page
pub fn sample_pdf(pages: &[&[&str]]) -> Vec<u8> {
    sample_pdf_spaced(pages, 40.0)
}

/// Like [`sample_pdf`] with baselines `spacing` points apart
pub fn sample_pdf_spaced(pages: &[&[&str]], spacing: f32) -> Vec<u8> {
    build_pdf(
        pages
            .iter()
            .map(|lines| {
                Content {
                    operations: page_operations(lines, spacing),
                }
                .encode()
                .unwrap()
            })
            .collect(),
    )
}

/// A text object followed by a stray `)`: lopdf reads the text and silently
/// stops before the path and rectangle painted after it
pub const MALFORMED_CONTENT: &[u8] =
    b"BT /F1 12 Tf 72 700 Td (Hello world) Tj ET\n) 10 10 m 200 200 l S\n0 0 100 100 re f";

/// Single-page PDF with a raw content stream
pub fn sample_pdf_with_content(content: &[u8]) -> Vec<u8> {
    build_pdf(vec![content.to_vec()])
}
