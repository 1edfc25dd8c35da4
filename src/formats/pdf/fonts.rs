//! Output fonts
//!
//! Translated text is drawn with non-embedded fonts every conforming reader
//! provides: the Adobe CJK CID fonts (UCS-2 encoded) for Chinese, Japanese
//! and Korean targets, Helvetica with WinAnsi otherwise. Text a WinAnsi font
//! cannot encode (Cyrillic, Greek, CJK in a Latin target) is drawn with a
//! CID font instead. Every registered font carries a ToUnicode CMap so the
//! output stays extractable.

use std::sync::OnceLock;

use lopdf::{dictionary, Dictionary, Document, Encoding, Object, ObjectId, Stream};

/// The WinAnsi encoding as lopdf resolves it for a standard Type1 font
pub(super) fn win_ansi_encoding() -> Option<&'static Encoding<'static>> {
    static FONT: OnceLock<Dictionary> = OnceLock::new();
    static ENCODING: OnceLock<Option<Encoding<'static>>> = OnceLock::new();

    ENCODING
        .get_or_init(|| {
            let font = FONT.get_or_init(|| {
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                }
            });
            font.get_font_encoding(&Document::new()).ok()
        })
        .as_ref()
}

/// WinAnsi code of one char
fn win_ansi_code(ch: char) -> Option<u8> {
    let encoding = win_ansi_encoding()?;
    let mut buf = [0u8; 4];
    match Document::encode_text(encoding, ch.encode_utf8(&mut buf)).as_slice() {
        [code] => Some(*code),
        _ => None,
    }
}

/// Predefined Adobe CJK font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidFont {
    pub base_font: &'static str,
    pub encoding: &'static str,
    pub ordering: &'static str,
    pub supplement: i64,
}

const SIMPLIFIED_CHINESE: CidFont = CidFont {
    base_font: "STSong-Light",
    encoding: "UniGB-UCS2-H",
    ordering: "GB1",
    supplement: 2,
};

const TRADITIONAL_CHINESE: CidFont = CidFont {
    base_font: "MSung-Light",
    encoding: "UniCNS-UCS2-H",
    ordering: "CNS1",
    supplement: 0,
};

const JAPANESE: CidFont = CidFont {
    base_font: "HeiseiMin-W3",
    encoding: "UniJIS-UCS2-H",
    ordering: "Japan1",
    supplement: 2,
};

const KOREAN: CidFont = CidFont {
    base_font: "HYSMyeongJo-Medium",
    encoding: "UniKS-UCS2-H",
    ordering: "Korea1",
    supplement: 1,
};

/// A font the generator can draw with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfFont {
    /// Helvetica, WinAnsi encoded
    WinAnsi,
    /// Type0 font over a predefined CID font, UCS-2 encoded
    Cid(CidFont),
}

impl PdfFont {
    /// Whether every char of `text` has a code in this font
    pub fn can_encode(&self, text: &str) -> bool {
        match self {
            Self::WinAnsi => text.chars().all(|c| win_ansi_code(c).is_some()),
            Self::Cid(_) => text.chars().all(|c| (c as u32) <= 0xFFFF),
        }
    }

    /// Encode for a show operator; unencodable chars become `?`
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::WinAnsi => text
                .chars()
                .map(|c| win_ansi_code(c).unwrap_or(b'?'))
                .collect(),
            Self::Cid(_) => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let unit = if (c as u32) <= 0xFFFF { c as u32 as u16 } else { b'?' as u16 };
                    out.extend_from_slice(&unit.to_be_bytes());
                }
                out
            }
        }
    }

    /// Approximate advance width in em
    pub fn char_width(&self, ch: char) -> f32 {
        if is_wide(ch) {
            return 1.0;
        }
        match (self, ch) {
            (_, ' ') => 0.28,
            (_, 'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | '|') => 0.28,
            (_, 'm' | 'w' | 'M' | 'W') => 0.83,
            (_, c) if c.is_uppercase() => 0.67,
            _ => 0.55,
        }
    }

    /// Add the font dictionary (and its ToUnicode stream) to a document
    pub fn register(&self, doc: &mut Document) -> ObjectId {
        match self {
            Self::WinAnsi => {
                let to_unicode = doc.add_object(Stream::new(Dictionary::new(), win_ansi_cmap()));
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                    "ToUnicode" => to_unicode,
                })
            }
            Self::Cid(font) => {
                let to_unicode = doc.add_object(Stream::new(Dictionary::new(), ucs2_cmap()));
                let descriptor = doc.add_object(dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => font.base_font,
                    "Flags" => 6,
                    "FontBBox" => vec![0.into(), (-140).into(), 1000.into(), 880.into()],
                    "ItalicAngle" => 0,
                    "Ascent" => 880,
                    "Descent" => -120,
                    "CapHeight" => 880,
                    "StemV" => 93,
                });
                let descendant = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType0",
                    "BaseFont" => font.base_font,
                    "CIDSystemInfo" => dictionary! {
                        "Registry" => Object::string_literal("Adobe"),
                        "Ordering" => Object::string_literal(font.ordering),
                        "Supplement" => font.supplement,
                    },
                    "FontDescriptor" => descriptor,
                    "DW" => 1000,
                });
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type0",
                    "BaseFont" => font.base_font,
                    "Encoding" => font.encoding,
                    "DescendantFonts" => vec![descendant.into()],
                    "ToUnicode" => to_unicode,
                })
            }
        }
    }
}

pub(super) fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// Primary font for a target language plus a UCS-2 font for anything the
/// primary cannot encode
#[derive(Debug, Clone, Copy)]
pub struct FontSet {
    pub primary: PdfFont,
    pub unicode: CidFont,
}

impl FontSet {
    pub fn for_language(language: &str) -> Self {
        let lang = language.trim().to_lowercase();
        let cid = match lang.as_str() {
            "zh-tw" | "zh-hk" | "zh-hant" => Some(TRADITIONAL_CHINESE),
            l if l.starts_with("zh") => Some(SIMPLIFIED_CHINESE),
            l if l.starts_with("ja") => Some(JAPANESE),
            l if l.starts_with("ko") => Some(KOREAN),
            _ => None,
        };

        match cid {
            Some(font) => Self {
                primary: PdfFont::Cid(font),
                unicode: font,
            },
            None => Self {
                primary: PdfFont::WinAnsi,
                unicode: SIMPLIFIED_CHINESE,
            },
        }
    }

    /// Register the fonts, returning resource names and ids
    pub fn register(&self, doc: &mut Document) -> RegisteredFonts {
        let primary_id = self.primary.register(doc);
        let unicode = match self.primary {
            PdfFont::Cid(_) => None,
            PdfFont::WinAnsi => {
                let font = PdfFont::Cid(self.unicode);
                Some(FontRef {
                    name: FALLBACK_FONT_NAME.to_vec(),
                    id: font.register(doc),
                    font,
                })
            }
        };

        RegisteredFonts {
            primary: FontRef {
                name: PRIMARY_FONT_NAME.to_vec(),
                id: primary_id,
                font: self.primary,
            },
            unicode,
        }
    }
}

/// Resource names used in page font dictionaries
const PRIMARY_FONT_NAME: &[u8] = b"FBitext0";
const FALLBACK_FONT_NAME: &[u8] = b"FBitext1";

/// A font registered in a document
#[derive(Debug, Clone)]
pub struct FontRef {
    pub name: Vec<u8>,
    pub id: ObjectId,
    pub font: PdfFont,
}

#[derive(Debug, Clone)]
pub struct RegisteredFonts {
    pub primary: FontRef,
    pub unicode: Option<FontRef>,
}

impl RegisteredFonts {
    /// Font able to draw `text`
    pub fn select(&self, text: &str) -> &FontRef {
        match &self.unicode {
            Some(unicode) if !self.primary.font.can_encode(text) => unicode,
            _ => &self.primary,
        }
    }

    /// Entries to merge into a `/Font` resource dictionary
    pub fn resource_entries(&self) -> Vec<(Vec<u8>, ObjectId)> {
        std::iter::once(&self.primary)
            .chain(self.unicode.as_ref())
            .map(|f| (f.name.clone(), f.id))
            .collect()
    }
}

// ============================================================================
// ToUnicode CMaps
// ============================================================================

fn cmap(codespace: &str, body: &str) -> Vec<u8> {
    format!(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n{}\nendcodespacerange\n\
         {}\
         endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
        codespace, body
    )
    .into_bytes()
}

/// Identity mapping for two-byte UCS-2 codes, surrogates excluded
fn ucs2_cmap() -> Vec<u8> {
    let ranges: Vec<String> = (0u32..=0xFF)
        .filter(|high| !(0xD8..=0xDF).contains(high))
        .map(|high| format!("<{:02X}00> <{:02X}FF> <{:02X}00>", high, high, high))
        .collect();

    let mut body = String::new();
    for chunk in ranges.chunks(100) {
        body.push_str(&format!("{} beginbfrange\n", chunk.len()));
        for line in chunk {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str("endbfrange\n");
    }
    cmap("<0000> <FFFF>", &body)
}

/// Single-byte WinAnsi codes to Unicode
fn win_ansi_cmap() -> Vec<u8> {
    let entries: Vec<String> = match win_ansi_encoding() {
        Some(encoding) => (0x20u8..=0xFF)
            .filter_map(|byte| {
                let text = Document::decode_text(encoding, &[byte]).ok()?;
                let mut units = text.encode_utf16();
                match (units.next(), units.next()) {
                    (Some(unit), None) => Some(format!("<{:02X}> <{:04X}>", byte, unit)),
                    _ => None,
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let mut body = String::new();
    for chunk in entries.chunks(100) {
        body.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for line in chunk {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str("endbfchar\n");
    }
    cmap("<00> <FF>", &body)
}
