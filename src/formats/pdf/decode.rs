//! Text decoding
//!
//! String operands of text-showing operators are decoded with the encoding
//! `lopdf` derives from the active font: its ToUnicode CMap, a named
//! single-byte encoding, or a predefined CJK CMap. Type0 fonts lopdf cannot
//! decode are read as UCS-2; simple fonts without any encoding information
//! as WinAnsi.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Encoding, ObjectId};

use super::fonts::win_ansi_encoding;

/// How one font's string bytes become text
pub struct FontDecoder<'a> {
    encoding: Option<Encoding<'a>>,
    two_byte: bool,
}

impl<'a> FontDecoder<'a> {
    pub fn from_font(doc: &Document, font: &'a Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|n| n == b"Type0")
            .unwrap_or(false);

        // lopdf falls back to StandardEncoding for bare simple fonts; most
        // producers of such fonts write WinAnsi
        let bare = !two_byte && !font.has(b"Encoding") && !font.has(b"ToUnicode");
        let encoding = if bare {
            None
        } else {
            font.get_font_encoding(doc).ok()
        };

        Self { encoding, two_byte }
    }

    /// Decoder for strings shown without a known font
    pub fn win_ansi() -> FontDecoder<'static> {
        FontDecoder {
            encoding: None,
            two_byte: false,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(text) = self
            .encoding
            .as_ref()
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
        {
            return text;
        }

        if self.two_byte {
            let units: Vec<u16> = bytes
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
                .collect();
            return String::from_utf16_lossy(&units);
        }

        win_ansi_encoding()
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Decoders for every font resource of a page, keyed by resource name.
///
/// Unreadable resources yield an empty map; strings then decode as WinAnsi.
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontDecoder<'_>> {
    match doc.get_page_fonts(page_id) {
        Ok(fonts) => fonts
            .into_iter()
            .map(|(name, font)| (name, FontDecoder::from_font(doc, font)))
            .collect(),
        Err(e) => {
            tracing::debug!("Page {:?} fonts unreadable: {}", page_id, e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fixtures::sample_pdf;
    use crate::formats::pdf::fonts::FontSet;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_bare_simple_font_reads_as_win_ansi() {
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        let decoder = FontDecoder::from_font(&Document::new(), &font);
        assert_eq!(decoder.decode(b"caf\xe9 \x93ok\x94 it's"), "café \u{201C}ok\u{201D} it's");
        assert_eq!(FontDecoder::win_ansi().decode(b"\x80 5"), "€ 5");
    }

    #[test]
    fn test_identity_font_uses_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Subset-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0024> <0041>
endbfchar
1 beginbfrange
<0044> <0046> <0061>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";
        let to_unicode = doc.add_object(Stream::new(Dictionary::new(), cmap.to_vec()));
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Subset+Serif",
            "Encoding" => "Identity-H",
            "ToUnicode" => to_unicode,
        };

        let decoder = FontDecoder::from_font(&doc, &font);
        assert_eq!(decoder.decode(&[0x00, 0x24, 0x00, 0x03, 0x00, 0x45, 0x00, 0x46]), "A bc");
    }

    #[test]
    fn test_type0_without_cmap_reads_ucs2() {
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "HeiseiMin-W3",
            "Encoding" => "UniJIS-UCS2-H",
        };
        let decoder = FontDecoder::from_font(&Document::new(), &font);
        assert_eq!(decoder.decode(&[0x65, 0xE5, 0x67, 0x2C]), "日本");
    }

    #[test]
    fn test_registered_output_fonts_decode() {
        for (language, text) in [("fr", "Déjà vu “oui” 5€"), ("zh", "中文A"), ("ja", "日本語")] {
            let mut doc = Document::with_version("1.5");
            let fonts = FontSet::for_language(language).register(&mut doc);
            let font = doc.get_dictionary(fonts.primary.id).unwrap();
            let decoder = FontDecoder::from_font(&doc, font);
            assert_eq!(decoder.decode(&fonts.primary.font.encode(text)), text, "{}", language);
        }
    }

    #[test]
    fn test_page_fonts_by_resource_name() {
        let doc = Document::load_mem(&sample_pdf(&[&["Hi"]])).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let fonts = page_fonts(&doc, page_id);
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[b"F1".as_slice()].decode(b"Hi"), "Hi");
    }
}
