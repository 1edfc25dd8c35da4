//! HTML and plain-text serializers
//!
//! Format-independent outputs built from translated blocks alone.

use crate::document::{GenerateMode, RebuildOptions, TranslatedBlock};

use super::epub::TRANSLATION_CLASS;

const SOURCE_CLASS: &str = "bitext-source";

const STYLESHEET: &str = "body{max-width:42em;margin:2em auto;padding:0 1em;\
font-family:Georgia,serif;line-height:1.6;color:#222}\
.bitext-block{margin:0 0 1.2em}\
.bitext-source{margin:0}\
.bitext-translation{margin:.3em 0 0;color:#1a4d8f}";

/// Standalone HTML page, one `<div>` per block
pub fn render_html(blocks: &[TranslatedBlock], options: &RebuildOptions) -> String {
    let title = if options.title.is_empty() {
        "Translation"
    } else {
        options.title.as_str()
    };

    let mut html = String::with_capacity(blocks.len() * 128);
    html.push_str("<!DOCTYPE html>\n<html lang=\"");
    html.push_str(&html_escape::encode_double_quoted_attribute(&options.target_language));
    html.push_str("\">\n<head>\n<meta charset=\"utf-8\">\n<title>");
    html.push_str(&html_escape::encode_text(title));
    html.push_str("</title>\n<style>");
    html.push_str(STYLESHEET);
    html.push_str("</style>\n</head>\n<body>\n");

    for item in blocks {
        html.push_str("<div class=\"bitext-block\">\n");
        match (options.mode, item.translation.as_deref()) {
            (GenerateMode::Bilingual, Some(translation)) => {
                paragraph(&mut html, SOURCE_CLASS, &item.block.text);
                paragraph(&mut html, TRANSLATION_CLASS, translation);
            }
            (GenerateMode::Monolingual, Some(translation)) => {
                paragraph(&mut html, TRANSLATION_CLASS, translation);
            }
            (_, None) => paragraph(&mut html, SOURCE_CLASS, &item.block.text),
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn paragraph(html: &mut String, class: &str, text: &str) {
    html.push_str("<p class=\"");
    html.push_str(class);
    html.push_str("\">");
    html.push_str(&html_escape::encode_text(text).replace('\n', "<br>"));
    html.push_str("</p>\n");
}

/// Plain text, blank line between blocks
pub fn render_text(blocks: &[TranslatedBlock], mode: GenerateMode) -> String {
    blocks
        .iter()
        .map(|item| match (mode, item.translation.as_deref()) {
            (GenerateMode::Bilingual, Some(translation)) => {
                format!("{}\n{}\n", item.block.text, translation)
            }
            _ => format!("{}\n", item.output_text()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Visible text of an HTML page: tags dropped, entities decoded, the
/// `<head>` skipped
pub fn html_text(html: &str) -> String {
    let body = match html.find("<body") {
        Some(start) => &html[start..],
        None => html,
    };

    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    html_escape::decode_html_entities(&text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockLocator, OutputFormat, TextBlock};

    fn blocks() -> Vec<TranslatedBlock> {
        ["Fish & chips", "Untouched"]
            .iter()
            .enumerate()
            .map(|(index, text)| {
                TranslatedBlock::new(
                    TextBlock {
                        index,
                        text: text.to_string(),
                        locator: BlockLocator::Epub {
                            entry: "ch.xhtml".to_string(),
                            ordinal: index,
                        },
                    },
                    (index == 0).then(|| "Poisson <frit>".to_string()),
                )
            })
            .collect()
    }

    fn options(mode: GenerateMode) -> RebuildOptions {
        RebuildOptions {
            mode,
            output_format: OutputFormat::Html,
            target_language: "fr".to_string(),
            title: "Menu".to_string(),
        }
    }

    #[test]
    fn test_html_escapes_and_marks_translations() {
        let html = render_html(&blocks(), &options(GenerateMode::Bilingual));

        assert!(html.contains("<title>Menu</title>"));
        assert!(html.contains("<p class=\"bitext-source\">Fish &amp; chips</p>"));
        assert!(html.contains("<p class=\"bitext-translation\">Poisson &lt;frit&gt;</p>"));
        assert!(html.contains("<p class=\"bitext-source\">Untouched</p>"));
    }

    #[test]
    fn test_monolingual_html_drops_sources() {
        let html = render_html(&blocks(), &options(GenerateMode::Monolingual));
        assert!(!html.contains("Fish"));
        assert!(html.contains("Untouched"));
    }

    #[test]
    fn test_html_text_recovers_content() {
        let text = html_text(&render_html(&blocks(), &options(GenerateMode::Bilingual)));
        assert!(text.contains("Fish & chips"));
        assert!(text.contains("Poisson <frit>"));
        assert!(!text.contains("max-width"));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            render_text(&blocks(), GenerateMode::Bilingual),
            "Fish & chips\nPoisson <frit>\n\nUntouched\n"
        );
        assert_eq!(
            render_text(&blocks(), GenerateMode::Monolingual),
            "Poisson <frit>\n\nUntouched\n"
        );
    }
}
