//! System prompt construction

/// Human-readable name for common language codes
pub fn language_name(code: &str) -> &str {
    match code.trim().to_lowercase().as_str() {
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese",
        "zh-tw" | "zh-hk" | "zh-hant" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" | "pt-br" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "vi" => "Vietnamese",
        _ => code.trim(),
    }
}

/// Instructions sent as the system turn of every completion
pub fn system_prompt(target_language: &str, hint: &str) -> String {
    let mut prompt = format!(
        "You are a professional translator. Translate the user's text into {}. \
         Output only the translation, without explanations, notes or quotation marks. \
         Preserve paragraph breaks, numbers and proper nouns.",
        language_name(target_language)
    );

    let hint = hint.trim();
    if !hint.is_empty() {
        prompt.push_str("\n\nStyle guidance: ");
        prompt.push_str(hint);
    }

    prompt
}

/// Text without letters (numbers, punctuation, whitespace) is never sent out
pub fn needs_translation(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_language_and_hint() {
        let prompt = system_prompt("zh-CN", "  keep it formal ");
        assert!(prompt.contains("Simplified Chinese"));
        assert!(prompt.ends_with("Style guidance: keep it formal"));

        let plain = system_prompt("xx", "");
        assert!(plain.contains("into xx."));
        assert!(!plain.contains("Style guidance"));
    }

    #[test]
    fn test_needs_translation() {
        assert!(needs_translation("Chapter 1"));
        assert!(needs_translation("第一章"));
        assert!(!needs_translation("12.5 %"));
        assert!(!needs_translation("  -- \n"));
    }
}
