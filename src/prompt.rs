// Readability critique instruction sent to the model

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"
    Analyze the following text and return a JSON response with:
    - "long_sentences": List of sentences over 20 words + rewrite suggestions
    - "passive_voice": List of passive voice sentences + suggestions to make active
    - "adverbs": List of adverbs + whether they weaken the sentence
    - "readability": Flesch-Kincaid readability score + explanation

    Text:
    "{text}"
    "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_all_four_categories() {
        let prompt = build_prompt("The cat sat.");
        for key in ["long_sentences", "passive_voice", "adverbs", "readability"] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("Flesch-Kincaid"));
    }

    #[test]
    fn text_is_embedded_verbatim() {
        let text = "Quotes \" and {braces} and\nnewlines stay as-is.";
        assert!(build_prompt(text).contains(text));
        assert!(build_prompt("").contains("\"\""));
    }
}
