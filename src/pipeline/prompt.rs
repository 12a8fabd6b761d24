//! Prompt construction: render the note template for one extracted document.
//!
//! Substitution is a single regex pass over the template, so a `{{title}}`
//! that happens to appear inside the article text is never expanded a second
//! time. Unknown placeholders are left exactly as written.

use crate::output::ExtractedContent;
use crate::prompts::{
    default_tags_block, NO_TEXT_SENTINEL, THIN_TEXT_THRESHOLD, THIN_TEXT_WARNING,
};
use crate::tags::TagInput;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap());

/// Render `template` for `content` fetched from `url`.
///
/// Empty text becomes [`NO_TEXT_SENTINEL`]; text shorter than
/// [`THIN_TEXT_THRESHOLD`] characters is followed by [`THIN_TEXT_WARNING`].
/// Non-empty `default_tags` append a `DEFAULT TAGS` block.
pub fn build_prompt<'a>(
    url: &str,
    content: &ExtractedContent,
    default_tags: impl Into<TagInput<'a>>,
    template: &str,
) -> String {
    let fields = content.fields();
    let text = fields.text.trim();

    let article_text = if text.is_empty() {
        NO_TEXT_SENTINEL.to_string()
    } else if text.chars().count() < THIN_TEXT_THRESHOLD {
        format!("{text}\n\n{THIN_TEXT_WARNING}")
    } else {
        text.to_string()
    };
    let authors = fields.authors.join(", ");

    let mut prompt = RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "url" => url.to_string(),
            "title" => fields.title.clone(),
            "authors" => authors.clone(),
            "published" => fields.published.clone(),
            "source" => fields.source_guess.clone(),
            "article_text" => article_text.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned();

    let tags = default_tags.into().normalized();
    if !tags.is_empty() {
        prompt.push_str(&default_tags_block(&tags));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractedFields;
    use crate::prompts::{DEFAULT_NOTE_TEMPLATE, DEFAULT_TAGS_HEADER};

    fn article(text: &str) -> ExtractedContent {
        ExtractedContent::Article(ExtractedFields {
            title: "Drone Maker Expands Output".into(),
            authors: vec!["Jane Doe".into(), "John Roe".into()],
            published: "2024-05-02".into(),
            text: text.into(),
            source_guess: "news.example.com".into(),
            ..Default::default()
        })
    }

    const TEMPLATE: &str =
        "U={{url}}|T={{title}}|A={{authors}}|P={{published}}|S={{source}}|{{ unknown }}\n{{article_text}}";

    #[test]
    fn substitutes_every_placeholder() {
        let body = "x".repeat(600);
        let prompt = build_prompt("https://e.com/a", &article(&body), "", TEMPLATE);
        assert!(prompt.starts_with(
            "U=https://e.com/a|T=Drone Maker Expands Output|A=Jane Doe, John Roe|P=2024-05-02|S=news.example.com|{{ unknown }}\n"
        ));
        assert!(prompt.ends_with(&body));
        assert!(!prompt.contains(DEFAULT_TAGS_HEADER));
    }

    #[test]
    fn empty_text_uses_sentinel() {
        let prompt = build_prompt("u", &article("   "), "", "{{article_text}}");
        assert_eq!(prompt, NO_TEXT_SENTINEL);
    }

    #[test]
    fn thin_text_gets_warning() {
        let prompt = build_prompt("u", &article("Subscribe to continue"), "", "{{article_text}}");
        assert!(prompt.starts_with("Subscribe to continue"));
        assert!(prompt.contains(THIN_TEXT_WARNING));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let body = format!("Article quoting {{{{title}}}} literally. {}", "y".repeat(600));
        let prompt = build_prompt("u", &article(&body), "", "{{article_text}}");
        assert!(prompt.contains("{{title}} literally"));
    }

    #[test]
    fn default_tags_from_string_or_list() {
        let from_str = build_prompt("u", &article("t"), "#News, Drones", "{{url}}");
        let list = vec!["news".to_string(), "drones".to_string()];
        let from_list = build_prompt("u", &article("t"), &list, "{{url}}");
        assert_eq!(from_str, from_list);
        assert!(from_str.contains("if appropriate"));
        assert!(from_str.contains("- news\n- drones\n"));
    }

    #[test]
    fn default_template_renders_metadata() {
        let prompt = build_prompt("https://e.com/a", &article("body"), "", DEFAULT_NOTE_TEMPLATE);
        assert!(prompt.contains("URL: https://e.com/a"));
        assert!(prompt.contains("authors: Jane Doe, John Roe"));
        assert!(!prompt.contains("{{"));
    }
}
