//! Prompt templates and the fixed strings the pipeline inserts into them.
//!
//! Every prompt string lives here so tests can inspect them directly and so
//! changing the note format means editing exactly one place. Callers override
//! the template via [`crate::config::ImportConfig::template`]; the constants
//! below are used when no override is provided.
//!
//! Templates use `{{name}}` placeholders: `url`, `title`, `authors`,
//! `published`, `source` and `article_text`.

/// Appended once to text cut at `max_chars`.
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Substituted for `{{article_text}}` when extraction produced no text.
pub const NO_TEXT_SENTINEL: &str = "[No article text could be extracted from this page.]";

/// Extracted text shorter than this (in characters) gets [`THIN_TEXT_WARNING`].
pub const THIN_TEXT_THRESHOLD: usize = 500;

/// Tells the model not to fill gaps when extraction looks paywalled or blocked.
pub const THIN_TEXT_WARNING: &str = "NOTE: The extracted article text is short; the page may be paywalled or blocked. \
Do NOT invent missing details - format only what is provided.";

/// Heading of the block listing suggested tags.
pub const DEFAULT_TAGS_HEADER: &str = "DEFAULT TAGS";

/// Default template: an Obsidian analyst note with strict YAML properties.
pub const DEFAULT_NOTE_TEMPLATE: &str = r#"You are an analyst assistant. Convert the provided article into a single Obsidian note written in Obsidian-flavoured Markdown.

STRICT OUTPUT RULES
- Return ONLY the final markdown note. No commentary, no code fences.
- The note MUST start with YAML frontmatter and end that block with a second line containing only '---'.
- After YAML, write the note body with the headings below.
- Wrap key named entities in [[double square brackets]] throughout the BODY only: people, organizations, countries, cities/places, weapon systems/munitions, events/operations, platforms/programs. Do NOT link generic nouns.

FRONTMATTER (STRICT YAML, OBSIDIAN PROPERTIES)
1) Valid YAML the parser can read:
   - snake_case keys only; spaces, not tabs; no duplicate keys.
   - omit unknown or uncertain fields (never output blanks or placeholders like "unknown").
2) Allowed keys and types:
   REQUIRED
   - title: quoted string (headline)
   - source: quoted string (may contain [[wikilink]] but keep inside quotes)
   - url: quoted string
   - published: ISO-8601 date or datetime (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS) with no surrounding quotes
   - type: "news_article" for web pages, "document" for PDFs
   - tags: block list of lowercase slug tags (unquoted items)
   OPTIONAL (only when present)
   - author: single quoted string (use ONLY when exactly one author)
   - authors: block list of quoted strings (use when multiple authors; never include both author and authors)
   - section: quoted string
   - language: quoted string (e.g. "en")
   - location: quoted string (may contain [[wikilink]])
   - topics: block list of quoted strings (may contain [[wikilinks]]; keep consistent)
3) Quoting policy:
   - Quote ALL string values with double quotes, except items under tags which must be unquoted simple slugs.
   - Always quote values containing ':', '#', '@', '[', ']', '{', '}', ',', or leading/trailing spaces.
   - Never put a backslash inside a quoted value; use forward slashes for paths.
4) Lists:
   - Use block lists only (no inline lists). Each item on its own line, two spaces indent under the key.
5) Self-check before output:
   - YAML starts with '---' on its own line and ends with '---'.
   - Every key has exactly one value; lists are indented consistently; no blank/placeholder values; YAML would parse.

CANONICAL YAML EXAMPLE
---
title: "Example headline"
source: "Example Source"
url: "https://example.com/news/example-article"
published: 2026-01-23
type: "news_article"
author: "Jane Doe"
tags:
  - news
  - drones
topics:
  - "Air Defence"
---

NOTE BODY STRUCTURE (REQUIRED HEADINGS)
## Summary
- 3-7 bullets capturing the key claims (with linked entities in the text).

## Key details
- Expand key facts: timeline, quantities, specs, locations, named suppliers/manufacturers, etc.

## Claims & attribution
- Separate what is claimed vs who claims it.
- Mark uncertainty clearly (unconfirmed / not independently verified in the provided text).

## Entities
Group key entities with Obsidian links:
- People
- Organisations
- Systems / equipment
- Locations
- (Optional) Platforms / sanctions / programs

## Analyst notes (optional but encouraged)
- 5-10 bullets: verification hooks, OSINT checks, notable gaps.

NOW CONVERT THIS ARTICLE
URL: {{url}}

METADATA (as extracted)
title: {{title}}
authors: {{authors}}
published: {{published}}
source: {{source}}

ARTICLE TEXT
{{article_text}}"#;

/// Extra instruction sent with a native-vision request, after the rendered template.
pub const NATIVE_PDF_INSTRUCTION: &str = "The full PDF document is attached. Read it directly; \
the ARTICLE TEXT above may be incomplete or empty.";

/// Render the default-tags block for the given normalised tags.
pub fn default_tags_block(tags: &[String]) -> String {
    let mut block = format!(
        "\n\n{DEFAULT_TAGS_HEADER}\n\
Include the following tags in the frontmatter `tags` list if appropriate \
(add them only where they fit the content; never force them):\n"
    );
    for tag in tags {
        block.push_str("- ");
        block.push_str(tag);
        block.push('\n');
    }
    block.push_str("END DEFAULT TAGS");
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_every_placeholder() {
        for name in ["url", "title", "authors", "published", "source", "article_text"] {
            let placeholder = format!("{{{{{name}}}}}");
            assert!(
                DEFAULT_NOTE_TEMPLATE.contains(&placeholder),
                "missing {placeholder}"
            );
        }
    }

    #[test]
    fn tags_block_lists_each_tag() {
        let block = default_tags_block(&["news".into(), "drones".into()]);
        assert!(block.contains(DEFAULT_TAGS_HEADER));
        assert!(block.contains("if appropriate"));
        assert!(block.contains("- news\n"));
        assert!(block.contains("- drones\n"));
    }
}
