//! Small text helpers shared by the HTML and PDF extractors.

use crate::prompts::TRUNCATION_MARKER;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`].
///
/// Counts `char`s, so multi-byte text is never split mid-character. Text that
/// already fits is returned as-is.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut out = text[..cut].trim_end().to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

static RE_AUTHOR_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:,|;|&|\band\b)\s*").unwrap());

static RE_BY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*by\s+").unwrap());

/// Split a byline such as `"By Jane Doe and John Roe; Staff"` into names.
pub fn split_authors(byline: &str) -> Vec<String> {
    let byline = RE_BY_PREFIX.replace(byline, "");
    let mut authors: Vec<String> = Vec::new();
    for part in RE_AUTHOR_SEPARATORS.split(&byline) {
        let name = collapse_whitespace(part);
        if !name.is_empty() && !authors.contains(&name) {
            authors.push(name);
        }
    }
    authors
}

/// Collapse every whitespace run (including newlines) to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Tidy multi-paragraph text: trim each line, keep at most one blank line.
pub fn tidy_paragraphs(s: &str) -> String {
    let joined = s
        .lines()
        .map(collapse_whitespace)
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANK_RUNS.replace_all(joined.trim(), "\n\n").into_owned()
}

/// Hostname of `url` without a leading `www.`; empty when there is none.
pub fn source_guess(url: &Url) -> String {
    url.host_str()
        .map(|h| h.strip_prefix("www.").unwrap_or(h).to_string())
        .unwrap_or_default()
}
