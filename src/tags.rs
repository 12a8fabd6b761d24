//! Tag normalisation: free-form tag text → lowercase slugs.
//!
//! Slugs contain only `[a-z0-9-]`, never start or end with a hyphen, and never
//! contain two hyphens in a row. Normalising an already-normalised list is the
//! identity, so tags can be round-tripped through config strings freely.

use std::collections::HashSet;

/// Tags supplied either as one comma-separated string or as a list.
#[derive(Debug, Clone, Copy)]
pub enum TagInput<'a> {
    Csv(&'a str),
    List(&'a [String]),
}

impl<'a> From<&'a str> for TagInput<'a> {
    fn from(s: &'a str) -> Self {
        TagInput::Csv(s)
    }
}

impl<'a> From<&'a String> for TagInput<'a> {
    fn from(s: &'a String) -> Self {
        TagInput::Csv(s.as_str())
    }
}

impl<'a> From<&'a [String]> for TagInput<'a> {
    fn from(list: &'a [String]) -> Self {
        TagInput::List(list)
    }
}

impl<'a> From<&'a Vec<String>> for TagInput<'a> {
    fn from(list: &'a Vec<String>) -> Self {
        TagInput::List(list.as_slice())
    }
}

impl TagInput<'_> {
    /// Normalise into an ordered, de-duplicated slug list.
    pub fn normalized(&self) -> Vec<String> {
        match self {
            TagInput::Csv(s) => normalize_tags(s),
            TagInput::List(items) => dedupe(
                items
                    .iter()
                    .flat_map(|item| item.split(','))
                    .filter_map(slugify_tag),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TagInput::Csv(s) => s.trim().is_empty(),
            TagInput::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }
}

/// Split a comma-separated tag string into normalised slugs.
///
/// ```
/// use url2vault::normalize_tags;
///
/// assert_eq!(
///     normalize_tags("#News, Breaking_News, breaking-news"),
///     vec!["news", "breaking-news"],
/// );
/// ```
pub fn normalize_tags(input: &str) -> Vec<String> {
    dedupe(input.split(',').filter_map(slugify_tag))
}

/// Normalise one tag; `None` when nothing survives.
fn slugify_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);

    let mut slug = String::with_capacity(trimmed.len());
    for c in trimmed.to_lowercase().chars() {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            // whitespace, underscores and anything else become separators
            '-'
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

fn dedupe(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.filter(|t| seen.insert(t.clone())).collect()
}
