//! HTML extraction: article text, metadata, links and images from a web page.
//!
//! ## Strategy
//!
//! 1. Fetch the page with a browser User-Agent and parse it with `scraper`.
//! 2. Establish the base URL (`<base href>` if present, else the final
//!    response URL) so every relative link resolves.
//! 3. Score paragraph containers readability-style and take the best one as
//!    the main content. If that yields no text, fall back to the first
//!    `<article>`, then to `<body>`; the first non-empty text wins.
//! 4. Links and images come from the same node the text came from, one entry
//!    per source element. Missing or unresolvable URLs are dropped.
//!
//! Extraction is best-effort: an empty result is a warning for the caller,
//! never an error here.

use crate::error::ImportError;
use crate::output::{ExtractedContent, ExtractedFields, ImageRef, LinkRef};
use crate::pipeline::fetch;
use crate::pipeline::text::{collapse_whitespace, source_guess, split_authors, tidy_paragraphs, truncate_text};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Meta selectors for the publication date, highest priority first.
const PUBLISHED_SELECTORS: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="article:published_time"]"#,
    r#"meta[itemprop="datePublished"]"#,
    r#"meta[property="og:published_time"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="publishdate"]"#,
    r#"meta[name="publish-date"]"#,
    r#"meta[name="sailthru.date"]"#,
    r#"meta[name="DC.date.issued"]"#,
    r#"meta[name="dc.date.issued"]"#,
    r#"meta[name="dcterms.created"]"#,
    r#"meta[name="date"]"#,
];

/// Meta selectors carrying a byline in `content`.
const AUTHOR_META_SELECTORS: &[&str] = &[
    r#"meta[name="author"]"#,
    r#"meta[property="article:author"]"#,
    r#"meta[name="parsely-author"]"#,
    r#"meta[name="byl"]"#,
    r#"meta[name="DC.creator"]"#,
    r#"meta[name="dc.creator"]"#,
];

/// Elements whose text is a byline.
const AUTHOR_ELEMENT_SELECTORS: &[&str] = &[
    r#"[rel="author"]"#,
    r#"[itemprop="author"]"#,
    ".byline",
    ".author",
];

const TITLE_META_SELECTORS: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
];

/// Never part of readable text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "button", "select", "form",
];

/// Page chrome, skipped inside the scored main content.
const CHROME_TAGS: &[&str] = &["nav", "aside", "footer", "header"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "blockquote", "pre", "table", "tr", "figure", "figcaption", "dl", "dt", "dd", "hr",
];

/// Paragraphs shorter than this (in characters) carry no score.
const MIN_PARAGRAPH_CHARS: usize = 25;

static SEL_PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, pre, td, blockquote").unwrap());
static SEL_ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static SEL_BASE: Lazy<Selector> = Lazy::new(|| Selector::parse("base[href]").unwrap());
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static SEL_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static SEL_ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SEL_IMAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

static SEL_PUBLISHED: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(PUBLISHED_SELECTORS));
static SEL_AUTHOR_META: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(AUTHOR_META_SELECTORS));
static SEL_AUTHOR_ELEMENTS: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_all(AUTHOR_ELEMENT_SELECTORS));
static SEL_TITLE_META: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(TITLE_META_SELECTORS));

static RE_POSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|main|page|post|text|story").unwrap()
});
static RE_NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)comment|meta|footer|footnote|sidebar|share|social|related|promo|nav|menu|widget|advert|cookie|newsletter",
    )
    .unwrap()
});

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// Fetch `url` and extract its article content.
///
/// # Errors
/// [`ImportError::FetchFailed`] for status ≥ 400 and [`ImportError::Network`]
/// when no response arrives. Poor or empty extraction is not an error.
pub async fn extract_html(
    client: &Client,
    url: &str,
    max_chars: usize,
) -> Result<ExtractedContent, ImportError> {
    let page = fetch::fetch_text(client, url).await?;
    Ok(extract_from_html(&page.body, &page.final_url, max_chars))
}

/// Extract article content from an already-downloaded HTML document.
pub fn extract_from_html(html: &str, page_url: &Url, max_chars: usize) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let base = base_url(&doc, page_url);

    let main = find_main_content(&doc);
    let article = doc.select(&SEL_ARTICLE).next();
    let body = doc.select(&SEL_BODY).next();

    let candidates = [(main, true), (article, false), (body, false)];
    let (text, root) = candidates
        .into_iter()
        .filter_map(|(el, strip_chrome)| el.map(|el| (visible_text(el, strip_chrome), el)))
        .find(|(text, _)| !text.is_empty())
        .unwrap_or_else(|| (String::new(), doc.root_element()));

    if text.is_empty() {
        warn!(url = %page_url, "no readable text found in page");
    } else {
        debug!(chars = text.chars().count(), root = root.value().name(), "main content selected");
    }

    let byline = extract_byline(&doc);

    ExtractedContent::Article(ExtractedFields {
        title: extract_title(&doc),
        authors: byline.map(|b| split_authors(&b)).unwrap_or_default(),
        published: extract_published(&doc),
        text: truncate_text(&text, max_chars),
        source_guess: source_guess(page_url),
        links: extract_links(root, &base),
        images: extract_images(root, &base),
    })
}

// ── Base URL ─────────────────────────────────────────────────────────────

fn base_url(doc: &Html, page_url: &Url) -> Url {
    doc.select(&SEL_BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

// ── Main content scoring ─────────────────────────────────────────────────

/// Pick the element with the highest readability score, if any paragraph scored.
fn find_main_content(doc: &Html) -> Option<ElementRef<'_>> {
    let mut scores: HashMap<_, (ElementRef<'_>, f64)> = HashMap::new();

    for para in doc.select(&SEL_PARAGRAPHS) {
        if in_unlikely_container(para) {
            continue;
        }
        let text = collapse_whitespace(&para.text().collect::<String>());
        let len = text.chars().count();
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let commas = text.matches(',').count() as f64;
        let score = 1.0 + commas + (len as f64 / 100.0).min(3.0);

        let parent = para.parent().and_then(ElementRef::wrap);
        if let Some(parent) = parent {
            scores
                .entry(parent.id())
                .or_insert((parent, class_weight(parent)))
                .1 += score;

            if let Some(grand) = parent.parent().and_then(ElementRef::wrap) {
                scores
                    .entry(grand.id())
                    .or_insert((grand, class_weight(grand)))
                    .1 += score / 2.0;
            }
        }
    }

    scores
        .into_values()
        .map(|(el, score)| (el, score * (1.0 - link_density(el))))
        .filter(|(_, score)| *score > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(el, _)| el)
}

fn class_weight(el: ElementRef<'_>) -> f64 {
    let attrs = format!(
        "{} {}",
        el.value().attr("class").unwrap_or(""),
        el.value().attr("id").unwrap_or("")
    );
    let mut weight = 0.0;
    if RE_POSITIVE.is_match(&attrs) {
        weight += 25.0;
    }
    if RE_NEGATIVE.is_match(&attrs) {
        weight -= 25.0;
    }
    weight
}

fn link_density(el: ElementRef<'_>) -> f64 {
    let total = el.text().map(|t| t.trim().len()).sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let linked = el
        .select(&SEL_ANCHORS)
        .flat_map(|a| a.text())
        .map(|t| t.trim().len())
        .sum::<usize>();
    (linked as f64 / total as f64).min(1.0)
}

fn in_unlikely_container(el: ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(|a| {
        let name = a.value().name();
        CHROME_TAGS.contains(&name) || SKIP_TAGS.contains(&name)
    })
}

// ── Text ─────────────────────────────────────────────────────────────────

/// Readable text of `el`: block elements become paragraphs, scripts and
/// styles are dropped, and with `strip_chrome` navigation/asides go too.
fn visible_text(el: ElementRef<'_>, strip_chrome: bool) -> String {
    let mut out = String::new();
    walk_text(el, strip_chrome, &mut out);
    tidy_paragraphs(&out)
}

fn walk_text(el: ElementRef<'_>, strip_chrome: bool, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let s: &str = text;
                if s.trim().is_empty() {
                    if !s.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                    continue;
                }
                if s.starts_with(char::is_whitespace) && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(&collapse_whitespace(s));
                if s.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
            }
            Node::Element(element) => {
                let name = element.name();
                if SKIP_TAGS.contains(&name) || (strip_chrome && CHROME_TAGS.contains(&name)) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk_text(child_el, strip_chrome, out);
                }
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

// ── Metadata ─────────────────────────────────────────────────────────────

fn meta_content<'a>(doc: &'a Html, selectors: &[Selector]) -> Option<&'a str> {
    selectors.iter().find_map(|sel| {
        doc.select(sel)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|v| !v.is_empty())
    })
}

fn extract_title(doc: &Html) -> String {
    if let Some(title) = meta_content(doc, &SEL_TITLE_META) {
        return collapse_whitespace(title);
    }
    [&*SEL_TITLE, &*SEL_H1]
        .iter()
        .find_map(|sel| {
            doc.select(sel)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|t| !t.is_empty())
        })
        .unwrap_or_default()
}

fn extract_published(doc: &Html) -> String {
    if let Some(date) = meta_content(doc, &SEL_PUBLISHED) {
        return date.to_string();
    }
    doc.select(&SEL_TIME)
        .filter_map(|el| el.value().attr("datetime"))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

fn extract_byline(doc: &Html) -> Option<String> {
    let from_meta = SEL_AUTHOR_META.iter().find_map(|sel| {
        doc.select(sel)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            // article:author is often a profile URL rather than a name
            .find(|v| !v.is_empty() && !v.starts_with("http"))
            .map(str::to_string)
    });
    if from_meta.is_some() {
        return from_meta;
    }

    SEL_AUTHOR_ELEMENTS.iter().find_map(|sel| {
        doc.select(sel)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty() && t.chars().count() <= 200)
    })
}

// ── Links & images ───────────────────────────────────────────────────────

fn extract_links(root: ElementRef<'_>, base: &Url) -> Vec<LinkRef> {
    root.select(&SEL_ANCHORS)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let resolved = base.join(href.trim()).ok()?;
            Some(LinkRef {
                text: collapse_whitespace(&a.text().collect::<String>()),
                href: resolved.to_string(),
            })
        })
        .collect()
}

fn extract_images(root: ElementRef<'_>, base: &Url) -> Vec<ImageRef> {
    root.select(&SEL_IMAGES)
        .filter_map(|img| {
            let src = img.value().attr("src")?;
            let resolved = base.join(src.trim()).ok()?;
            Some(ImageRef {
                alt: collapse_whitespace(img.value().attr("alt").unwrap_or("")),
                src: resolved.to_string(),
            })
        })
        .collect()
}
