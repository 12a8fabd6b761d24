//! URL list parsing: free-form text or CSV → validated [`UrlEntry`] values.
//!
//! Two input shapes are accepted:
//!
//! * **CSV with a header row**: detected when the first line has a comma and
//!   a header cell naming a known column. The URL and label columns are found
//!   by keyword.
//! * **Bare list**: one URL per line, optionally followed by `,label`.
//!   Lines starting with `#` or `//` are comments.
//!
//! Parsing never fails as a whole: bad rows become [`ParseInputError`]s next
//! to the good entries, and duplicate URLs are dropped silently.

use crate::error::ParseInputError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Header keywords that identify the URL column, in priority order.
pub const URL_COLUMN_KEYWORDS: &[&str] = &["url", "link", "href", "source", "uri", "address"];

/// Header keywords that identify the label column, in priority order.
pub const LABEL_COLUMN_KEYWORDS: &[&str] = &["label", "title", "name", "description", "desc"];

/// A target URL with an optional human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    /// Absolute http/https URL.
    pub url: String,
    pub label: Option<String>,
}

impl UrlEntry {
    /// Build an entry from a single URL, normalising and validating it.
    pub fn parse(candidate: &str) -> Result<Self, String> {
        Ok(Self {
            url: normalize_url(candidate)?,
            label: None,
        })
    }
}

/// Entries and row errors from one parse pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUrlInput {
    pub entries: Vec<UrlEntry>,
    pub errors: Vec<ParseInputError>,
}

/// Parse free-form text or CSV into URL entries.
pub fn parse_url_input(text: &str) -> ParsedUrlInput {
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let mut collector = Collector::default();

    match lines.first() {
        Some((_, first)) if looks_like_csv_header(first) => {
            debug!("URL input detected as CSV with header");
            parse_csv(&lines, &mut collector);
        }
        _ => parse_list(&lines, &mut collector),
    }

    collector.finish()
}

/// Normalise a candidate URL: default to `https://` and require http/https.
pub fn normalize_url(candidate: &str) -> Result<String, String> {
    let trimmed = candidate
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>')
        .trim();
    if trimmed.is_empty() {
        return Err("empty URL".to_string());
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&with_scheme).map_err(|e| format!("invalid URL: {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed.to_string()),
        _ => Err("URL has no host".to_string()),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

#[derive(Default)]
struct Collector {
    seen: HashSet<String>,
    out: ParsedUrlInput,
}

impl Collector {
    fn push(&mut self, line: usize, raw_url: &str, label: Option<String>) {
        match normalize_url(raw_url) {
            Ok(url) => {
                if self.seen.insert(url.clone()) {
                    self.out.entries.push(UrlEntry { url, label });
                } else {
                    debug!(line, %url, "duplicate URL skipped");
                }
            }
            Err(reason) => self.out.errors.push(ParseInputError {
                line,
                input: raw_url.trim().to_string(),
                reason,
            }),
        }
    }

    fn finish(self) -> ParsedUrlInput {
        self.out
    }
}

fn looks_like_csv_header(line: &str) -> bool {
    if !line.contains(',') {
        return false;
    }
    let cells: Vec<String> = split_csv_line(line)
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    // "https://site/source, Title" is a bare-list row, not a header
    if cells.iter().any(|c| looks_like_url(c)) {
        return false;
    }
    cells.iter().any(|cell| {
        URL_COLUMN_KEYWORDS
            .iter()
            .chain(LABEL_COLUMN_KEYWORDS)
            .any(|kw| cell.contains(kw))
    })
}

fn looks_like_url(cell: &str) -> bool {
    cell.contains("://")
        || cell.starts_with("www.")
        || (cell.contains('.') && !cell.contains(char::is_whitespace))
}

fn parse_csv(lines: &[(usize, &str)], collector: &mut Collector) {
    let Some(((_, header_line), rows)) = lines.split_first() else {
        return;
    };
    let headers: Vec<String> = split_csv_line(header_line)
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let url_col = find_column(&headers, URL_COLUMN_KEYWORDS, None).unwrap_or(0);
    let label_col = find_column(&headers, LABEL_COLUMN_KEYWORDS, Some(url_col));
    debug!(url_col, ?label_col, "CSV columns detected");

    for (line_no, line) in rows {
        let cells = split_csv_line(line);
        let raw_url = cells.get(url_col).map(|s| s.trim()).unwrap_or("");
        if raw_url.is_empty() {
            collector.out.errors.push(ParseInputError {
                line: *line_no,
                input: line.trim().to_string(),
                reason: "missing URL column value".to_string(),
            });
            continue;
        }
        let label = label_col
            .and_then(|i| cells.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        collector.push(*line_no, raw_url, label);
    }
}

fn parse_list(lines: &[(usize, &str)], collector: &mut Collector) {
    for (line_no, line) in lines {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let (raw_url, label) = match line.split_once(',') {
            Some((url, label)) => {
                let label = label.trim();
                (url, (!label.is_empty()).then(|| label.to_string()))
            }
            None => (line, None),
        };
        collector.push(*line_no, raw_url, label);
    }
}

/// Exact keyword match first, then substring match; keywords in priority order.
fn find_column(headers: &[String], keywords: &[&str], exclude: Option<usize>) -> Option<usize> {
    let allowed = |i: &usize| Some(*i) != exclude;
    keywords
        .iter()
        .find_map(|kw| headers.iter().position(|h| h == kw).filter(allowed))
        .or_else(|| {
            keywords
                .iter()
                .find_map(|kw| headers.iter().position(|h| h.contains(kw)).filter(allowed))
        })
}

/// Split one CSV line, honouring double quotes and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}
