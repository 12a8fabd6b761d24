//! Frontmatter validation and bounded repair of model output.
//!
//! A note is accepted only when it starts with a `---` line, has a later
//! closing `---` line, and the block in between parses as a YAML mapping.
//!
//! Cleanup runs first, in this order:
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (BOM, zero-width spaces, soft hyphens)
//! 3. Strip an outer code fence when the whole response is wrapped in one
//!
//! When the header fails to parse, repairs are tried in order and the first
//! one that yields a mapping replaces the header:
//! 1. Double stray backslashes inside double-quoted values (`"C:\Temp"`)
//! 2. Re-quote backslash-bearing double-quoted values with single quotes
//!
//! If none works the original parse error is returned.

use crate::error::ImportError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// Header delimiter line.
pub const DELIMITER: &str = "---";

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|yaml)?[ \t]*\n(.*)\n```\s*$").unwrap()
});

static RE_QUOTED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<prefix>\s*(?:-\s+)?(?:[A-Za-z0-9_][\w-]*:\s+)?)"(?P<value>.*)"\s*$"#)
        .unwrap()
});

static RE_DOUBLE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|"[^"]*"#).unwrap());

/// Characters YAML accepts after a backslash in a double-quoted scalar.
const YAML_ESCAPES: &[char] = &[
    '0', 'a', 'b', 't', '\t', 'n', 'v', 'f', 'r', 'e', ' ', '"', '/', '\\', 'N', '_', 'L', 'P',
    'x', 'u', 'U',
];

type Repair = fn(&str) -> String;

const REPAIRS: &[(&str, Repair)] = &[
    ("double stray backslashes", double_stray_backslashes),
    ("single-quote backslash values", single_quote_backslash_values),
];

/// Validate (and if needed repair) the frontmatter of a model response.
///
/// Returns the cleaned note. A valid header is returned unchanged; a repaired
/// header replaces the original in place.
///
/// # Errors
/// [`ImportError::Frontmatter`] when a delimiter is missing, the header is not
/// a mapping, or it does not parse even after repair.
pub fn ensure_frontmatter_present(raw: &str) -> Result<String, ImportError> {
    let cleaned = clean_response(raw);
    let parts = split_note(&cleaned)?;

    match parse_mapping(parts.header) {
        Ok(_) => Ok(cleaned),
        Err(HeaderError::NotMapping) => Err(not_mapping()),
        Err(HeaderError::Yaml(original)) => {
            for (name, repair) in REPAIRS {
                let candidate = repair(parts.header);
                if candidate == parts.header {
                    continue;
                }
                if parse_mapping(&candidate).is_ok() {
                    debug!(repair = name, "frontmatter repaired");
                    return Ok(format!(
                        "{DELIMITER}\n{candidate}\n{DELIMITER}{}",
                        parts.after
                    ));
                }
            }
            warn!(error = %original, "frontmatter could not be repaired");
            Err(ImportError::Frontmatter(format!(
                "frontmatter is not valid YAML: {original}"
            )))
        }
    }
}

/// The `title` property of a validated note, if it is a non-empty string.
pub fn frontmatter_title(note: &str) -> Option<String> {
    let parts = split_note(note).ok()?;
    let mapping = parse_mapping(parts.header).ok()?;
    mapping
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ── Cleanup ──────────────────────────────────────────────────────────────

fn clean_response(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    strip_markdown_fences(&s).trim_start().to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Splitting & parsing ──────────────────────────────────────────────────

struct NoteParts<'a> {
    header: &'a str,
    /// Everything after the closing delimiter, starting with its newline.
    after: &'a str,
}

fn split_note(note: &str) -> Result<NoteParts<'_>, ImportError> {
    let first_end = note.find('\n').unwrap_or(note.len());
    if note[..first_end].trim_end() != DELIMITER {
        return Err(ImportError::Frontmatter(
            "note does not start with a '---' frontmatter delimiter".to_string(),
        ));
    }

    let header_start = (first_end + 1).min(note.len());
    let mut offset = header_start;
    for line in note[header_start..].split_inclusive('\n') {
        let content = line.trim_end_matches('\n');
        if content.trim_end() == DELIMITER {
            let header_end = offset.saturating_sub(1).max(header_start);
            return Ok(NoteParts {
                header: &note[header_start..header_end],
                after: &note[offset + content.len()..],
            });
        }
        offset += line.len();
    }

    Err(ImportError::Frontmatter(
        "frontmatter is missing its closing '---' delimiter".to_string(),
    ))
}

enum HeaderError {
    Yaml(serde_yaml::Error),
    NotMapping,
}

fn parse_mapping(header: &str) -> Result<Mapping, HeaderError> {
    if header.trim().is_empty() {
        return Err(HeaderError::NotMapping);
    }
    match serde_yaml::from_str::<Value>(header).map_err(HeaderError::Yaml)? {
        Value::Mapping(m) => Ok(m),
        _ => Err(HeaderError::NotMapping),
    }
}

fn not_mapping() -> ImportError {
    ImportError::Frontmatter("frontmatter must be a key/value mapping".to_string())
}

// ── Repairs ──────────────────────────────────────────────────────────────

/// `"C:\Temp\x"` → `"C:\\Temp\\x"`; valid escapes are left alone.
fn double_stray_backslashes(header: &str) -> String {
    RE_DOUBLE_QUOTED
        .replace_all(header, |caps: &regex::Captures| {
            let quoted = &caps[0];
            let mut out = String::with_capacity(quoted.len() + 8);
            let mut chars = quoted.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    out.push(c);
                    continue;
                }
                match chars.peek() {
                    Some(&next) if YAML_ESCAPES.contains(&next) => {
                        out.push('\\');
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push_str("\\\\"),
                }
            }
            out
        })
        .into_owned()
}

/// `path: "C:\Users"` → `path: 'C:\Users'` (single quotes take backslashes literally).
fn single_quote_backslash_values(header: &str) -> String {
    header
        .lines()
        .map(|line| match RE_QUOTED_LINE.captures(line) {
            Some(caps) if caps["value"].contains('\\') => {
                format!("{}'{}'", &caps["prefix"], caps["value"].replace('\'', "''"))
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "---\ntitle: \"Example headline\"\ntags:\n  - news\n---\n\n## Summary\n- point\n";

    #[test]
    fn valid_note_is_unchanged() {
        assert_eq!(ensure_frontmatter_present(VALID).unwrap(), VALID);
    }

    #[test]
    fn fenced_response_is_unwrapped() {
        let fenced = format!("```markdown\n{}\n```", VALID.trim_end());
        let out = ensure_frontmatter_present(&fenced).unwrap();
        assert!(out.starts_with("---\ntitle:"));
        assert!(!out.contains("```"));
    }

    #[test]
    fn crlf_and_bom_are_normalised() {
        let raw = format!("\u{FEFF}{}", VALID.replace('\n', "\r\n"));
        assert_eq!(ensure_frontmatter_present(&raw).unwrap(), VALID);
    }

    #[test]
    fn missing_opening_delimiter_fails() {
        let err = ensure_frontmatter_present("title: x\n---\nbody").unwrap_err();
        assert!(matches!(err, ImportError::Frontmatter(_)));
        assert!(err.to_string().contains("does not start"));
    }

    #[test]
    fn missing_closing_delimiter_fails() {
        let err = ensure_frontmatter_present("---\ntitle: x\nbody text").unwrap_err();
        assert!(err.to_string().contains("closing"));
    }

    #[test]
    fn non_mapping_header_fails() {
        let err = ensure_frontmatter_present("---\n- a\n- b\n---\nbody").unwrap_err();
        assert!(err.to_string().contains("mapping"));
        let err = ensure_frontmatter_present("---\n---\nbody").unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn stray_backslash_is_repaired() {
        let raw = "---\ntitle: \"Report\"\npath: \"C:\\Temp\\docs\"\n---\nbody\n";
        let out = ensure_frontmatter_present(raw).unwrap();
        assert!(out.contains(r#"path: "C:\\Temp\\docs""#), "got: {out}");
        assert!(out.ends_with("---\nbody\n"));
        assert_eq!(frontmatter_title(&out).as_deref(), Some("Report"));
    }

    #[test]
    fn unicode_escape_lookalike_falls_through_to_single_quotes() {
        // `\U` is a valid escape prefix, so only re-quoting fixes it
        let raw = "---\npath: \"C:\\Users\\docs\"\n---\n";
        let out = ensure_frontmatter_present(raw).unwrap();
        assert!(out.contains(r"path: 'C:\Users\docs'"), "got: {out}");
    }

    #[test]
    fn broken_yaml_without_repair_reports_parse_error() {
        let err = ensure_frontmatter_present("---\ntitle: [unclosed\n---\nbody").unwrap_err();
        assert!(err.to_string().contains("not valid YAML"), "got: {err}");
    }

    #[test]
    fn single_quote_repair_escapes_quotes() {
        let out = single_quote_backslash_values(r#"  - "it's a\path""#);
        assert_eq!(out, r#"  - 'it''s a\path'"#);
    }

    #[test]
    fn double_backslash_repair_keeps_valid_escapes() {
        assert_eq!(
            double_stray_backslashes(r#"a: "x\ny\q""#),
            r#"a: "x\ny\\q""#
        );
    }

    #[test]
    fn title_lookup() {
        assert_eq!(frontmatter_title(VALID).as_deref(), Some("Example headline"));
        assert_eq!(frontmatter_title("no header"), None);
        assert_eq!(frontmatter_title("---\nsource: x\n---\n"), None);
    }
}
