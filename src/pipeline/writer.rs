//! Persist notes and reports without ever overwriting an existing file.
//!
//! Content is written to a temp file in the target directory, then persisted
//! with `persist_noclobber` under `name.md`, `name (2).md`, `name (3).md`...
//! so a half-written note never appears and a concurrent writer can't be
//! clobbered.

use crate::error::ImportError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Longest file stem produced by [`sanitize_filename`], in characters.
pub const MAX_FILENAME_CHARS: usize = 120;

/// Stem used when a title sanitises to nothing.
pub const FALLBACK_FILENAME: &str = "untitled";

/// Give up after this many numbered variants of one name.
const MAX_SUFFIX: u32 = 1000;

/// Make `title` safe as a file stem on every major filesystem.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = capped.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `dir/stem.ext` for `n == 1`, `dir/stem (n).ext` after that.
fn candidate_path(dir: &Path, stem: &str, extension: &str, n: u32) -> PathBuf {
    if n <= 1 {
        dir.join(format!("{stem}.{extension}"))
    } else {
        dir.join(format!("{stem} ({n}).{extension}"))
    }
}

/// Write a note named after `title` into `dir`; returns the path used.
///
/// Trailing whitespace is trimmed and exactly one newline appended.
pub async fn write_note(dir: &Path, title: &str, markdown: &str) -> Result<PathBuf, ImportError> {
    let content = format!("{}\n", markdown.trim_end());
    write_unique(dir, &sanitize_filename(title), "md", content).await
}

/// Write `content` to the first free `stem[ (n)].extension` in `dir`,
/// creating `dir` if needed.
pub async fn write_unique(
    dir: &Path,
    stem: &str,
    extension: &str,
    content: String,
) -> Result<PathBuf, ImportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ImportError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let dir = dir.to_path_buf();
    let stem = stem.to_string();
    let extension = extension.to_string();
    let path = tokio::task::spawn_blocking(move || persist_unique(&dir, &stem, &extension, &content))
        .await
        .map_err(|e| ImportError::Internal(format!("write task panicked: {e}")))??;

    info!("Wrote {}", path.display());
    Ok(path)
}

fn persist_unique(
    dir: &Path,
    stem: &str,
    extension: &str,
    content: &str,
) -> Result<PathBuf, ImportError> {
    let write_failed = |source: io::Error| ImportError::OutputWriteFailed {
        path: candidate_path(dir, stem, extension, 1),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(content.as_bytes()).map_err(write_failed)?;
    tmp.flush().map_err(write_failed)?;

    for n in 1..=MAX_SUFFIX {
        let path = candidate_path(dir, stem, extension, n);
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => {
                return Err(ImportError::OutputWriteFailed {
                    path,
                    source: e.error,
                })
            }
        }
    }

    Err(write_failed(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{MAX_SUFFIX} files named '{stem}' already exist"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_strips_reserved_characters() {
        assert_eq!(
            sanitize_filename("Drones: What's <next>? / Part 2"),
            "Drones What's next Part 2"
        );
        assert_eq!(sanitize_filename("  ...hidden.  "), "hidden");
        assert_eq!(sanitize_filename("a\tb\nc"), "a b c");
    }

    #[test]
    fn sanitize_falls_back_and_caps() {
        assert_eq!(sanitize_filename("???"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        let long = "é".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_CHARS);
    }

    #[tokio::test]
    async fn never_overwrites() {
        let dir = TempDir::new().unwrap();
        let first = write_note(dir.path(), "Same Title", "one  \n\n").await.unwrap();
        let second = write_note(dir.path(), "Same Title", "two").await.unwrap();
        let third = write_note(dir.path(), "Same Title", "three").await.unwrap();

        assert_eq!(first, dir.path().join("Same Title.md"));
        assert_eq!(second, dir.path().join("Same Title (2).md"));
        assert_eq!(third, dir.path().join("Same Title (3).md"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two\n");
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("vault").join("inbox");
        let path = write_unique(&nested, "report", "md", "x".into()).await.unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
        // no temp files left behind
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 1);
    }
}
