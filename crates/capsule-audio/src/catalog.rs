//! File catalog: enumerates recording files, finds the most recent, and
//! resolves peer-provided names with validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no .raw recording files found")]
    NotFound,
    #[error("invalid filename")]
    Invalid,
    #[error("resolved path is not a non-empty regular file")]
    NoFile,
    #[error("index out of range")]
    InvalidIndex,
}

pub type Result<T> = std::result::Result<T, CatalogError>;

fn is_raw_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("raw"))
}

fn list_raw_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_raw_file(p))
        .collect()
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Scans `dir` and returns the `.raw` file (case-insensitive extension)
/// with the largest modification time.
pub fn find_latest(dir: &Path) -> Result<PathBuf> {
    list_raw_files(dir)
        .into_iter()
        .max_by_key(|p| modified(p))
        .ok_or(CatalogError::NotFound)
}

/// Total number of `.raw` recording files in `dir`.
pub fn file_count(dir: &Path) -> usize {
    list_raw_files(dir).len()
}

/// Sequential `rNNN.raw` name for the next recording, based on how many
/// `.raw` files are already present. Three digits, per the on-disk naming
/// convention; callers that need uniqueness beyond 999 files should fall
/// back to a timestamp-based name.
pub fn next_sequential_name(dir: &Path) -> String {
    let count = list_raw_files(dir).len();
    format!("r{:03}.raw", (count + 1).min(999))
}

/// Enumerates `.raw` files, sorted by modification time descending (stable
/// sort so same-timestamp files keep directory order), and returns the path
/// at position `index`.
pub fn select_by_index(dir: &Path, index: usize) -> Result<PathBuf> {
    let mut files = list_raw_files(dir);
    files.sort_by_key(|p| std::cmp::Reverse(modified(p)));
    files.into_iter().nth(index).ok_or(CatalogError::InvalidIndex)
}

/// Validates and resolves a peer-provided filename: non-empty, length in
/// `[1, 255]`, only `[A-Za-z0-9._-]`, no `..`, `/`, or `\` substrings.
/// Appends `.raw` if missing, and requires the resolved path to be a
/// non-empty regular file.
pub fn resolve_name(dir: &Path, request: &str) -> Result<PathBuf> {
    if request.is_empty() || request.len() > 255 {
        return Err(CatalogError::Invalid);
    }
    if !request
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(CatalogError::Invalid);
    }
    if request.contains("..") || request.contains('/') || request.contains('\\') {
        return Err(CatalogError::Invalid);
    }

    let with_ext = if request.to_ascii_lowercase().ends_with(".raw") {
        request.to_string()
    } else {
        format!("{request}.raw")
    };

    let path = dir.join(with_ext);
    let is_nonempty_file = fs::metadata(&path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !is_nonempty_file {
        return Err(CatalogError::NoFile);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::thread::sleep;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn finds_most_recently_modified_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "r001.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        sleep(Duration::from_millis(10));
        let newest = touch(dir.path(), "r002.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        touch(dir.path(), "notes.txt", b"ignore me");

        assert_eq!(find_latest(dir.path()).unwrap(), newest);
    }

    #[test]
    fn find_latest_errors_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_latest(dir.path()), Err(CatalogError::NotFound));
    }

    #[test]
    fn select_by_index_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(dir.path(), "r001.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        sleep(Duration::from_millis(10));
        let second = touch(dir.path(), "r002.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

        assert_eq!(select_by_index(dir.path(), 0).unwrap(), second);
        assert_eq!(select_by_index(dir.path(), 1).unwrap(), first);
        assert_eq!(
            select_by_index(dir.path(), 2),
            Err(CatalogError::InvalidIndex)
        );
    }

    #[test]
    fn resolve_name_accepts_valid_names_and_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

        assert_eq!(resolve_name(dir.path(), "a").unwrap(), dir.path().join("a.raw"));
        assert_eq!(
            resolve_name(dir.path(), "a.raw").unwrap(),
            dir.path().join("a.raw")
        );
    }

    #[test]
    fn resolve_name_rejects_traversal_and_separators() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_name(dir.path(), "../x"), Err(CatalogError::Invalid));
        assert_eq!(resolve_name(dir.path(), "a/b"), Err(CatalogError::Invalid));
        assert_eq!(resolve_name(dir.path(), "a\\b"), Err(CatalogError::Invalid));
    }

    #[test]
    fn resolve_name_rejects_overlong_names() {
        let dir = tempfile::tempdir().unwrap();
        let long_name = "a".repeat(300);
        assert_eq!(
            resolve_name(dir.path(), &long_name),
            Err(CatalogError::Invalid)
        );
    }

    #[test]
    fn resolve_name_reports_missing_or_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_name(dir.path(), "missing"), Err(CatalogError::NoFile));

        touch(dir.path(), "empty.raw", b"");
        assert_eq!(resolve_name(dir.path(), "empty"), Err(CatalogError::NoFile));
    }

    #[test]
    fn next_sequential_name_counts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_sequential_name(dir.path()), "r001.raw");
        touch(dir.path(), "r001.raw", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(next_sequential_name(dir.path()), "r002.raw");
    }

    #[test]
    fn catalog_listing_ignores_case_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "r001.RAW", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(find_latest(dir.path()).unwrap(), path);
        let _ = fs::metadata(dir.path());
    }
}
