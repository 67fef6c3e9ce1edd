//! Filesystem helpers: destination directories, batch output names, and file stats.

use crate::catalog::OutputFormat;
use crate::error::DispatchError;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::path::Path;

/// Create every missing ancestor directory of `output`.
pub fn ensure_writable(output: &Path) -> Result<(), DispatchError> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Create `dir` and all of its ancestors.
pub fn ensure_dir(dir: &Path) -> Result<(), DispatchError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| DispatchError::filesystem("failed to create directory", dir, e))
}

/// Output file name for one batch item: input stem + suffix + extension.
///
/// The extension is `format` when given, otherwise the input's own
/// extension (kept as spelled). Names are not deduplicated: two sizes with
/// the same suffix map to the same file.
///
/// ```
/// use imagician::catalog::OutputFormat;
/// use imagician::paths::derive_batch_name;
/// use std::path::Path;
///
/// let input = Path::new("/photos/beach.JPG");
/// assert_eq!(derive_batch_name(input, "-thumb", None), "beach-thumb.JPG");
/// assert_eq!(derive_batch_name(input, "@2x", Some(OutputFormat::Webp)), "beach@2x.webp");
/// ```
pub fn derive_batch_name(input: &Path, suffix: &str, format: Option<OutputFormat>) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let extension: Option<Cow<'_, str>> = match format {
        Some(format) => Some(format.as_str().into()),
        None => input.extension().map(|e| e.to_string_lossy()),
    };
    match extension {
        Some(ext) => format!("{stem}{suffix}.{ext}"),
        None => format!("{stem}{suffix}"),
    }
}

/// Size and modification time of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

pub fn stat(path: &Path) -> Result<FileStat, DispatchError> {
    let metadata =
        std::fs::metadata(path).map_err(|e| DispatchError::filesystem("failed to stat", path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| DispatchError::filesystem("failed to read modification time of", path, e))?;
    Ok(FileStat {
        size: metadata.len(),
        modified: DateTime::<Utc>::from(modified),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn ensure_writable_creates_missing_ancestors() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("a/b/c/out.png");
        ensure_writable(&output).unwrap();
        assert!(tmp.path().join("a/b/c").is_dir());
        assert!(!output.exists());
    }

    #[test]
    fn ensure_writable_accepts_bare_file_name() {
        ensure_writable(Path::new("out.png")).unwrap();
    }

    #[test]
    fn ensure_dir_fails_under_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let err = ensure_dir(&blocker.join("sub")).unwrap_err();
        assert_eq!(err.kind(), "filesystem");
        assert!(err.to_string().contains("failed to create directory"));
    }

    #[test]
    fn batch_name_keeps_original_extension() {
        assert_eq!(
            derive_batch_name(Path::new("in/photo.jpeg"), "-small", None),
            "photo-small.jpeg"
        );
    }

    #[test]
    fn batch_name_uses_format_spelling() {
        assert_eq!(
            derive_batch_name(Path::new("photo.png"), "-small", Some(OutputFormat::Jpg)),
            "photo-small.jpg"
        );
        assert_eq!(
            derive_batch_name(Path::new("photo.png"), "-small", Some(OutputFormat::Jpeg)),
            "photo-small.jpeg"
        );
    }

    #[test]
    fn batch_name_only_strips_last_extension() {
        assert_eq!(
            derive_batch_name(Path::new("archive.v2.png"), "_1x", None),
            "archive.v2_1x.png"
        );
    }

    #[test]
    fn batch_name_without_extension() {
        assert_eq!(derive_batch_name(Path::new("raw"), "-x", None), "raw-x");
    }

    #[test]
    fn stat_reports_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.bin");
        fs::write(&path, vec![7u8; 1234]).unwrap();
        let stat = stat(&path).unwrap();
        assert_eq!(stat.size, 1234);
        assert!(stat.modified <= Utc::now());
    }

    #[test]
    fn stat_missing_file_is_filesystem_error() {
        let tmp = TempDir::new().unwrap();
        let err = stat(&tmp.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), "filesystem");
    }
}
