//! Directory entry count.

use std::path::Path;

/// Live entries in `dir`, not counting `.` and `..`.
pub fn entry_count(dir: &Path) -> Option<usize> {
    // std's read_dir already skips the dot entries
    let it = std::fs::read_dir(dir).ok()?;
    Some(it.filter(|e| e.is_ok()).count())
}

/// First entry of `dir`, for naming an example in explanations.
pub fn first_entry(dir: &Path) -> Option<std::ffi::OsString> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_live_entries() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(entry_count(dir.path()), Some(0));
        assert_eq!(first_entry(dir.path()), None);
        std::fs::write(dir.path().join("b"), b"").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        assert_eq!(entry_count(dir.path()), Some(2));
        assert_eq!(first_entry(dir.path()).as_deref(), Some(std::ffi::OsStr::new("a")));
    }

    #[test]
    fn test_missing_directory() {
        assert_eq!(entry_count(Path::new("/nonexistent/dir")), None);
    }
}
