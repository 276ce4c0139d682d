//! Same-device probe.

use std::path::{Path, PathBuf};

use crate::stat;

/// Directory that holds `path`: its parent, or `.` for a bare name.
fn containing_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
        Some(p) => p.to_path_buf(),
        None => path.to_path_buf(),
    }
}

/// Device number of the filesystem `path` lives (or would live) on.
pub fn device_of(path: &Path) -> Option<u64> {
    stat::stat(&containing_dir(path)).ok().map(|s| s.dev)
}

/// Do `a` and `b` live on the same mounted filesystem?
///
/// The containing directories are compared, so neither path needs to
/// exist itself.
pub fn same_device(a: &Path, b: &Path) -> Option<bool> {
    Some(device_of(a)? == device_of(b)?)
}
