//! Filesystem feature probe.
//!
//! Per-filesystem limits come from `pathconf(3)`; mount flags and the
//! filesystem type from `/proc/self/mountinfo`, falling back to
//! `statvfs(3)` flags where mountinfo is unavailable.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use explain_core::ktrace;

use crate::stat;

/// Symlink limit when the system does not report one: Linux hard-codes 40
/// in `fs/namei.c`, POSIX guarantees at least 8.
const FALLBACK_SYMLOOP: usize = if cfg!(target_os = "linux") { 40 } else { 8 };

fn pathconf(path: &Path, name: libc::c_int) -> Option<i64> {
    let c = CString::new(path.as_os_str().as_bytes()).ok()?;
    nix::errno::Errno::clear();
    // SAFETY: c is a valid NUL-terminated string.
    let v = unsafe { libc::pathconf(c.as_ptr(), name) };
    if v < 0 {
        ktrace!("pathconf {:?} {}: {}", path, name, nix::errno::Errno::last());
        return None;
    }
    Some(v as i64)
}

/// Longest file name component in the directory `dir`.
pub fn name_max(dir: &Path) -> usize {
    pathconf(dir, libc::_PC_NAME_MAX)
        .map(|v| v as usize)
        .unwrap_or(255)
}

/// Longest relative pathname starting at `dir`.
pub fn path_max(dir: &Path) -> usize {
    pathconf(dir, libc::_PC_PATH_MAX)
        .map(|v| v as usize)
        .unwrap_or(libc::PATH_MAX as usize)
}

/// Maximum hard link count for files on the filesystem holding `path`.
pub fn link_max(path: &Path) -> Option<u64> {
    pathconf(path, libc::_PC_LINK_MAX).map(|v| v as u64)
}

/// Maximum number of symbolic links followed in one resolution.
pub fn symlink_limit() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            // SAFETY: sysconf has no memory-safety preconditions.
            let v = unsafe { libc::sysconf(libc::_SC_SYMLOOP_MAX) };
            if v > 0 {
                return v as usize;
            }
        }
    }
    FALLBACK_SYMLOOP
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub mount_point: PathBuf,
    pub fs_type: String,
    pub source: String,
    pub read_only: bool,
    pub nosuid: bool,
    pub noexec: bool,
    pub nodev: bool,
}

/// Undo the octal escapes mountinfo uses for space, tab, newline, backslash.
fn unescape(field: &str) -> String {
    let b = field.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'\\' && i + 3 < b.len() && b[i + 1..i + 4].iter().all(|c| (b'0'..=b'7').contains(c)) {
            let v = b[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, c| acc * 8 + (c - b'0') as u32);
            out.push(v as u8);
            i += 4;
        } else {
            out.push(b[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn dev_major_minor(dev: u64) -> (u64, u64) {
    let major = ((dev >> 32) & 0xffff_f000) | ((dev >> 8) & 0xfff);
    let minor = ((dev >> 12) & 0xffff_ff00) | (dev & 0xff);
    (major, minor)
}

/// Parse one mountinfo line.
///
/// `36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue`
pub fn parse_mountinfo_line(line: &str) -> Option<((u64, u64), MountInfo)> {
    let (left, right) = line.split_once(" - ")?;
    let f: Vec<&str> = left.split(' ').collect();
    if f.len() < 6 {
        return None;
    }
    let (maj, min) = f[2].split_once(':')?;
    let devno = (maj.parse().ok()?, min.parse().ok()?);
    let opts: Vec<&str> = f[5].split(',').collect();
    let r: Vec<&str> = right.split(' ').collect();
    let super_opts: Vec<&str> = r.get(2).map(|s| s.split(',').collect()).unwrap_or_default();
    let has = |o: &str| opts.contains(&o);
    Some((
        devno,
        MountInfo {
            mount_point: PathBuf::from(unescape(f[4])),
            fs_type: r.first().map(|s| s.to_string()).unwrap_or_default(),
            source: r.get(1).map(|s| unescape(s)).unwrap_or_default(),
            read_only: has("ro") || super_opts.contains(&"ro"),
            nosuid: has("nosuid"),
            noexec: has("noexec"),
            nodev: has("nodev"),
        },
    ))
}

/// The mount holding `path` (which must exist).
pub fn mount_of(path: &Path) -> Option<MountInfo> {
    let st = stat::stat(path).ok()?;
    let want = dev_major_minor(st.dev);
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if let Ok(text) = std::fs::read_to_string("/proc/self/mountinfo") {
        // later lines shadow earlier mounts on the same device
        let found = text
            .lines()
            .filter_map(parse_mountinfo_line)
            .filter(|(d, m)| *d == want && abs.starts_with(&m.mount_point))
            .max_by_key(|(_, m)| m.mount_point.as_os_str().len());
        if let Some((_, m)) = found {
            return Some(m);
        }
    }
    let flags = statvfs_flags(path)?;
    Some(MountInfo {
        mount_point: PathBuf::new(),
        fs_type: String::new(),
        source: String::new(),
        read_only: flags.read_only,
        nosuid: flags.nosuid,
        noexec: flags.noexec,
        nodev: false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountFlags {
    pub read_only: bool,
    pub nosuid: bool,
    pub noexec: bool,
}

/// Mount flags of the filesystem holding `path`.
pub fn statvfs_flags(path: &Path) -> Option<MountFlags> {
    use nix::sys::statvfs::FsFlags;
    let vfs = statvfs(path)?;
    let fl = vfs.flags();
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            let noexec = fl.contains(FsFlags::ST_NOEXEC);
        } else {
            let noexec = false;
        }
    }
    Some(MountFlags {
        read_only: fl.contains(FsFlags::ST_RDONLY),
        nosuid: fl.contains(FsFlags::ST_NOSUID),
        noexec,
    })
}

/// Is the filesystem holding `path` mounted read-only?
pub fn is_read_only(path: &Path) -> Option<bool> {
    match mount_of(path) {
        Some(m) => Some(m.read_only),
        None => statvfs_flags(path).map(|f| f.read_only),
    }
}

/// Raw `statvfs(3)` of the filesystem holding `path`.
pub fn statvfs(path: &Path) -> Option<nix::sys::statvfs::Statvfs> {
    nix::sys::statvfs::statvfs(path).ok()
}

/// Free space as `(available blocks, block size, available inodes)`.
pub fn free_space(path: &Path) -> Option<(u64, u64, u64)> {
    let vfs = statvfs(path)?;
    Some((
        vfs.blocks_available() as u64,
        vfs.fragment_size() as u64,
        vfs.files_available() as u64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mountinfo_line() {
        let line = "36 35 98:0 /mnt1 /mnt\\0402 ro,noexec,nosuid master:1 - ext3 /dev/root rw,errors=continue";
        let (dev, m) = parse_mountinfo_line(line).unwrap();
        assert_eq!(dev, (98, 0));
        assert_eq!(m.mount_point, PathBuf::from("/mnt 2"));
        assert_eq!(m.fs_type, "ext3");
        assert_eq!(m.source, "/dev/root");
        assert!(m.read_only && m.noexec && m.nosuid && !m.nodev);
        assert!(parse_mountinfo_line("garbage").is_none());
    }

    #[test]
    fn test_limits_are_sane() {
        assert!(name_max(Path::new("/")) >= 14);
        assert!(path_max(Path::new("/")) >= 255);
        assert!(symlink_limit() >= 8);
    }

    #[test]
    fn test_root_mount_found() {
        let m = mount_of(Path::new("/"));
        assert!(m.is_some());
    }

    #[test]
    fn test_proc_is_separate_mount() {
        if let (Some(p), Some(r)) = (mount_of(Path::new("/proc")), mount_of(Path::new("/"))) {
            if !p.mount_point.as_os_str().is_empty() {
                assert_ne!(p.mount_point, r.mount_point);
            }
        }
    }
}
