//! Which other processes hold a file.
//!
//! Scans `/proc/<pid>/{exe,cwd,root,fd/*}` and matches on device and
//! inode. Entries belonging to other users are usually unreadable and are
//! silently skipped, so the result is a lower bound.

use std::path::{Path, PathBuf};

use explain_core::ktrace;

use crate::{fildes, stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldKind {
    /// Running it as a program
    Exe,
    Cwd,
    Root,
    Fd(i32),
}

impl HoldKind {
    pub fn describe(&self) -> &'static str {
        match self {
            HoldKind::Exe => "executing",
            HoldKind::Cwd => "using as current directory",
            HoldKind::Root => "using as root directory",
            HoldKind::Fd(_) => "holding open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub pid: i32,
    /// Short command name from `/proc/<pid>/comm`
    pub command: String,
    pub how: HoldKind,
}

fn process_dirs() -> Vec<(i32, PathBuf)> {
    let Ok(rd) = std::fs::read_dir("/proc") else {
        ktrace!("pids: /proc unavailable");
        return Vec::new();
    };
    let me = std::process::id() as i32;
    rd.filter_map(|e| e.ok())
        .filter_map(|e| {
            let pid: i32 = e.file_name().to_str()?.parse().ok()?;
            (pid != me).then(|| (pid, e.path()))
        })
        .collect()
}

fn command_of(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("comm"))
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

/// Other processes holding `path`, whatever way they hold it.
pub fn holders_of_path(path: &Path) -> Vec<Holder> {
    let Ok(want) = stat::stat(path) else {
        return Vec::new();
    };
    let key = (want.dev, want.ino);
    let same = |p: &Path| stat::stat(p).map(|s| (s.dev, s.ino) == key).unwrap_or(false);

    let mut out = Vec::new();
    for (pid, dir) in process_dirs() {
        let mut hits = Vec::new();
        for (name, how) in [("exe", HoldKind::Exe), ("cwd", HoldKind::Cwd), ("root", HoldKind::Root)] {
            if same(&dir.join(name)) {
                hits.push(how);
            }
        }
        if let Ok(fds) = std::fs::read_dir(dir.join("fd")) {
            for e in fds.filter_map(|e| e.ok()) {
                let Some(n) = e.file_name().to_str().and_then(|s| s.parse().ok()) else {
                    continue;
                };
                if same(&e.path()) {
                    hits.push(HoldKind::Fd(n));
                }
            }
        }
        if !hits.is_empty() {
            let command = command_of(&dir);
            out.extend(hits.into_iter().map(|how| Holder { pid, command: command.clone(), how }));
        }
    }
    out
}

/// Other processes holding the file behind `fd`.
pub fn holders_of_fd(fd: i32) -> Vec<Holder> {
    match fildes::fd_path(fd) {
        Some(p) => holders_of_path(&p),
        None => Vec::new(),
    }
}

/// Processes executing `path`, the ETXTBSY case.
pub fn executing(path: &Path) -> Vec<Holder> {
    holders_of_path(path)
        .into_iter()
        .filter(|h| h.how == HoldKind::Exe)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_has_no_holders() {
        assert!(holders_of_path(Path::new("/nonexistent/x")).is_empty());
        assert!(holders_of_fd(-1).is_empty());
    }

    #[test]
    fn test_excludes_self() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(holders_of_path(f.path()).iter().all(|h| h.pid != std::process::id() as i32));
    }

    #[test]
    fn test_hold_kind_text() {
        assert_eq!(HoldKind::Exe.describe(), "executing");
        assert_eq!(HoldKind::Fd(3).describe(), "holding open");
    }
}
