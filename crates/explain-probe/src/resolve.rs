//! Path resolver.
//!
//! Re-walks a pathname the way the kernel does, one component at a time,
//! recording what it saw at every step. Symbolic links are spliced into
//! the walk so the directory being searched is always a real directory.
//!
//! ## Design
//!
//! ```text
//! "/tmp/a/b"      step 0: dir "/"      name "tmp"  lstat ok (directory)
//!                 step 1: dir "/tmp"   name "a"    lstat ok (symlink -> "x")
//!                 step 2: dir "/tmp"   name "x"    lstat ok (directory)
//!                 step 3: dir "/tmp/x" name "b"    lstat ENOENT  => NotFound { step: 3 }
//! ```
//!
//! The resolver knows nothing about the caller's identity. Each step keeps
//! the stat of the directory searched, so the permission evaluator can
//! replay the walk against any identity afterwards.

use std::collections::{HashMap, VecDeque};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use explain_core::ktrace;

use crate::fs;
use crate::stat::{self, Stat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Directory searched for this component
    pub dir: PathBuf,
    pub dir_stat: Option<Stat>,
    pub name: Vec<u8>,
    /// `dir` joined with `name`
    pub path: PathBuf,
    /// `lstat` of `path`; `None` when it could not be examined
    pub stat: Option<Stat>,
    pub symlink_target: Option<PathBuf>,
    /// Last component of the walk
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The pathname is the empty string
    Empty,
    PathTooLong { len: usize, max: usize },
    NameTooLong { step: usize, len: usize, max: usize },
    NotFound { step: usize },
    /// A component used as a directory is not one
    NotDirectory { step: usize },
    /// The same link was reached twice
    SymlinkLoop { step: usize, start: PathBuf },
    TooManySymlinks { step: usize, limit: usize },
    /// `lstat` failed with some other errno
    Inaccessible { step: usize, errno: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub steps: Vec<Step>,
    pub failure: Option<Failure>,
    /// Where the walk ended
    pub final_path: PathBuf,
    /// Status of `final_path` on success
    pub final_stat: Option<Stat>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn final_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Step a failure refers to.
    pub fn failed_step(&self) -> Option<&Step> {
        match self.failure.as_ref()? {
            Failure::NameTooLong { step, .. }
            | Failure::NotFound { step }
            | Failure::NotDirectory { step }
            | Failure::SymlinkLoop { step, .. }
            | Failure::TooManySymlinks { step, .. }
            | Failure::Inaccessible { step, .. } => self.steps.get(*step),
            Failure::Empty | Failure::PathTooLong { .. } => None,
        }
    }

    /// Directory that holds (or would hold) the final component.
    pub fn parent_dir(&self) -> Option<&Step> {
        self.steps.iter().rev().find(|s| s.is_final)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Follow a symbolic link in the last component
    pub follow_final: bool,
    pub symlink_limit: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            follow_final: true,
            symlink_limit: fs::symlink_limit(),
        }
    }
}

impl ResolveOptions {
    pub fn follow_final(mut self, follow: bool) -> Self {
        self.follow_final = follow;
        self
    }

    pub fn symlink_limit(mut self, limit: usize) -> Self {
        self.symlink_limit = limit;
        self
    }
}

fn split(bytes: &[u8]) -> impl Iterator<Item = Vec<u8>> + '_ {
    bytes
        .split(|&b| b == b'/')
        .filter(|c| !c.is_empty() && *c != b".")
        .map(|c| c.to_vec())
}

/// Walk `path`, following symlinks per `opts`.
pub fn resolve(path: &Path, opts: ResolveOptions) -> Resolution {
    let bytes = path.as_os_str().as_bytes();
    let absolute = bytes.first() == Some(&b'/');
    let mut cur = PathBuf::from(if absolute { "/" } else { "." });
    let mut res = Resolution {
        steps: Vec::new(),
        failure: None,
        final_path: cur.clone(),
        final_stat: None,
    };
    if bytes.is_empty() {
        res.failure = Some(Failure::Empty);
        return res;
    }
    let max = fs::path_max(&cur);
    if bytes.len() >= max {
        res.failure = Some(Failure::PathTooLong { len: bytes.len(), max });
        return res;
    }

    let mut must_be_dir = bytes.ends_with(b"/");
    let mut pending: VecDeque<Vec<u8>> = split(bytes).collect();
    let mut seen: HashMap<(u64, u64), PathBuf> = HashMap::new();
    let mut followed = 0usize;

    while let Some(name) = pending.pop_front() {
        let is_final = pending.is_empty();
        let idx = res.steps.len();
        let dir_stat = stat::stat(&cur).ok();

        if name == b".." {
            let next = parent_of(&cur);
            res.steps.push(Step {
                dir: cur.clone(),
                dir_stat,
                name,
                path: next.clone(),
                stat: stat::stat(&next).ok(),
                symlink_target: None,
                is_final,
            });
            cur = next;
            continue;
        }

        let next = cur.join(OsStr::from_bytes(&name));
        let name_len = name.len();
        res.steps.push(Step {
            dir: cur.clone(),
            dir_stat,
            name,
            path: next.clone(),
            stat: None,
            symlink_target: None,
            is_final,
        });

        let name_max = fs::name_max(&cur);
        if name_len > name_max {
            res.failure = Some(Failure::NameTooLong { step: idx, len: name_len, max: name_max });
            return finish(res, cur);
        }

        let st = match stat::lstat(&next) {
            Ok(st) => st,
            Err(libc::ENOENT) => {
                res.failure = Some(Failure::NotFound { step: idx });
                return finish(res, cur);
            }
            Err(libc::ENOTDIR) if idx > 0 => {
                res.failure = Some(Failure::NotDirectory { step: idx - 1 });
                return finish(res, cur);
            }
            Err(libc::ENAMETOOLONG) => {
                res.failure = Some(Failure::NameTooLong { step: idx, len: name_len, max: name_max });
                return finish(res, cur);
            }
            Err(errno) => {
                res.failure = Some(Failure::Inaccessible { step: idx, errno });
                return finish(res, cur);
            }
        };
        res.steps[idx].stat = Some(st);

        if st.is_symlink() && (!is_final || opts.follow_final) {
            if let Some(start) = seen.get(&(st.dev, st.ino)) {
                res.failure = Some(Failure::SymlinkLoop { step: idx, start: start.clone() });
                return finish(res, cur);
            }
            seen.insert((st.dev, st.ino), next.clone());
            followed += 1;
            if followed > opts.symlink_limit {
                res.failure = Some(Failure::TooManySymlinks { step: idx, limit: opts.symlink_limit });
                return finish(res, cur);
            }
            let target = match nix::fcntl::readlink(&next) {
                Ok(t) => PathBuf::from(t),
                Err(e) => {
                    res.failure = Some(Failure::Inaccessible { step: idx, errno: e as i32 });
                    return finish(res, cur);
                }
            };
            ktrace!("resolve: {:?} -> {:?}", next, target);
            res.steps[idx].symlink_target = Some(target.clone());
            let tb = target.as_os_str().as_bytes();
            if tb.is_empty() {
                res.failure = Some(Failure::NotFound { step: idx });
                return finish(res, cur);
            }
            if tb[0] == b'/' {
                cur = PathBuf::from("/");
            }
            if is_final && tb.ends_with(b"/") {
                must_be_dir = true;
            }
            for c in split(tb).collect::<Vec<_>>().into_iter().rev() {
                pending.push_front(c);
            }
            continue;
        }

        if (!is_final || must_be_dir) && !st.is_dir() {
            res.failure = Some(Failure::NotDirectory { step: idx });
            return finish(res, cur);
        }
        cur = next;
    }

    res.final_stat = stat::stat(&cur).ok();
    finish(res, cur)
}

fn finish(mut res: Resolution, cur: PathBuf) -> Resolution {
    res.final_path = cur;
    res
}

fn parent_of(cur: &Path) -> PathBuf {
    if cur == Path::new("/") {
        return cur.to_path_buf();
    }
    if cur == Path::new(".") || cur.ends_with("..") {
        return cur.join("..");
    }
    cur.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::FileKind;

    fn walk(p: &Path) -> Resolution {
        resolve(p, ResolveOptions::default())
    }

    #[test]
    fn test_missing_ancestor() {
        let r = walk(Path::new("/nonexistent/file"));
        assert_eq!(r.failure, Some(Failure::NotFound { step: 0 }));
        let s = r.failed_step().unwrap();
        assert_eq!(s.dir, PathBuf::from("/"));
        assert_eq!(s.name, b"nonexistent");
        assert!(!s.is_final);
    }

    #[test]
    fn test_success_records_every_component() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("f");
        std::fs::write(&f, b"").unwrap();
        let r = walk(&f);
        assert!(r.is_ok());
        assert_eq!(r.final_stat.map(|s| s.kind), Some(FileKind::Regular));
        let last = r.final_step().unwrap();
        assert!(last.is_final);
        assert_eq!(last.name, b"f");
        assert_eq!(last.dir, dir.path());
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("f");
        std::fs::write(&f, b"").unwrap();
        let r = walk(&f.join("x"));
        let fail = r.failure.clone().unwrap();
        let Failure::NotDirectory { step } = fail else {
            panic!("expected NotDirectory, got {:?}", fail);
        };
        assert_eq!(r.steps[step].name, b"f");
        // trailing slash demands a directory too
        let mut with_slash = f.into_os_string();
        with_slash.push("/");
        assert!(matches!(
            walk(Path::new(&with_slash)).failure,
            Some(Failure::NotDirectory { .. })
        ));
    }

    #[test]
    fn test_symlink_followed_and_not() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink("t", &link).unwrap();
        let r = walk(&link);
        assert!(r.is_ok());
        assert_eq!(r.final_path, target);
        let r = resolve(&link, ResolveOptions::default().follow_final(false));
        assert!(r.is_ok());
        assert_eq!(r.final_step().and_then(|s| s.stat).map(|s| s.kind), Some(FileKind::Symlink));
    }

    #[test]
    fn test_symlink_loop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink("b", &a).unwrap();
        std::os::unix::fs::symlink("a", &b).unwrap();
        let r = walk(&a.join("x"));
        match r.failure {
            Some(Failure::SymlinkLoop { start, .. }) => assert_eq!(start, a),
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("l0"), b"").unwrap();
        for i in 1..=5 {
            std::os::unix::fs::symlink(format!("l{}", i - 1), dir.path().join(format!("l{}", i))).unwrap();
        }
        let opts = ResolveOptions::default().symlink_limit(3);
        let r = resolve(&dir.path().join("l5"), opts);
        assert!(matches!(r.failure, Some(Failure::TooManySymlinks { limit: 3, .. })));
        assert!(resolve(&dir.path().join("l5"), ResolveOptions::default()).is_ok());
    }

    #[test]
    fn test_dangling_symlink_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let l = dir.path().join("dangle");
        std::os::unix::fs::symlink("missing", &l).unwrap();
        let r = walk(&l);
        let s = r.failed_step().unwrap();
        assert!(matches!(r.failure, Some(Failure::NotFound { .. })));
        assert_eq!(s.name, b"missing");
    }

    #[test]
    fn test_name_too_long() {
        let long = "x".repeat(300);
        let r = walk(&Path::new("/tmp").join(long));
        assert!(matches!(r.failure, Some(Failure::NameTooLong { len: 300, .. })));
    }

    #[test]
    fn test_empty_and_dotdot() {
        assert_eq!(walk(Path::new("")).failure, Some(Failure::Empty));
        let r = walk(Path::new("/tmp/../tmp"));
        assert!(r.is_ok());
        assert_eq!(r.final_path, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let a = walk(Path::new("/nonexistent/file"));
        let b = walk(Path::new("/nonexistent/file"));
        assert_eq!(a, b);
    }
}
