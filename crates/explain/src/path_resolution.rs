//! Path-resolution explainer.
//!
//! Turns a walk from the probe crate's resolver, replayed against the
//! captured identity, into a sentence about the first component that
//! stopped it.
//!
//! ## Design
//!
//! ```text
//!   resolve(path) ──> steps[0..k] (+ failure)
//!        │
//!        ├─ search permission on every directory walked, ancestors first
//!        ├─ the resolver's own failure (ENOENT, ENOTDIR, ELOOP, ...)
//!        └─ the final component vs FinalSpec (create, remove, want)
//!        │
//!   Diagnosis ── errnos() contains ctx.errnum ? ──> render
//! ```
//!
//! A diagnosis whose errno is not the one observed is discarded; the
//! caller's cause table then moves on to its next row.

use std::fmt::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use explain_core::StringBuffer;
use explain_probe::stat::basename;
use explain_probe::{fs, Capability, Failure, FileKind, ProbeContext, Resolution, Stat};

use crate::permission::{self, Access};

/// What the call needs from the final component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalSpec {
    /// Argument name used in explanations, e.g. "pathname", "oldpath"
    pub caption: &'static str,
    pub want: Vec<Access>,
    pub must_exist: bool,
    pub must_not_exist: bool,
    pub must_be: Option<FileKind>,
    pub follow_symlink: bool,
    /// A missing final component will be created in its directory
    pub create: bool,
    /// The final component's directory entry will be removed
    pub remove: bool,
}

impl FinalSpec {
    pub fn new(caption: &'static str) -> Self {
        Self {
            caption,
            want: Vec::new(),
            must_exist: true,
            must_not_exist: false,
            must_be: None,
            follow_symlink: true,
            create: false,
            remove: false,
        }
    }

    pub fn want(mut self, access: Access) -> Self {
        if !self.want.contains(&access) {
            self.want.push(access);
        }
        self
    }

    pub fn creating(mut self) -> Self {
        self.create = true;
        self.must_exist = false;
        self
    }

    pub fn removing(mut self) -> Self {
        self.remove = true;
        self
    }

    pub fn must_not_exist(mut self) -> Self {
        self.must_not_exist = true;
        self.must_exist = false;
        self
    }

    pub fn must_be(mut self, kind: FileKind) -> Self {
        self.must_be = Some(kind);
        self
    }

    pub fn no_follow(mut self) -> Self {
        self.follow_symlink = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    Empty,
    PathTooLong { len: usize, max: usize },
    NameTooLong { step: usize, len: usize, max: usize },
    /// The directory searched at `step` denies search permission
    SearchDenied { step: usize },
    NotFound { step: usize },
    NotDirectory { step: usize },
    SymlinkLoop { start: PathBuf },
    TooManySymlinks { limit: usize },
    FinalDenied { access: Access },
    CreateDenied { step: usize },
    RemoveDenied { step: usize },
    /// Sticky directory, caller owns neither the entry nor the directory
    Sticky { step: usize },
    NoExecMount,
}

impl Diagnosis {
    /// Errors this diagnosis accounts for.
    pub fn errnos(&self) -> &'static [i32] {
        match self {
            Diagnosis::Empty | Diagnosis::NotFound { .. } => &[libc::ENOENT],
            Diagnosis::PathTooLong { .. } | Diagnosis::NameTooLong { .. } => &[libc::ENAMETOOLONG],
            Diagnosis::SearchDenied { .. }
            | Diagnosis::FinalDenied { .. }
            | Diagnosis::CreateDenied { .. }
            | Diagnosis::RemoveDenied { .. }
            | Diagnosis::NoExecMount => &[libc::EACCES],
            Diagnosis::NotDirectory { .. } => &[libc::ENOTDIR],
            Diagnosis::SymlinkLoop { .. } | Diagnosis::TooManySymlinks { .. } => &[libc::ELOOP],
            Diagnosis::Sticky { .. } => &[libc::EPERM, libc::EACCES],
        }
    }
}

fn final_stat(res: &Resolution, spec: &FinalSpec) -> Option<Stat> {
    match res.steps.last() {
        Some(last) if !spec.follow_symlink => last.stat,
        _ => res.final_stat,
    }
}

/// Replay `path` against `ctx`'s identity and find the first obstacle.
pub fn diagnose(ctx: &mut ProbeContext, path: &Path, spec: &FinalSpec) -> Option<Diagnosis> {
    let res = ctx.resolve(path, spec.follow_symlink).clone();
    let id = ctx.identity().clone();

    let checked = match &res.failure {
        Some(Failure::Empty) => return Some(Diagnosis::Empty),
        Some(Failure::PathTooLong { len, max }) => {
            return Some(Diagnosis::PathTooLong { len: *len, max: *max })
        }
        Some(Failure::NameTooLong { step, .. })
        | Some(Failure::NotFound { step })
        | Some(Failure::NotDirectory { step })
        | Some(Failure::SymlinkLoop { step, .. })
        | Some(Failure::TooManySymlinks { step, .. })
        | Some(Failure::Inaccessible { step, .. }) => step + 1,
        None => res.steps.len(),
    };
    for (i, step) in res.steps.iter().take(checked).enumerate() {
        if let Some(ds) = step.dir_stat {
            if permission::check(&ds, Access::Search, &id).is_err() {
                return Some(Diagnosis::SearchDenied { step: i });
            }
        }
    }

    match &res.failure {
        Some(Failure::NameTooLong { step, len, max }) => {
            return Some(Diagnosis::NameTooLong { step: *step, len: *len, max: *max })
        }
        Some(Failure::NotFound { step }) => {
            let s = &res.steps[*step];
            if s.is_final && !spec.must_exist {
                if spec.create {
                    let denied = s
                        .dir_stat
                        .map(|ds| permission::check(&ds, Access::Write, &id).is_err())
                        .unwrap_or(false);
                    if denied {
                        return Some(Diagnosis::CreateDenied { step: *step });
                    }
                }
                return None;
            }
            return Some(Diagnosis::NotFound { step: *step });
        }
        Some(Failure::NotDirectory { step }) => return Some(Diagnosis::NotDirectory { step: *step }),
        Some(Failure::SymlinkLoop { start, .. }) => {
            return Some(Diagnosis::SymlinkLoop { start: start.clone() })
        }
        Some(Failure::TooManySymlinks { limit, .. }) => {
            return Some(Diagnosis::TooManySymlinks { limit: *limit })
        }
        Some(_) => return None,
        None => {}
    }

    if spec.must_not_exist {
        return None;
    }
    let st = final_stat(&res, spec)?;
    let last = res.steps.len().checked_sub(1);

    if let (Some(FileKind::Directory), Some(step)) = (spec.must_be, last) {
        if !st.is_dir() {
            return Some(Diagnosis::NotDirectory { step });
        }
    }

    if let (true, Some(step)) = (spec.remove, last) {
        if let Some(ds) = res.steps[step].dir_stat {
            if permission::check(&ds, Access::Write, &id).is_err() {
                return Some(Diagnosis::RemoveDenied { step });
            }
            let owns_entry = res.steps[step].stat.map(|s| s.uid == id.uid).unwrap_or(false);
            if ds.perm & 0o1000 != 0
                && !owns_entry
                && ds.uid != id.uid
                && !id.has(Capability::Fowner)
            {
                return Some(Diagnosis::Sticky { step });
            }
        }
    }

    for &access in &spec.want {
        if access == Access::Execute
            && fs::mount_of(&res.final_path).map(|m| m.noexec).unwrap_or(false)
        {
            return Some(Diagnosis::NoExecMount);
        }
        if permission::check(&st, access, &id).is_err() {
            return Some(Diagnosis::FinalDenied { access });
        }
    }
    None
}

/// Explain `ctx.errnum` in terms of resolving `path`.
///
/// Returns false, writing nothing, when the walk shows no obstacle that
/// accounts for the error.
pub fn explain(sb: &mut StringBuffer, ctx: &mut ProbeContext, path: &Path, spec: &FinalSpec) -> bool {
    match diagnose(ctx, path, spec) {
        Some(d) if d.errnos().contains(&ctx.errnum) => {
            render(sb, ctx, path, spec, &d);
            true
        }
        Some(_) => false,
        None if ctx.errnum == libc::EACCES => explain_nfs(sb, ctx, path, spec),
        None => false,
    }
}

/// Does the walk account for `ctx.errnum`?
pub fn applies(ctx: &mut ProbeContext, path: &Path, spec: &FinalSpec) -> bool {
    let errnum = ctx.errnum;
    diagnose(ctx, path, spec)
        .map(|d| d.errnos().contains(&errnum))
        .unwrap_or(false)
}

fn explain_nfs(sb: &mut StringBuffer, ctx: &mut ProbeContext, path: &Path, spec: &FinalSpec) -> bool {
    let res = ctx.resolve(path, spec.follow_symlink).clone();
    let Some(st) = final_stat(&res, spec) else {
        return false;
    };
    spec.want
        .iter()
        .any(|&a| permission::explain_nfs_groups(sb, ctx, &st, &res.final_path, a))
}

fn push_dir(sb: &mut StringBuffer, dir: &Path) {
    sb.push_bytes(dir.as_os_str().as_bytes());
}

/// Write the sentence for `d`.
pub fn render(
    sb: &mut StringBuffer,
    ctx: &mut ProbeContext,
    path: &Path,
    spec: &FinalSpec,
    d: &Diagnosis,
) {
    let res = ctx.resolve(path, spec.follow_symlink).clone();
    let caption = spec.caption;
    match d {
        Diagnosis::Empty => {
            let _ = write!(
                sb,
                "POSIX decrees that an empty {} must not be resolved successfully",
                caption
            );
        }
        Diagnosis::PathTooLong { len, max } => {
            let _ = write!(
                sb,
                "{} exceeds the system maximum path length ({} > {})",
                caption, len, max
            );
        }
        Diagnosis::NameTooLong { step, len, max } => {
            sb.push_str("the ");
            sb.push_quoted_n(&res.steps[*step].name, 20);
            let _ = write!(sb, " component is longer than the system limit ({} > {})", len, max);
        }
        Diagnosis::SearchDenied { step } => {
            let s = &res.steps[*step];
            if let Some(ds) = s.dir_stat {
                permission::explain_denied(sb, ctx, &ds, basename(&s.dir), Access::Search);
            }
        }
        Diagnosis::NotFound { step } => {
            let s = &res.steps[*step];
            sb.push_str("there is no ");
            sb.push_quoted_path(&s.name);
            if !s.is_final {
                sb.push_str(" directory");
            }
            let _ = write!(sb, " in the {}, ", caption);
            push_dir(sb, &s.dir);
        }
        Diagnosis::NotDirectory { step } => {
            let s = &res.steps[*step];
            let kind = s.stat.map(|st| st.kind).unwrap_or(FileKind::Unknown);
            sb.push_str("the ");
            sb.push_quoted_path(&s.name);
            let _ = write!(sb, " {} in the {}, ", kind.describe(), caption);
            push_dir(sb, &s.dir);
            sb.push_str(" is being used as a directory when it is not");
        }
        Diagnosis::SymlinkLoop { start } => {
            let _ = write!(sb, "a symbolic link loop was encountered in {}, starting at ", caption);
            sb.push_quoted_path(start.as_os_str().as_bytes());
        }
        Diagnosis::TooManySymlinks { limit } => {
            let _ = write!(
                sb,
                "too many symbolic links were encountered in {} ({})",
                caption, limit
            );
        }
        Diagnosis::FinalDenied { access } => {
            if let Some(st) = final_stat(&res, spec) {
                let name = basename(&res.final_path).to_vec();
                permission::explain_denied(sb, ctx, &st, &name, *access);
                if *access == Access::Execute && st.perm & 0o6000 != 0 {
                    footnote_nosuid(sb, &res.final_path);
                }
            }
        }
        Diagnosis::CreateDenied { step } | Diagnosis::RemoveDenied { step } => {
            let s = &res.steps[*step];
            if let Some(ds) = s.dir_stat {
                permission::explain_denied(sb, ctx, &ds, basename(&s.dir), Access::Write);
            }
            let (verb, kind) = match d {
                Diagnosis::CreateDenied { .. } => {
                    ("create", spec.must_be.unwrap_or(FileKind::Regular))
                }
                _ => ("remove", s.stat.map(|st| st.kind).unwrap_or(FileKind::Unknown)),
            };
            let _ = write!(sb, ", this is needed to {} the directory entry for the ", verb);
            sb.push_quoted_path(&s.name);
            let _ = write!(sb, " {}", kind.describe());
        }
        Diagnosis::Sticky { step } => {
            let s = &res.steps[*step];
            let id = ctx.identity();
            let dir_owner = s.dir_stat.map(|st| st.uid).unwrap_or(0);
            let (owner, kind) = s
                .stat
                .map(|st| (st.uid, st.kind))
                .unwrap_or((0, FileKind::Unknown));
            sb.push_str("the ");
            sb.push_quoted_path(basename(&s.dir));
            let _ = write!(
                sb,
                " directory has the sticky bit (S_ISVTX) set and the process's {} UID ({}) is \
                 neither the owner ({}) of the ",
                id.kind.describe(),
                id.uid,
                owner
            );
            sb.push_quoted_path(&s.name);
            let _ = write!(
                sb,
                " {} to be removed, nor the owner ({}) of the directory containing it",
                kind.describe(),
                dir_owner
            );
        }
        Diagnosis::NoExecMount => {
            sb.push_str(
                "the executable is on a file system that is mounted with the \"noexec\" option",
            );
        }
    }
}

fn footnote_nosuid(sb: &mut StringBuffer, path: &Path) {
    if fs::mount_of(path).map(|m| m.nosuid).unwrap_or(false) {
        sb.add_footnote(format_args!(
            "the set-user-ID and set-group-ID bits are ignored because the file system is \
             mounted with the \"nosuid\" option"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::Options;
    use explain_probe::Identity;
    use std::os::unix::fs::{symlink, PermissionsExt};

    fn ctx(errnum: i32) -> ProbeContext {
        ProbeContext::new(Options::new()).errnum(errnum)
    }

    fn text(ctx: &mut ProbeContext, path: &Path, spec: &FinalSpec) -> Option<String> {
        let mut sb = StringBuffer::new(1024);
        if explain(&mut sb, ctx, path, spec) {
            Some(sb.into_string())
        } else {
            None
        }
    }

    fn stranger() -> Identity {
        let me = nix::unistd::geteuid().as_raw();
        Identity::new(me + 1, me + 1)
    }

    #[test]
    fn test_missing_directory() {
        let mut c = ctx(libc::ENOENT);
        let got = text(&mut c, Path::new("/nonexistent/file"), &FinalSpec::new("pathname"));
        assert_eq!(
            got.as_deref(),
            Some("there is no \"nonexistent\" directory in the pathname, /")
        );
    }

    #[test]
    fn test_missing_final_component() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("gone");
        let mut c = ctx(libc::ENOENT);
        let got = text(&mut c, &p, &FinalSpec::new("pathname")).unwrap();
        assert_eq!(
            got,
            format!("there is no \"gone\" in the pathname, {}", dir.path().display())
        );
        // a create of the same path is not an error
        let mut c = ctx(libc::ENOENT);
        assert!(text(&mut c, &p, &FinalSpec::new("pathname").creating()).is_none());
    }

    #[test]
    fn test_wrong_errno_is_discarded() {
        let mut c = ctx(libc::EACCES);
        assert!(text(&mut c, Path::new("/nonexistent/file"), &FinalSpec::new("pathname")).is_none());
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();
        let mut c = ctx(libc::ENOTDIR);
        let got = text(&mut c, &dir.path().join("f/x"), &FinalSpec::new("pathname")).unwrap();
        assert_eq!(
            got,
            format!(
                "the \"f\" regular file in the pathname, {} is being used as a directory when it is not",
                dir.path().display()
            )
        );
    }

    #[test]
    fn test_symlink_loop() {
        let dir = tempfile::tempdir().unwrap();
        symlink("b", dir.path().join("a")).unwrap();
        symlink("a", dir.path().join("b")).unwrap();
        let mut c = ctx(libc::ELOOP);
        let got = text(&mut c, &dir.path().join("a"), &FinalSpec::new("pathname")).unwrap();
        assert!(got.starts_with("a symbolic link loop was encountered in pathname, starting at \""));
    }

    #[test]
    fn test_empty_and_long_names() {
        let mut c = ctx(libc::ENOENT);
        assert_eq!(
            text(&mut c, Path::new(""), &FinalSpec::new("pathname")).as_deref(),
            Some("POSIX decrees that an empty pathname must not be resolved successfully")
        );
        let long = format!("/tmp/{}", "x".repeat(300));
        let mut c = ctx(libc::ENAMETOOLONG);
        let got = text(&mut c, Path::new(&long), &FinalSpec::new("pathname")).unwrap();
        assert!(got.starts_with("the \"xxxxxxxxxxxxxxxxxxxx\"... component"));
        assert!(got.ends_with("is longer than the system limit (300 > 255)"));
    }

    #[test]
    fn test_search_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700)).unwrap();
        let id = stranger();
        let owner = nix::unistd::geteuid().as_raw();
        let mut c = ProbeContext::with_identity(Options::new(), id.clone()).errnum(libc::EACCES);
        let got = text(&mut c, &locked.join("secret"), &FinalSpec::new("pathname")).unwrap();
        assert_eq!(
            got,
            format!(
                "the process does not have search permission to the \"locked\" directory, the \
                 effective UID of the process ({}) is not the owner ({}) of the directory, and \
                 the directory's permission mode is 0700 (rwx------)",
                id.uid, owner
            )
        );
    }

    #[test]
    fn test_create_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut c = ProbeContext::with_identity(Options::new(), stranger()).errnum(libc::EACCES);
        let spec = FinalSpec::new("pathname").creating();
        let got = text(&mut c, &dir.path().join("new"), &spec).unwrap();
        assert!(got.starts_with("the process does not have write permission to the \""));
        assert!(got.ends_with(
            "0755 (rwxr-xr-x), this is needed to create the directory entry for the \"new\" regular file"
        ));
    }

    #[test]
    fn test_final_read_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let f = dir.path().join("private");
        std::fs::write(&f, b"x").unwrap();
        std::fs::set_permissions(&f, std::fs::Permissions::from_mode(0o600)).unwrap();
        let mut c = ProbeContext::with_identity(Options::new(), stranger()).errnum(libc::EACCES);
        let got = text(&mut c, &f, &FinalSpec::new("pathname").want(Access::Read)).unwrap();
        assert!(got.starts_with(
            "the process does not have read permission to the \"private\" regular file"
        ));
        assert!(got.ends_with("0600 (rw-------)"));
    }

    #[test]
    fn test_sticky_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o1777)).unwrap();
        let f = dir.path().join("theirs");
        std::fs::write(&f, b"x").unwrap();
        let mut c = ProbeContext::with_identity(Options::new(), stranger()).errnum(libc::EPERM);
        let got = text(&mut c, &f, &FinalSpec::new("pathname").removing()).unwrap();
        assert!(got.contains("directory has the sticky bit (S_ISVTX) set"));
        assert!(got.contains("\"theirs\" regular file to be removed"));
    }
}
