//! `open(2)`

use std::fmt::Write;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{pids, stat, FileKind, ProbeContext, UserStr};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::{self, FinalSpec};
use crate::permission::Access;
use crate::printers;

use super::{comma, open_paren, report, PathArg, Syscall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub pathname: PathArg,
    pub flags: i32,
    pub mode: u32,
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        const O_TMPFILE: i32 = libc::O_TMPFILE;
        const O_NOATIME: i32 = libc::O_NOATIME;
    } else {
        const O_TMPFILE: i32 = 0;
        const O_NOATIME: i32 = 0;
    }
}

impl Open {
    fn has(&self, flag: i32) -> bool {
        flag != 0 && self.flags & flag == flag
    }

    fn wants_write(&self) -> bool {
        let acc = self.flags & libc::O_ACCMODE;
        acc == libc::O_WRONLY || acc == libc::O_RDWR || self.has(libc::O_TRUNC)
    }

    fn wants_read(&self) -> bool {
        let acc = self.flags & libc::O_ACCMODE;
        acc == libc::O_RDONLY || acc == libc::O_RDWR
    }

    /// Mode is only meaningful when a file may be created.
    fn uses_mode(&self) -> bool {
        self.has(libc::O_CREAT) || self.has(O_TMPFILE)
    }

    fn spec(&self) -> FinalSpec {
        let mut spec = FinalSpec::new("pathname");
        if self.wants_read() {
            spec = spec.want(Access::Read);
        }
        if self.wants_write() {
            spec = spec.want(Access::Write);
        }
        if self.has(libc::O_CREAT) {
            spec = spec.creating();
        }
        if self.has(libc::O_NOFOLLOW) {
            spec = spec.no_follow();
        }
        if self.has(libc::O_DIRECTORY) {
            spec = spec.must_be(FileKind::Directory);
        }
        spec
    }

    fn lstat(&self) -> Option<explain_probe::Stat> {
        self.pathname.as_path().and_then(|p| stat::lstat(p).ok())
    }
}

// ── Causes ───────────────────────────────────────────────────────

fn path_fault(_: &mut ProbeContext, a: &Open) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    common::efault(sb, "pathname");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Open) -> bool {
    match a.pathname.as_path() {
        Some(p) => path_resolution::applies(ctx, p, &a.spec()),
        None => false,
    }
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Open) {
    if let Some(p) = a.pathname.as_path() {
        path_resolution::explain(sb, ctx, p, &a.spec());
    }
}

fn nofollow_symlink(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(libc::O_NOFOLLOW) && a.lstat().map(|s| s.is_symlink()).unwrap_or(false)
}

fn render_nofollow(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str("O_NOFOLLOW was specified but pathname refers to a symbolic link");
}

fn exclusive_exists(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(libc::O_CREAT | libc::O_EXCL)
}

fn render_exists(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    sb.push_str("pathname already exists and O_CREAT and O_EXCL were used");
    if let Some(st) = a.lstat() {
        if st.is_symlink() {
            sb.push_str(", note that O_EXCL refuses to follow a symbolic link");
        }
    }
}

fn directory_for_writing(_: &mut ProbeContext, a: &Open) -> bool {
    a.wants_write()
        && a.pathname
            .as_path()
            .and_then(|p| stat::stat(p).ok())
            .map(|s| s.is_dir())
            .unwrap_or(false)
}

fn render_directory(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str(
        "pathname refers to a directory and the access requested involved writing \
         (that is, O_WRONLY or O_RDWR is set)",
    );
}

fn kind_is(a: &Open, kind: FileKind) -> bool {
    a.pathname
        .as_path()
        .and_then(|p| stat::stat(p).ok())
        .map(|s| s.kind == kind)
        .unwrap_or(false)
}

fn fifo_without_reader(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(libc::O_NONBLOCK) && a.flags & libc::O_ACCMODE == libc::O_WRONLY && kind_is(a, FileKind::Fifo)
}

fn render_fifo(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str(
        "O_NONBLOCK | O_WRONLY is set, the named file is a FIFO and no process has the \
         file open for reading",
    );
}

fn device_special(_: &mut ProbeContext, a: &Open) -> bool {
    kind_is(a, FileKind::CharDevice) || kind_is(a, FileKind::BlockDevice)
}

fn render_no_device(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str("the file is a device special file and no corresponding device exists");
}

fn noatime_not_owner(ctx: &mut ProbeContext, a: &Open) -> bool {
    a.has(O_NOATIME)
        && a.lstat()
            .map(|s| s.uid != ctx.identity().uid)
            .unwrap_or(false)
}

fn render_noatime(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str(
        "the O_NOATIME flag was specified, but the effective user ID of the caller did not \
         match the owner of the file and the caller was not privileged (CAP_FOWNER)",
    );
}

fn busy_executable(_: &mut ProbeContext, a: &Open) -> bool {
    a.wants_write()
}

fn render_busy(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    sb.push_str(
        "pathname refers to an executable image which is currently being executed and \
         write access was requested",
    );
    if let Some(p) = a.pathname.as_path() {
        common::push_holders(sb, &pids::executing(p));
    }
}

fn read_only_fs(_: &mut ProbeContext, a: &Open) -> bool {
    a.wants_write()
        && a.pathname
            .as_path()
            .map(common::on_read_only_fs)
            .unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    if let Some(p) = a.pathname.as_path() {
        common::erofs(sb, p, "pathname");
    }
}

fn creating(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(libc::O_CREAT) && a.pathname.as_path().is_some()
}

fn render_no_space(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    if let Some(p) = a.pathname.as_path() {
        common::enospc(sb, p, "pathname");
    }
}

fn tmpfile_unsupported(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(O_TMPFILE)
}

fn render_tmpfile(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str("O_TMPFILE was specified but the file system does not support unnamed temporary files");
}

fn render_bad_flags(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    if a.flags & libc::O_ACCMODE == libc::O_ACCMODE {
        sb.push_str("the flags argument has an invalid access mode (O_ACCMODE)");
        return;
    }
    common::einval_bits(sb, "flags");
}

fn render_too_big(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Open) {
    sb.push_str("pathname refers to a regular file that is too large to be opened");
    if let Some(size) = a.lstat().map(|s| s.size) {
        let _ = write!(sb, " ({} bytes)", size);
    }
}

fn nonblocking(_: &mut ProbeContext, a: &Open) -> bool {
    a.has(libc::O_NONBLOCK)
}

fn render_lease(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Open) {
    sb.push_str(
        "the O_NONBLOCK flag was specified, and an incompatible lease was held on the file",
    );
}

static OPEN_CAUSES: &[CauseTemplate<Open>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(&[libc::ELOOP, libc::EMLINK], nofollow_symlink, render_nofollow),
    CauseTemplate::new(
        &[
            libc::ENOENT,
            libc::ENOTDIR,
            libc::ELOOP,
            libc::ENAMETOOLONG,
            libc::EACCES,
        ],
        resolution_fails,
        render_resolution,
    ),
    CauseTemplate::new(&[libc::EEXIST], exclusive_exists, render_exists),
    CauseTemplate::new(&[libc::EISDIR], directory_for_writing, render_directory),
    CauseTemplate::new(&[libc::ENXIO], fifo_without_reader, render_fifo),
    CauseTemplate::new(&[libc::ENXIO, libc::ENODEV], device_special, render_no_device),
    CauseTemplate::new(&[libc::EPERM], noatime_not_owner, render_noatime),
    CauseTemplate::new(&[libc::ETXTBSY], busy_executable, render_busy),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], creating, render_no_space),
    CauseTemplate::new(&[libc::EOPNOTSUPP], tmpfile_unsupported, render_tmpfile),
    CauseTemplate::new(&[libc::EINVAL], cause::always, render_bad_flags),
    CauseTemplate::new(&[libc::EOVERFLOW, libc::EFBIG], cause::always, render_too_big),
    CauseTemplate::new(&[libc::EWOULDBLOCK], nonblocking, render_lease),
];

impl Syscall for Open {
    const NAME: &'static str = "open";

    fn print_signature(&self, sb: &mut StringBuffer, opts: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        comma(sb);
        printers::print_open_flags(sb, self.flags);
        if self.uses_mode() {
            comma(sb);
            printers::print_permission_mode(sb, self.mode, opts);
        }
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        OPEN_CAUSES
    }

    fn footnotes(&self, sb: &mut StringBuffer, _: &mut ProbeContext) {
        if self.flags & libc::O_ACCMODE == libc::O_RDONLY && self.has(libc::O_TRUNC) {
            sb.add_footnote(format_args!(
                "the effect of O_TRUNC combined with O_RDONLY is undefined"
            ));
        }
        if self.has(libc::O_EXCL) && !self.has(libc::O_CREAT) {
            sb.add_footnote(format_args!(
                "the behavior of O_EXCL without O_CREAT is undefined unless pathname refers \
                 to a block device"
            ));
        }
    }
}

entry_points! {
    Open => explain_open, explain_errno_open, explain_message_open, explain_message_errno_open;
    <'a> (pathname: impl Into<UserStr<'a>>, flags: i32, mode: u32) => Open {
        pathname: PathArg::probe(pathname),
        flags,
        mode,
    }
}

/// `open(2)`, explaining any failure through the output sink.
pub fn open_on_error(pathname: &Path, flags: i32, mode: u32) -> std::io::Result<OwnedFd> {
    match nix::fcntl::open(
        pathname,
        OFlag::from_bits_truncate(flags),
        Mode::from_bits_truncate(mode as libc::mode_t),
    ) {
        // SAFETY: open just returned this descriptor to us.
        Ok(fd) => Ok(unsafe { OwnedFd::from_raw_fd(fd) }),
        Err(e) => {
            let errnum = e as i32;
            Err(report(explain_errno_open(errnum, pathname, flags, mode), errnum))
        }
    }
}

/// `open(2)`, exiting with an explanation on failure.
pub fn open_or_die(pathname: &Path, flags: i32, mode: u32) -> OwnedFd {
    open_on_error(pathname, flags, mode).unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;

    fn explain(errnum: i32, path: &str, flags: i32) -> String {
        explain_errno_open(errnum, path, flags, 0)
    }

    #[test]
    #[serial]
    fn test_missing_parent_directory() {
        options::set_global(Options::new());
        assert_eq!(
            explain(libc::ENOENT, "/nonexistent/file", libc::O_RDONLY),
            "open(\"/nonexistent/file\", O_RDONLY) failed, No such file or directory (ENOENT) \
             because there is no \"nonexistent\" directory in the pathname, /"
        );
    }

    #[test]
    #[serial]
    fn test_signature_shows_mode_only_when_creating() {
        options::set_global(Options::new());
        let text = explain_errno_open(libc::EEXIST, "/tmp", libc::O_WRONLY | libc::O_CREAT | libc::O_EXCL, 0o644);
        assert!(text.starts_with(
            "open(\"/tmp\", O_WRONLY | O_CREAT | O_EXCL, 0644) failed, File exists (EEXIST) because \
             pathname already exists and O_CREAT and O_EXCL were used"
        ));
        let text = explain(libc::EINTR, "/tmp", libc::O_RDONLY);
        assert!(text.starts_with("open(\"/tmp\", O_RDONLY) failed"));
    }

    #[test]
    #[serial]
    fn test_directory_for_writing() {
        options::set_global(Options::new());
        let dir = tempfile::tempdir().unwrap();
        let text = explain_errno_open(libc::EISDIR, dir.path(), libc::O_RDWR, 0);
        assert!(text.ends_with(
            "because pathname refers to a directory and the access requested involved writing \
             (that is, O_WRONLY or O_RDWR is set)"
        ));
    }

    #[test]
    #[serial]
    fn test_nofollow_symlink() {
        options::set_global(Options::new());
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink("/tmp", &link).unwrap();
        let text = explain_errno_open(libc::ELOOP, link.as_path(), libc::O_RDONLY | libc::O_NOFOLLOW, 0);
        assert!(text.ends_with("because O_NOFOLLOW was specified but pathname refers to a symbolic link"));
    }

    #[test]
    #[serial]
    fn test_undefined_combination_footnote() {
        options::set_global(Options::new());
        let text = explain(libc::EINTR, "/tmp/x", libc::O_RDONLY | libc::O_TRUNC);
        assert!(text.ends_with("; the effect of O_TRUNC combined with O_RDONLY is undefined"));
    }

    #[test]
    #[serial]
    fn test_message_variant_and_efault() {
        options::set_global(Options::new());
        let mut buf = [0u8; 4096];
        // SAFETY: a pointer into the zero page is never dereferenced unprobed.
        let bad = unsafe { UserStr::from_ptr(8 as *const libc::c_char) };
        let text = explain_message_errno_open(&mut buf, libc::EFAULT, bad, libc::O_RDONLY, 0);
        assert_eq!(
            text,
            "open(<efault>, O_RDONLY) failed, Bad address (EFAULT) because pathname refers to \
             memory that is outside the process's accessible address space"
        );
    }

    #[test]
    #[serial]
    fn test_on_error_returns_io_error() {
        crate::output::set_output(Some(Box::new(crate::output::WriterOutput::new(Vec::new()))));
        let err = open_on_error(Path::new("/nonexistent/file"), libc::O_RDONLY, 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        crate::output::set_output(None);
    }
}
