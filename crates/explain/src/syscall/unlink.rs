//! `unlink(2)`

use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{fs, pids, stat, ProbeContext, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;

use super::{open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlink {
    pub pathname: PathArg,
}

impl Unlink {
    fn spec(&self) -> FinalSpec {
        FinalSpec::new("pathname").removing().no_follow()
    }
}

/// Is `path` the mount point of a filesystem?
pub(crate) fn is_mount_point(path: &Path) -> bool {
    let Ok(canon) = path.canonicalize() else {
        return false;
    };
    fs::mount_of(&canon)
        .map(|m| m.mount_point == canon)
        .unwrap_or(false)
}

pub(crate) fn render_busy(sb: &mut StringBuffer, path: Option<&Path>, caption: &str) {
    match path {
        Some(p) if is_mount_point(p) => {
            sb.push_str(caption);
            sb.push_str(" is a mount point and is in use by the system");
        }
        _ => {
            sb.push_str(caption);
            sb.push_str(
                " is being used by the system or another process and the implementation \
                 considers this to be an error",
            );
            if let Some(p) = path {
                common::push_holders(sb, &pids::holders_of_path(p));
            }
        }
    }
}

fn path_fault(_: &mut ProbeContext, a: &Unlink) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Unlink) {
    common::efault(sb, "pathname");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Unlink) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Unlink) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn is_directory(_: &mut ProbeContext, a: &Unlink) -> bool {
    a.pathname
        .as_path()
        .and_then(|p| stat::lstat(p).ok())
        .map(|s| s.is_dir())
        .unwrap_or(false)
}

fn render_directory(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Unlink) {
    sb.push_str(
        "the named file is a directory; directories may not be unlinked, use rmdir(2) or \
         remove(3) instead",
    );
}

fn render_busy_row(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Unlink) {
    render_busy(sb, a.pathname.as_path(), "pathname");
}

fn read_only_fs(_: &mut ProbeContext, a: &Unlink) -> bool {
    a.pathname.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Unlink) {
    if let Some(p) = a.pathname.as_path() {
        common::erofs(sb, p, "pathname");
    }
}

fn render_enomem(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Unlink) {
    common::enomem_kernel(sb);
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Unlink) {
    common::eio(sb);
}

static UNLINK_CAUSES: &[CauseTemplate<Unlink>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::EISDIR, libc::EPERM], is_directory, render_directory),
    CauseTemplate::new(&[libc::EBUSY], cause::always, render_busy_row),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
    CauseTemplate::new(&[libc::ENOMEM], cause::always, render_enomem),
    CauseTemplate::new(&[libc::EIO], cause::always, render_eio),
];

impl Syscall for Unlink {
    const NAME: &'static str = "unlink";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        UNLINK_CAUSES
    }
}

entry_points! {
    Unlink => explain_unlink, explain_errno_unlink, explain_message_unlink, explain_message_errno_unlink;
    <'a> (pathname: impl Into<UserStr<'a>>) => Unlink { pathname: PathArg::probe(pathname) }
}

/// `unlink(2)`, explaining any failure through the output sink.
pub fn unlink_on_error(pathname: &Path) -> std::io::Result<()> {
    nix::unistd::unlink(pathname).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_unlink(errnum, pathname), errnum)
    })
}

/// `unlink(2)`, exiting with an explanation on failure.
pub fn unlink_or_die(pathname: &Path) {
    if unlink_on_error(pathname).is_err() {
        crate::output::exit_failure();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_file() {
        options::set_global(Options::new());
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("gone");
        let text = explain_errno_unlink(libc::ENOENT, p.as_path());
        assert!(text.ends_with(&format!(
            "because there is no \"gone\" in the pathname, {}",
            dir.path().display()
        )));
    }

    #[test]
    #[serial]
    fn test_directory() {
        options::set_global(Options::new());
        let dir = tempfile::tempdir().unwrap();
        let text = explain_errno_unlink(libc::EISDIR, dir.path());
        assert!(text.contains("(EISDIR) because the named file is a directory; directories may not be unlinked"));
    }

    #[test]
    #[serial]
    fn test_root_is_mount_point() {
        options::set_global(Options::new());
        let text = explain_errno_unlink(libc::EBUSY, "/");
        if is_mount_point(Path::new("/")) {
            assert!(text.ends_with("because pathname is a mount point and is in use by the system"));
        } else {
            assert!(text.contains("because pathname is being used by the system"));
        }
    }

    #[test]
    #[serial]
    fn test_on_error_reports() {
        options::set_global(Options::new());
        let dir = tempfile::tempdir().unwrap();
        let err = unlink_on_error(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
