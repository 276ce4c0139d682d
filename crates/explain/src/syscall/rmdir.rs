//! `rmdir(2)`

use std::fmt::Write;
use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{dir, FileKind, ProbeContext, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;

use super::unlink::render_busy;
use super::{open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rmdir {
    pub pathname: PathArg,
}

impl Rmdir {
    fn spec(&self) -> FinalSpec {
        FinalSpec::new("pathname")
            .removing()
            .must_be(FileKind::Directory)
            .no_follow()
    }

    fn last_component(&self) -> Option<&[u8]> {
        let bytes = self.pathname.0.as_bytes()?;
        let trimmed = match bytes.iter().rposition(|&c| c != b'/') {
            Some(end) => &bytes[..=end],
            None => return None,
        };
        Some(match trimmed.iter().rposition(|&c| c == b'/') {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        })
    }
}

/// Explain a directory that still has entries.
pub(crate) fn render_not_empty(sb: &mut StringBuffer, path: Option<&Path>, caption: &str) {
    let _ = write!(
        sb,
        "{} is not an empty directory; that is, it contains entries other than \".\" and \"..\"",
        caption
    );
    if let Some(n) = path.and_then(dir::entry_count) {
        let _ = write!(sb, " ({} {})", n, if n == 1 { "entry" } else { "entries" });
    }
}

fn path_fault(_: &mut ProbeContext, a: &Rmdir) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rmdir) {
    common::efault(sb, "pathname");
}

fn dot_last(_: &mut ProbeContext, a: &Rmdir) -> bool {
    a.last_component() == Some(b".")
}

fn render_dot(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rmdir) {
    sb.push_str("pathname has \".\" as last component");
}

fn dot_dot_last(_: &mut ProbeContext, a: &Rmdir) -> bool {
    a.last_component() == Some(b"..")
}

fn render_dot_dot(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rmdir) {
    sb.push_str("pathname has \"..\" as its final component");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Rmdir) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Rmdir) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn render_busy_row(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rmdir) {
    render_busy(sb, a.pathname.as_path(), "pathname");
}

fn render_not_empty_row(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rmdir) {
    render_not_empty(sb, a.pathname.as_path(), "pathname");
}

fn read_only_fs(_: &mut ProbeContext, a: &Rmdir) -> bool {
    a.pathname.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rmdir) {
    if let Some(p) = a.pathname.as_path() {
        common::erofs(sb, p, "pathname");
    }
}

static RMDIR_CAUSES: &[CauseTemplate<Rmdir>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(&[libc::EINVAL], dot_last, render_dot),
    CauseTemplate::new(&[libc::ENOTEMPTY, libc::EEXIST], dot_dot_last, render_dot_dot),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::EBUSY], cause::always, render_busy_row),
    CauseTemplate::new(&[libc::ENOTEMPTY, libc::EEXIST], cause::always, render_not_empty_row),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
];

impl Syscall for Rmdir {
    const NAME: &'static str = "rmdir";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        RMDIR_CAUSES
    }
}

entry_points! {
    Rmdir => explain_rmdir, explain_errno_rmdir, explain_message_rmdir, explain_message_errno_rmdir;
    <'a> (pathname: impl Into<UserStr<'a>>) => Rmdir { pathname: PathArg::probe(pathname) }
}

/// `rmdir(2)`, explaining any failure through the output sink.
pub fn rmdir_on_error(pathname: &Path) -> std::io::Result<()> {
    std::fs::remove_dir(pathname).map_err(|e| {
        let errnum = e.raw_os_error().unwrap_or(libc::EINVAL);
        report(explain_errno_rmdir(errnum, pathname), errnum)
    })
}

/// `rmdir(2)`, exiting with an explanation on failure.
pub fn rmdir_or_die(pathname: &Path) {
    if rmdir_on_error(pathname).is_err() {
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
    fn test_not_empty_counts_entries() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        std::fs::write(d.path().join("a"), b"").unwrap();
        std::fs::write(d.path().join("b"), b"").unwrap();
        let text = explain_errno_rmdir(libc::ENOTEMPTY, d.path());
        assert!(text.ends_with(
            "because pathname is not an empty directory; that is, it contains entries other \
             than \".\" and \"..\" (2 entries)"
        ));
    }

    #[test]
    #[serial]
    fn test_dot_last_component() {
        options::set_global(Options::new());
        let text = explain_errno_rmdir(libc::EINVAL, "/tmp/.");
        assert!(text.ends_with("because pathname has \".\" as last component"));
        let text = explain_errno_rmdir(libc::EINVAL, "foo/./");
        assert!(text.ends_with("because pathname has \".\" as last component"));
    }

    #[test]
    #[serial]
    fn test_not_a_directory() {
        options::set_global(Options::new());
        let f = tempfile::NamedTempFile::new().unwrap();
        let text = explain_errno_rmdir(libc::ENOTDIR, f.path());
        assert!(text.contains("regular file in the pathname"), "{}", text);
        assert!(text.ends_with("is being used as a directory when it is not"));
    }
}
