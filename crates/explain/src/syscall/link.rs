//! `link(2)`

use std::fmt::Write;
use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{fs, stat, ProbeContext, Stat, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;

use super::{comma, open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub oldpath: PathArg,
    pub newpath: PathArg,
}

impl Link {
    fn old_spec(&self) -> FinalSpec {
        FinalSpec::new("oldpath").no_follow()
    }

    fn new_spec(&self) -> FinalSpec {
        FinalSpec::new("newpath").creating().must_not_exist().no_follow()
    }

    fn old_stat(&self) -> Option<Stat> {
        self.oldpath.as_path().and_then(|p| stat::lstat(p).ok())
    }
}

fn old_fault(_: &mut ProbeContext, a: &Link) -> bool {
    a.oldpath.is_fault()
}

fn render_old_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Link) {
    common::efault(sb, "oldpath");
}

fn new_fault(_: &mut ProbeContext, a: &Link) -> bool {
    a.newpath.is_fault()
}

fn render_new_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Link) {
    common::efault(sb, "newpath");
}

fn old_resolution(ctx: &mut ProbeContext, a: &Link) -> bool {
    path_applies(ctx, &a.oldpath, &a.old_spec())
}

fn render_old_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Link) {
    path_explain(sb, ctx, &a.oldpath, &a.old_spec());
}

fn new_resolution(ctx: &mut ProbeContext, a: &Link) -> bool {
    path_applies(ctx, &a.newpath, &a.new_spec())
}

fn render_new_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Link) {
    path_explain(sb, ctx, &a.newpath, &a.new_spec());
}

fn render_exists(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Link) {
    sb.push_str("newpath already exists");
    if let Some(st) = a.newpath.as_path().and_then(|p| stat::lstat(p).ok()) {
        let _ = write!(sb, " as a {}", st.kind.describe());
    }
}

fn old_is_directory(_: &mut ProbeContext, a: &Link) -> bool {
    a.old_stat().map(|s| s.is_dir()).unwrap_or(false)
}

fn render_directory(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Link) {
    sb.push_str(
        "oldpath is a directory and it is not possible to make hard links to directories; \
         have you considered using a symbolic link?",
    );
}

fn render_too_many_links(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Link) {
    sb.push_str("oldpath already has the maximum number of links to it");
    let max = a.oldpath.as_path().and_then(fs::link_max);
    match (a.old_stat(), max) {
        (Some(st), Some(max)) => {
            let _ = write!(sb, " ({} of {})", st.nlink, max);
        }
        (None, Some(max)) => {
            let _ = write!(sb, " ({})", max);
        }
        _ => {}
    }
}

fn render_cross_device(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Link) {
    sb.push_str("oldpath and newpath are not on the same mounted filesystem");
}

fn render_no_space(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Link) {
    if let Some(p) = a.newpath.as_path() {
        common::enospc(sb, p, "newpath");
    }
}

fn read_only_fs(_: &mut ProbeContext, a: &Link) -> bool {
    a.newpath.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Link) {
    if let Some(p) = a.newpath.as_path() {
        common::erofs(sb, p, "newpath");
    }
}

static LINK_CAUSES: &[CauseTemplate<Link>] = &[
    CauseTemplate::new(&[libc::EFAULT], old_fault, render_old_fault),
    CauseTemplate::new(&[libc::EFAULT], new_fault, render_new_fault),
    CauseTemplate::new(PATH_ERRNOS, old_resolution, render_old_resolution),
    CauseTemplate::new(PATH_ERRNOS, new_resolution, render_new_resolution),
    CauseTemplate::new(&[libc::EEXIST], cause::always, render_exists),
    CauseTemplate::new(&[libc::EPERM], old_is_directory, render_directory),
    CauseTemplate::new(&[libc::EMLINK], cause::always, render_too_many_links),
    CauseTemplate::new(&[libc::EXDEV], cause::always, render_cross_device),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], cause::always, render_no_space),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
];

impl Syscall for Link {
    const NAME: &'static str = "link";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.oldpath.print(sb);
        comma(sb);
        self.newpath.print(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        LINK_CAUSES
    }
}

entry_points! {
    Link => explain_link, explain_errno_link, explain_message_link, explain_message_errno_link;
    <'a, 'b> (oldpath: impl Into<UserStr<'a>>, newpath: impl Into<UserStr<'b>>) => Link {
        oldpath: PathArg::probe(oldpath),
        newpath: PathArg::probe(newpath),
    }
}

/// `link(2)`, explaining any failure through the output sink.
pub fn link_on_error(oldpath: &Path, newpath: &Path) -> std::io::Result<()> {
    std::fs::hard_link(oldpath, newpath).map_err(|e| {
        let errnum = e.raw_os_error().unwrap_or(libc::EINVAL);
        report(explain_errno_link(errnum, oldpath, newpath), errnum)
    })
}

/// `link(2)`, exiting with an explanation on failure.
pub fn link_or_die(oldpath: &Path, newpath: &Path) {
    if link_on_error(oldpath, newpath).is_err() {
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
    fn test_directory_hard_link() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let new = d.path().join("alias");
        let text = explain_errno_link(libc::EPERM, d.path(), new.as_path());
        assert!(text.ends_with(
            "because oldpath is a directory and it is not possible to make hard links to \
             directories; have you considered using a symbolic link?"
        ));
    }

    #[test]
    #[serial]
    fn test_newpath_exists() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let a = d.path().join("a");
        let b = d.path().join("b");
        std::fs::write(&a, b"").unwrap();
        std::fs::write(&b, b"").unwrap();
        let text = explain_errno_link(libc::EEXIST, a.as_path(), b.as_path());
        assert!(text.ends_with("because newpath already exists as a regular file"));
    }
}
