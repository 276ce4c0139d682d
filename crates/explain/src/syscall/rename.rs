//! `rename(2)`

use std::fmt::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use explain_core::{Options, StringBuffer};
use explain_probe::{device, fs, stat, ProbeContext, Stat, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;

use super::rmdir::render_not_empty;
use super::unlink::{is_mount_point, render_busy};
use super::{comma, open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub oldpath: PathArg,
    pub newpath: PathArg,
}

impl Rename {
    fn old_spec(&self) -> FinalSpec {
        FinalSpec::new("oldpath").removing().no_follow()
    }

    fn new_spec(&self) -> FinalSpec {
        FinalSpec::new("newpath").creating().no_follow()
    }

    fn old_stat(&self) -> Option<Stat> {
        self.oldpath.as_path().and_then(|p| stat::lstat(p).ok())
    }

    fn new_stat(&self) -> Option<Stat> {
        self.newpath.as_path().and_then(|p| stat::lstat(p).ok())
    }
}

/// Absolute form of `path`, canonicalizing as much of it as exists.
fn absolute(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = path.canonicalize() {
        return Some(p);
    }
    let parent = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    Some(parent.canonicalize().ok()?.join(path.file_name()?))
}

fn old_fault(_: &mut ProbeContext, a: &Rename) -> bool {
    a.oldpath.is_fault()
}

fn render_old_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rename) {
    common::efault(sb, "oldpath");
}

fn new_fault(_: &mut ProbeContext, a: &Rename) -> bool {
    a.newpath.is_fault()
}

fn render_new_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rename) {
    common::efault(sb, "newpath");
}

fn old_resolution(ctx: &mut ProbeContext, a: &Rename) -> bool {
    path_applies(ctx, &a.oldpath, &a.old_spec())
}

fn render_old_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Rename) {
    path_explain(sb, ctx, &a.oldpath, &a.old_spec());
}

fn new_resolution(ctx: &mut ProbeContext, a: &Rename) -> bool {
    path_applies(ctx, &a.newpath, &a.new_spec())
}

fn render_new_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Rename) {
    path_explain(sb, ctx, &a.newpath, &a.new_spec());
}

fn render_cross_device(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Rename) {
    sb.push_str("oldpath and newpath are not on the same mounted filesystem");
    if !ctx.options.dialect_specific {
        return;
    }
    let mount = |p: &PathArg| p.as_path().and_then(fs::mount_of).map(|m| m.mount_point);
    if let (Some(from), Some(to)) = (mount(&a.oldpath), mount(&a.newpath)) {
        if device::same_device(&from, &to) == Some(false) {
            sb.push_str(" (");
            sb.push_bytes(from.as_os_str().as_bytes());
            sb.push_str(" versus ");
            sb.push_bytes(to.as_os_str().as_bytes());
            sb.push_char(')');
        }
    }
}

fn into_itself(_: &mut ProbeContext, a: &Rename) -> bool {
    let (Some(old), Some(new)) = (a.oldpath.as_path(), a.newpath.as_path()) else {
        return false;
    };
    match (absolute(old), absolute(new)) {
        (Some(o), Some(n)) => n != o && n.starts_with(&o),
        _ => false,
    }
}

fn render_into_itself(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rename) {
    sb.push_str(
        "newpath contains a path prefix of oldpath, or, more generally, an attempt was made \
         to make a directory a subdirectory of itself",
    );
}

fn dir_over_file(_: &mut ProbeContext, a: &Rename) -> bool {
    match (a.old_stat(), a.new_stat()) {
        (Some(o), Some(n)) => o.is_dir() && !n.is_dir(),
        _ => false,
    }
}

fn render_dir_over_file(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    sb.push_str("oldpath is a directory, and newpath exists but is not a directory");
    if let Some(n) = a.new_stat() {
        let _ = write!(sb, " (it is a {})", n.kind.describe());
    }
}

fn file_over_dir(_: &mut ProbeContext, a: &Rename) -> bool {
    match (a.old_stat(), a.new_stat()) {
        (Some(o), Some(n)) => !o.is_dir() && n.is_dir(),
        _ => false,
    }
}

fn render_file_over_dir(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Rename) {
    sb.push_str("newpath is an existing directory, but oldpath is not a directory");
}

fn render_new_not_empty(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    render_not_empty(sb, a.newpath.as_path(), "newpath");
}

fn render_busy_row(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    match a.newpath.as_path() {
        Some(p) if is_mount_point(p) => render_busy(sb, Some(p), "newpath"),
        _ => render_busy(sb, a.oldpath.as_path(), "oldpath"),
    }
}

fn render_too_many_links(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    sb.push_str(
        "oldpath already has the maximum number of links to it, or it was a directory and \
         the directory containing newpath has the maximum number of links",
    );
    if let Some(max) = a.oldpath.as_path().and_then(fs::link_max) {
        let _ = write!(sb, " ({})", max);
    }
}

fn render_no_space(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    if let Some(p) = a.newpath.as_path() {
        common::enospc(sb, p, "newpath");
    }
}

fn read_only_fs(_: &mut ProbeContext, a: &Rename) -> bool {
    a.oldpath.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Rename) {
    if let Some(p) = a.oldpath.as_path() {
        common::erofs(sb, p, "oldpath");
    }
}

static RENAME_CAUSES: &[CauseTemplate<Rename>] = &[
    CauseTemplate::new(&[libc::EFAULT], old_fault, render_old_fault),
    CauseTemplate::new(&[libc::EFAULT], new_fault, render_new_fault),
    CauseTemplate::new(PATH_ERRNOS, old_resolution, render_old_resolution),
    CauseTemplate::new(PATH_ERRNOS, new_resolution, render_new_resolution),
    CauseTemplate::new(&[libc::EXDEV], cause::always, render_cross_device),
    CauseTemplate::new(&[libc::EINVAL], into_itself, render_into_itself),
    CauseTemplate::new(&[libc::ENOTDIR], dir_over_file, render_dir_over_file),
    CauseTemplate::new(&[libc::EISDIR], file_over_dir, render_file_over_dir),
    CauseTemplate::new(&[libc::ENOTEMPTY, libc::EEXIST], cause::always, render_new_not_empty),
    CauseTemplate::new(&[libc::EBUSY], cause::always, render_busy_row),
    CauseTemplate::new(&[libc::EMLINK], cause::always, render_too_many_links),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], cause::always, render_no_space),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
];

impl Syscall for Rename {
    const NAME: &'static str = "rename";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.oldpath.print(sb);
        comma(sb);
        self.newpath.print(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        RENAME_CAUSES
    }
}

entry_points! {
    Rename => explain_rename, explain_errno_rename, explain_message_rename, explain_message_errno_rename;
    <'a, 'b> (oldpath: impl Into<UserStr<'a>>, newpath: impl Into<UserStr<'b>>) => Rename {
        oldpath: PathArg::probe(oldpath),
        newpath: PathArg::probe(newpath),
    }
}

/// `rename(2)`, explaining any failure through the output sink.
pub fn rename_on_error(oldpath: &Path, newpath: &Path) -> std::io::Result<()> {
    std::fs::rename(oldpath, newpath).map_err(|e| {
        let errnum = e.raw_os_error().unwrap_or(libc::EINVAL);
        report(explain_errno_rename(errnum, oldpath, newpath), errnum)
    })
}

/// `rename(2)`, exiting with an explanation on failure.
pub fn rename_or_die(oldpath: &Path, newpath: &Path) {
    if rename_on_error(oldpath, newpath).is_err() {
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
    fn test_cross_device() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_rename(libc::EXDEV, "/mnt/a/x", "/mnt/b/x"),
            "rename(\"/mnt/a/x\", \"/mnt/b/x\") failed, Invalid cross-device link (EXDEV) \
             because oldpath and newpath are not on the same mounted filesystem"
        );
    }

    #[test]
    #[serial]
    fn test_missing_oldpath() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let old = d.path().join("old");
        let new = d.path().join("new");
        let text = explain_errno_rename(libc::ENOENT, old.as_path(), new.as_path());
        assert!(text.ends_with(&format!(
            "because there is no \"old\" in the oldpath, {}",
            d.path().display()
        )));
    }

    #[test]
    #[serial]
    fn test_into_itself() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let inner = d.path().join("sub");
        let text = explain_errno_rename(libc::EINVAL, d.path(), inner.as_path());
        assert!(text.contains("(EINVAL) because newpath contains a path prefix of oldpath"));
    }

    #[test]
    #[serial]
    fn test_directory_over_file() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let sub = d.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let file = d.path().join("file");
        std::fs::write(&file, b"").unwrap();
        let text = explain_errno_rename(libc::ENOTDIR, sub.as_path(), file.as_path());
        assert!(text.ends_with(
            "because oldpath is a directory, and newpath exists but is not a directory \
             (it is a regular file)"
        ));
        let text = explain_errno_rename(libc::EISDIR, file.as_path(), sub.as_path());
        assert!(text.ends_with("because newpath is an existing directory, but oldpath is not a directory"));
    }
}
