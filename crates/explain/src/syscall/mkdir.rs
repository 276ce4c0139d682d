//! `mkdir(2)`

use std::fmt::Write;
use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{fs, stat, FileKind, ProbeContext, UserStr};
use nix::sys::stat::Mode;

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;
use crate::printers;

use super::{comma, open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mkdir {
    pub pathname: PathArg,
    pub mode: u32,
}

impl Mkdir {
    fn spec(&self) -> FinalSpec {
        FinalSpec::new("pathname")
            .creating()
            .must_not_exist()
            .must_be(FileKind::Directory)
            .no_follow()
    }

    fn parent(&self) -> Option<&Path> {
        self.pathname
            .as_path()
            .map(|p| p.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new(".")))
    }
}

fn path_fault(_: &mut ProbeContext, a: &Mkdir) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Mkdir) {
    common::efault(sb, "pathname");
}

fn render_exists(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Mkdir) {
    let existing = a.pathname.as_path().and_then(|p| stat::lstat(p).ok());
    match existing {
        Some(st) => {
            let _ = write!(sb, "pathname already exists as a {}", st.kind.describe());
            if st.is_symlink() {
                sb.push_str(", mkdir does not follow symbolic links");
            }
        }
        None => sb.push_str("pathname already exists (not necessarily as a directory)"),
    }
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Mkdir) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Mkdir) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn render_too_many_links(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Mkdir) {
    sb.push_str("the parent directory already has the maximum number of links");
    if let Some(max) = a.parent().and_then(fs::link_max) {
        let _ = write!(sb, " ({})", max);
    }
}

fn render_no_space(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Mkdir) {
    if let Some(p) = a.pathname.as_path() {
        common::enospc(sb, p, "pathname");
    }
}

fn read_only_fs(_: &mut ProbeContext, a: &Mkdir) -> bool {
    a.pathname.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Mkdir) {
    if let Some(p) = a.pathname.as_path() {
        common::erofs(sb, p, "pathname");
    }
}

fn render_enomem(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Mkdir) {
    common::enomem_kernel(sb);
}

static MKDIR_CAUSES: &[CauseTemplate<Mkdir>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(&[libc::EEXIST], cause::always, render_exists),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::EMLINK], cause::always, render_too_many_links),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], cause::always, render_no_space),
    CauseTemplate::new(&[libc::EROFS], read_only_fs, render_read_only),
    CauseTemplate::new(&[libc::ENOMEM], cause::always, render_enomem),
];

impl Syscall for Mkdir {
    const NAME: &'static str = "mkdir";

    fn print_signature(&self, sb: &mut StringBuffer, opts: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        comma(sb);
        printers::print_permission_mode(sb, self.mode, opts);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        MKDIR_CAUSES
    }
}

entry_points! {
    Mkdir => explain_mkdir, explain_errno_mkdir, explain_message_mkdir, explain_message_errno_mkdir;
    <'a> (pathname: impl Into<UserStr<'a>>, mode: u32) => Mkdir {
        pathname: PathArg::probe(pathname),
        mode,
    }
}

/// `mkdir(2)`, explaining any failure through the output sink.
pub fn mkdir_on_error(pathname: &Path, mode: u32) -> std::io::Result<()> {
    nix::unistd::mkdir(pathname, Mode::from_bits_truncate(mode as libc::mode_t)).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_mkdir(errnum, pathname, mode), errnum)
    })
}

/// `mkdir(2)`, exiting with an explanation on failure.
pub fn mkdir_or_die(pathname: &Path, mode: u32) {
    if mkdir_on_error(pathname, mode).is_err() {
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
    fn test_exists_as_file() {
        options::set_global(Options::new());
        let f = tempfile::NamedTempFile::new().unwrap();
        let text = explain_errno_mkdir(libc::EEXIST, f.path(), 0o755);
        assert!(text.starts_with(&format!("mkdir(\"{}\", 0755) failed", f.path().display())));
        assert!(text.ends_with("because pathname already exists as a regular file"));
    }

    #[test]
    #[serial]
    fn test_missing_parent() {
        options::set_global(Options::new());
        let d = tempfile::tempdir().unwrap();
        let p = d.path().join("no").join("leaf");
        let text = explain_errno_mkdir(libc::ENOENT, p.as_path(), 0o700);
        assert!(text.ends_with(&format!(
            "because there is no \"no\" directory in the pathname, {}",
            d.path().display()
        )));
    }
}
