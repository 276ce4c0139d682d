//! `chdir(2)`

use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{FileKind, ProbeContext, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;
use crate::permission::Access;

use super::{open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chdir {
    pub pathname: PathArg,
}

impl Chdir {
    fn spec(&self) -> FinalSpec {
        FinalSpec::new("pathname")
            .must_be(FileKind::Directory)
            .want(Access::Search)
    }
}

fn path_fault(_: &mut ProbeContext, a: &Chdir) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Chdir) {
    common::efault(sb, "pathname");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Chdir) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Chdir) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn render_enomem(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Chdir) {
    common::enomem_kernel(sb);
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Chdir) {
    common::eio(sb);
}

static CHDIR_CAUSES: &[CauseTemplate<Chdir>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::ENOMEM], cause::always, render_enomem),
    CauseTemplate::new(&[libc::EIO], cause::always, render_eio),
];

impl Syscall for Chdir {
    const NAME: &'static str = "chdir";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        CHDIR_CAUSES
    }
}

entry_points! {
    Chdir => explain_chdir, explain_errno_chdir, explain_message_chdir, explain_message_errno_chdir;
    <'a> (pathname: impl Into<UserStr<'a>>) => Chdir { pathname: PathArg::probe(pathname) }
}

/// `chdir(2)`, explaining any failure through the output sink.
pub fn chdir_on_error(pathname: &Path) -> std::io::Result<()> {
    nix::unistd::chdir(pathname).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_chdir(errnum, pathname), errnum)
    })
}

/// `chdir(2)`, exiting with an explanation on failure.
pub fn chdir_or_die(pathname: &Path) {
    if chdir_on_error(pathname).is_err() {
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
    fn test_not_a_directory() {
        options::set_global(Options::new());
        let f = tempfile::NamedTempFile::new().unwrap();
        let text = explain_errno_chdir(libc::ENOTDIR, f.path());
        assert!(text.contains("(ENOTDIR) because the \""));
        assert!(text.ends_with("is being used as a directory when it is not"));
    }

    #[test]
    #[serial]
    fn test_missing() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_chdir(libc::ENOENT, "/nonexistent"),
            "chdir(\"/nonexistent\") failed, No such file or directory (ENOENT) because there \
             is no \"nonexistent\" in the pathname, /"
        );
    }
}
