//! `stat(2)`

use std::mem::MaybeUninit;
use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{is_efault, ProbeContext, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::path_resolution::FinalSpec;
use crate::printers;

use super::{comma, open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub pathname: PathArg,
    /// Address of the caller's `struct stat`
    pub buf: usize,
}

impl Stat {
    fn spec(&self) -> FinalSpec {
        FinalSpec::new("pathname")
    }
}

fn path_fault(_: &mut ProbeContext, a: &Stat) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Stat) {
    common::efault(sb, "pathname");
}

fn buf_fault(_: &mut ProbeContext, a: &Stat) -> bool {
    a.buf == 0 || is_efault(a.buf as *const u8, std::mem::size_of::<libc::stat>())
}

fn render_buf_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Stat) {
    common::efault(sb, "buf");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Stat) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Stat) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn render_overflow(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Stat) {
    sb.push_str(
        "pathname refers to a file whose size, inode number, or number of blocks cannot be \
         represented in the types used by the stat structure",
    );
}

fn render_enomem(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Stat) {
    common::enomem_kernel(sb);
}

static STAT_CAUSES: &[CauseTemplate<Stat>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(&[libc::EFAULT], buf_fault, render_buf_fault),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::EOVERFLOW], cause::always, render_overflow),
    CauseTemplate::new(&[libc::ENOMEM], cause::always, render_enomem),
];

impl Syscall for Stat {
    const NAME: &'static str = "stat";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        comma(sb);
        printers::print_pointer(sb, self.buf);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        STAT_CAUSES
    }
}

entry_points! {
    Stat => explain_stat, explain_errno_stat, explain_message_stat, explain_message_errno_stat;
    <'a> (pathname: impl Into<UserStr<'a>>, buf: *const libc::stat) => Stat {
        pathname: PathArg::probe(pathname),
        buf: buf as usize,
    }
}

/// `stat(2)`, explaining any failure through the output sink.
pub fn stat_on_error(pathname: &Path) -> std::io::Result<libc::stat> {
    nix::sys::stat::stat(pathname).map_err(|e| {
        let errnum = e as i32;
        let slot = MaybeUninit::<libc::stat>::uninit();
        report(explain_errno_stat(errnum, pathname, slot.as_ptr()), errnum)
    })
}

/// `stat(2)`, exiting with an explanation on failure.
pub fn stat_or_die(pathname: &Path) -> libc::stat {
    stat_on_error(pathname).unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_null_buf() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_stat(libc::EFAULT, "/", std::ptr::null()),
            "stat(\"/\", NULL) failed, Bad address (EFAULT) because buf refers to memory that \
             is outside the process's accessible address space"
        );
    }

    #[test]
    #[serial]
    fn test_missing_component() {
        options::set_global(Options::new());
        let slot = MaybeUninit::<libc::stat>::uninit();
        let text = explain_errno_stat(libc::ENOENT, "/nonexistent/file", slot.as_ptr());
        assert!(text.starts_with("stat(\"/nonexistent/file\", 0x"));
        assert!(text.ends_with("there is no \"nonexistent\" directory in the pathname, /"));
    }
}
