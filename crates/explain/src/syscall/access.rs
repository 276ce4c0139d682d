//! `access(2)`
//!
//! Checks run against the real UID and GID, as the kernel does for this
//! call.

use std::path::Path;

use explain_core::{Options, StringBuffer};
use explain_probe::{pids, ProbeContext, UserStr};
use nix::unistd::AccessFlags;

use crate::cause::CauseTemplate;
use crate::common;
use crate::path_resolution::FinalSpec;
use crate::permission::Access as Want;
use crate::printers;

use super::{comma, open_paren, path_applies, path_explain, report, PathArg, Syscall, PATH_ERRNOS};

const KNOWN_BITS: i32 = libc::R_OK | libc::W_OK | libc::X_OK;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub pathname: PathArg,
    pub mode: i32,
}

impl Access {
    fn wants(&self, bit: i32) -> bool {
        self.mode & bit != 0
    }

    fn spec(&self) -> FinalSpec {
        let mut spec = FinalSpec::new("pathname");
        if self.wants(libc::R_OK) {
            spec = spec.want(Want::Read);
        }
        if self.wants(libc::W_OK) {
            spec = spec.want(Want::Write);
        }
        if self.wants(libc::X_OK) {
            spec = spec.want(Want::Execute);
        }
        spec
    }
}

fn path_fault(_: &mut ProbeContext, a: &Access) -> bool {
    a.pathname.is_fault()
}

fn render_path_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Access) {
    common::efault(sb, "pathname");
}

fn bad_mode(_: &mut ProbeContext, a: &Access) -> bool {
    a.mode & !KNOWN_BITS != 0
}

fn render_bad_mode(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Access) {
    common::einval_bits(sb, "mode");
}

fn resolution_fails(ctx: &mut ProbeContext, a: &Access) -> bool {
    path_applies(ctx, &a.pathname, &a.spec())
}

fn render_resolution(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Access) {
    path_explain(sb, ctx, &a.pathname, &a.spec());
}

fn write_on_read_only(_: &mut ProbeContext, a: &Access) -> bool {
    a.wants(libc::W_OK) && a.pathname.as_path().map(common::on_read_only_fs).unwrap_or(false)
}

fn render_read_only(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Access) {
    if let Some(p) = a.pathname.as_path() {
        common::erofs(sb, p, "pathname");
    }
}

fn write_on_executing(_: &mut ProbeContext, a: &Access) -> bool {
    a.wants(libc::W_OK)
}

fn render_busy(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Access) {
    sb.push_str(
        "write access was requested to an executable which is currently being executed",
    );
    if let Some(p) = a.pathname.as_path() {
        common::push_holders(sb, &pids::executing(p));
    }
}

fn render_enomem(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Access) {
    common::enomem_kernel(sb);
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Access) {
    common::eio(sb);
}

static ACCESS_CAUSES: &[CauseTemplate<Access>] = &[
    CauseTemplate::new(&[libc::EFAULT], path_fault, render_path_fault),
    CauseTemplate::new(&[libc::EINVAL], bad_mode, render_bad_mode),
    CauseTemplate::new(PATH_ERRNOS, resolution_fails, render_resolution),
    CauseTemplate::new(&[libc::EROFS], write_on_read_only, render_read_only),
    CauseTemplate::new(&[libc::ETXTBSY], write_on_executing, render_busy),
    CauseTemplate::new(&[libc::ENOMEM], crate::cause::always, render_enomem),
    CauseTemplate::new(&[libc::EIO], crate::cause::always, render_eio),
];

impl Syscall for Access {
    const NAME: &'static str = "access";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.pathname.print(sb);
        comma(sb);
        printers::print_access_mode(sb, self.mode);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        ACCESS_CAUSES
    }

    fn prepare(&self, ctx: &mut ProbeContext) {
        ctx.use_real_ids();
    }

    fn footnotes(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        if !ctx.options.dialect_specific || ctx.errnum != libc::EACCES {
            return;
        }
        // SAFETY: the id getters cannot fail.
        let (ruid, euid) = unsafe { (libc::getuid(), libc::geteuid()) };
        if ruid != euid {
            sb.add_footnote(format_args!(
                "access checks use the real UID ({}), not the effective UID ({})",
                ruid, euid
            ));
        }
    }
}

entry_points! {
    Access => explain_access, explain_errno_access, explain_message_access, explain_message_errno_access;
    <'a> (pathname: impl Into<UserStr<'a>>, mode: i32) => Access {
        pathname: PathArg::probe(pathname),
        mode,
    }
}

/// `access(2)`, explaining any failure through the output sink.
pub fn access_on_error(pathname: &Path, mode: i32) -> std::io::Result<()> {
    nix::unistd::access(pathname, AccessFlags::from_bits_truncate(mode)).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_access(errnum, pathname, mode), errnum)
    })
}

/// `access(2)`, exiting with an explanation on failure.
pub fn access_or_die(pathname: &Path, mode: i32) {
    if access_on_error(pathname, mode).is_err() {
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
    fn test_signature_names_mode_bits() {
        options::set_global(Options::new());
        let text = explain_errno_access(libc::ENOENT, "/nonexistent/x", libc::R_OK | libc::W_OK);
        assert_eq!(
            text,
            "access(\"/nonexistent/x\", R_OK | W_OK) failed, No such file or directory (ENOENT) \
             because there is no \"nonexistent\" directory in the pathname, /"
        );
        let text = explain_errno_access(libc::ENOENT, "/nonexistent", libc::F_OK);
        assert!(text.starts_with("access(\"/nonexistent\", F_OK) failed"));
    }

    #[test]
    #[serial]
    fn test_invalid_mode_bits() {
        options::set_global(Options::new());
        let text = explain_errno_access(libc::EINVAL, "/", 0x40);
        assert!(text.starts_with("access(\"/\", 0x40) failed"));
        assert!(text.ends_with("because the mode argument contains one or more invalid bits"));
    }
}
