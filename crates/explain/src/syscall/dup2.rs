//! `dup2(2)`

use std::fmt::Write;

use explain_core::{Options, StringBuffer};
use explain_probe::rlimit::{self, Resource};
use explain_probe::{fildes, ProbeContext};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::printers;

use super::{comma, open_paren, report, Syscall};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dup2 {
    pub oldfd: i32,
    pub newfd: i32,
}

fn old_not_open(_: &mut ProbeContext, a: &Dup2) -> bool {
    !fildes::is_open(a.oldfd)
}

fn render_old(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Dup2) {
    common::ebadf(sb, ctx, a.oldfd, "oldfd");
}

fn new_out_of_range(_: &mut ProbeContext, a: &Dup2) -> bool {
    a.newfd < 0 || fildes::beyond_limit(a.newfd)
}

fn render_new(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Dup2) {
    let _ = write!(
        sb,
        "the newfd argument is outside the allowed range for file descriptors ({}",
        a.newfd
    );
    if let Some(soft) = rlimit::get(Resource::OpenFiles).and_then(|l| l.soft) {
        let _ = write!(sb, " not in 0..{}", soft);
    }
    sb.push_char(')');
}

fn render_busy(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Dup2) {
    sb.push_str(
        "a race condition was detected with open(2) or dup(2), newfd was being allocated by \
         another thread",
    );
}

fn render_same(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Dup2) {
    sb.push_str("oldfd and newfd have the same value");
}

fn same(_: &mut ProbeContext, a: &Dup2) -> bool {
    a.oldfd == a.newfd
}

fn render_eintr(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Dup2) {
    common::eintr(sb, "dup2");
}

fn render_emfile(sb: &mut StringBuffer, ctx: &mut ProbeContext, _: &Dup2) {
    common::emfile(sb, ctx);
}

static DUP2_CAUSES: &[CauseTemplate<Dup2>] = &[
    CauseTemplate::new(&[libc::EBADF], old_not_open, render_old),
    CauseTemplate::new(&[libc::EBADF], new_out_of_range, render_new),
    CauseTemplate::new(&[libc::EBUSY], cause::always, render_busy),
    CauseTemplate::new(&[libc::EINVAL], same, render_same),
    CauseTemplate::new(&[libc::EINTR], cause::always, render_eintr),
    CauseTemplate::new(&[libc::EMFILE], cause::always, render_emfile),
];

impl Syscall for Dup2 {
    const NAME: &'static str = "dup2";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        printers::print_fildes(sb, self.oldfd);
        comma(sb);
        printers::print_fildes(sb, self.newfd);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        DUP2_CAUSES
    }
}

entry_points! {
    Dup2 => explain_dup2, explain_errno_dup2, explain_message_dup2, explain_message_errno_dup2;
    <> (oldfd: i32, newfd: i32) => Dup2 { oldfd, newfd }
}

/// `dup2(2)`, explaining any failure through the output sink.
pub fn dup2_on_error(oldfd: i32, newfd: i32) -> std::io::Result<i32> {
    nix::unistd::dup2(oldfd, newfd).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_dup2(errnum, oldfd, newfd), errnum)
    })
}

/// `dup2(2)`, exiting with an explanation on failure.
pub fn dup2_or_die(oldfd: i32, newfd: i32) -> i32 {
    dup2_on_error(oldfd, newfd).unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_old_closed() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_dup2(libc::EBADF, 876_543, 10),
            "dup2(876543, 10) failed, Bad file descriptor (EBADF) because the oldfd argument \
             does not refer to a valid open file descriptor"
        );
    }

    #[test]
    #[serial]
    fn test_new_negative() {
        options::set_global(Options::new());
        let text = explain_errno_dup2(libc::EBADF, 0, -5);
        assert!(text.contains(
            "because the newfd argument is outside the allowed range for file descriptors (-5"
        ));
    }
}
