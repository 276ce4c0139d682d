//! `close(2)`

use explain_core::{Options, StringBuffer};
use explain_probe::{fildes, ProbeContext};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::printers;

use super::{open_paren, report, Syscall};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Close {
    pub fildes: i32,
}

fn not_open(_: &mut ProbeContext, a: &Close) -> bool {
    !fildes::is_open(a.fildes)
}

fn render_ebadf(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Close) {
    common::ebadf(sb, ctx, a.fildes, "fildes");
}

fn render_eintr(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Close) {
    common::eintr(sb, "close");
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Close) {
    common::eio(sb);
}

fn render_enospc(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Close) {
    common::enospc_fildes(sb, a.fildes, "fildes");
}

static CLOSE_CAUSES: &[CauseTemplate<Close>] = &[
    CauseTemplate::new(&[libc::EBADF], not_open, render_ebadf),
    CauseTemplate::new(&[libc::EINTR], cause::always, render_eintr),
    CauseTemplate::new(&[libc::EIO], cause::always, render_eio),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], cause::always, render_enospc),
];

impl Syscall for Close {
    const NAME: &'static str = "close";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        printers::print_fildes(sb, self.fildes);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        CLOSE_CAUSES
    }

    fn footnotes(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        if ctx.errnum == libc::EINTR {
            sb.add_footnote(format_args!(
                "on Linux the descriptor is released even when close is interrupted, so it \
                 must not be closed again"
            ));
        }
    }
}

entry_points! {
    Close => explain_close, explain_errno_close, explain_message_close, explain_message_errno_close;
    <> (fildes: i32) => Close { fildes }
}

/// `close(2)`, explaining any failure through the output sink.
pub fn close_on_error(fildes: i32) -> std::io::Result<()> {
    nix::unistd::close(fildes).map_err(|e| {
        let errnum = e as i32;
        report(explain_errno_close(errnum, fildes), errnum)
    })
}

/// `close(2)`, exiting with an explanation on failure.
pub fn close_or_die(fildes: i32) {
    if close_on_error(fildes).is_err() {
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
    fn test_bad_descriptor() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_close(libc::EBADF, 987_654),
            "close(987654) failed, Bad file descriptor (EBADF) because the fildes argument \
             does not refer to a valid open file descriptor"
        );
    }

    #[test]
    #[serial]
    fn test_interrupted_has_footnote() {
        options::set_global(Options::new());
        let text = explain_errno_close(libc::EINTR, 0);
        assert!(text.contains("because the close system call was interrupted"));
        assert!(text.contains("; on Linux the descriptor is released"));
    }

    #[test]
    #[serial]
    fn test_message_buffer() {
        options::set_global(Options::new());
        let mut buf = [0u8; 40];
        let text = explain_message_errno_close(&mut buf, libc::EBADF, -3).to_string();
        assert_eq!(text, "close(-3) failed, Bad file descriptor (");
        assert_eq!(buf[39], 0);
    }
}
