//! `write(2)`

use std::fmt::Write as _;

use explain_core::{Options, StringBuffer};
use explain_probe::fildes::{self, FdInfo};
use explain_probe::rlimit::{self, Resource};
use explain_probe::{FileKind, ProbeContext, Probed, UserBuf};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::printers;

use super::read::{misaligned, DIRECT_ALIGN};
use super::{comma, open_paren, report, Syscall};

/// Bytes of the data argument shown in the signature.
const PREVIEW: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub fildes: i32,
    /// Leading bytes of the data, for display
    pub data: Probed<'static>,
    pub data_addr: usize,
    pub data_size: usize,
    /// Some byte of `data_size` is unreadable
    pub data_fault: bool,
}

impl Write {
    pub fn new<'a>(fildes: i32, data: impl Into<UserBuf<'a>>, data_size: usize) -> Self {
        let buf = data.into();
        let shown = buf.probe(PREVIEW.min(data_size)).into_owned();
        let data_fault = match buf {
            UserBuf::Slice(s) => s.len() < data_size,
            _ => data_size > 0 && buf.is_efault(),
        };
        Self {
            fildes,
            data: shown,
            data_addr: buf.as_ptr() as usize,
            data_size,
            data_fault,
        }
    }

    fn info(&self) -> Option<FdInfo> {
        fildes::inspect(self.fildes)
    }
}

// ── Causes ───────────────────────────────────────────────────────

fn not_open(_: &mut ProbeContext, a: &Write) -> bool {
    !fildes::is_open(a.fildes)
}

fn render_ebadf(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Write) {
    common::ebadf(sb, ctx, a.fildes, "fildes");
}

fn not_writable(_: &mut ProbeContext, a: &Write) -> bool {
    a.info().map(|i| !i.access.writable()).unwrap_or(false)
}

fn render_not_writable(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Write) {
    common::not_open_for_writing(sb, a.fildes, "fildes");
}

fn data_faults(_: &mut ProbeContext, a: &Write) -> bool {
    a.data_fault || a.data.is_null()
}

fn render_data_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    common::efault(sb, "data");
}

fn nonblocking(_: &mut ProbeContext, a: &Write) -> bool {
    a.info().map(|i| i.is_nonblocking()).unwrap_or(false)
}

fn render_would_block(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    sb.push_str(
        "the file descriptor has been marked non-blocking (O_NONBLOCK) and the write would block",
    );
}

fn pipe_or_socket(_: &mut ProbeContext, a: &Write) -> bool {
    a.info()
        .map(|i| matches!(i.kind(), FileKind::Fifo | FileKind::Socket))
        .unwrap_or(false)
}

fn render_broken_pipe(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    sb.push_str(
        "the file descriptor is connected to a pipe or socket whose reading end is closed, \
         when this happens the writing process will also receive a SIGPIPE signal",
    );
}

fn unconnected_socket(_: &mut ProbeContext, a: &Write) -> bool {
    fildes::is_socket(a.fildes)
}

fn render_no_peer(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    sb.push_str(
        "fildes refers to a datagram socket for which a peer address has not been set using \
         connect(2)",
    );
}

fn direct_misaligned(_: &mut ProbeContext, a: &Write) -> bool {
    a.info().map(|i| i.is_direct()).unwrap_or(false)
        && misaligned(a.data_addr, a.data_size, a.fildes)
}

fn render_direct(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    let _ = write!(
        sb,
        "the file descriptor was opened with O_DIRECT and either the address of data, the value \
         of data_size, or the file offset is not suitably aligned (multiple of {})",
        DIRECT_ALIGN
    );
}

fn render_unsuitable(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Write) {
    sb.push_str("fildes is attached to an object which is unsuitable for writing");
    if let Some(info) = a.info() {
        let _ = write!(sb, " ({})", info.kind().describe());
    }
}

fn render_too_big(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    sb.push_str(
        "an attempt was made to write a file that exceeds the implementation-defined maximum \
         file size or the process's file size limit",
    );
    if let Some(soft) = rlimit::get(Resource::FileSize).and_then(|l| l.soft) {
        let _ = write!(sb, " ({} is {})", Resource::FileSize.name(), soft);
    }
}

fn render_no_space(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Write) {
    common::enospc_fildes(sb, a.fildes, "fildes");
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Write) {
    common::eio(sb);
}

static WRITE_CAUSES: &[CauseTemplate<Write>] = &[
    CauseTemplate::new(&[libc::EBADF], not_open, render_ebadf),
    CauseTemplate::new(&[libc::EBADF], not_writable, render_not_writable),
    CauseTemplate::new(&[libc::EFAULT], data_faults, render_data_fault),
    CauseTemplate::new(&[libc::EAGAIN], nonblocking, render_would_block),
    CauseTemplate::new(&[libc::EPIPE], pipe_or_socket, render_broken_pipe),
    CauseTemplate::new(&[libc::EDESTADDRREQ], unconnected_socket, render_no_peer),
    CauseTemplate::new(&[libc::EINVAL], direct_misaligned, render_direct),
    CauseTemplate::new(&[libc::EINVAL], cause::always, render_unsuitable),
    CauseTemplate::new(&[libc::EFBIG], cause::always, render_too_big),
    CauseTemplate::new(&[libc::ENOSPC, libc::EDQUOT], cause::always, render_no_space),
    CauseTemplate::new(&[libc::EIO], cause::always, render_eio),
];

impl Syscall for Write {
    const NAME: &'static str = "write";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        printers::print_fildes(sb, self.fildes);
        comma(sb);
        match &self.data {
            Probed::Bytes(b) if b.len() < self.data_size => {
                sb.push_quoted_n(b, b.len());
                sb.push_str("...");
            }
            other => other.print(sb),
        }
        comma(sb);
        printers::print_size(sb, self.data_size);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        WRITE_CAUSES
    }

    fn footnotes(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        if ctx.errnum == libc::EPIPE && ctx.options.dialect_specific {
            sb.add_footnote(format_args!(
                "the SIGPIPE signal is only delivered when it is neither ignored nor blocked"
            ));
        }
    }
}

entry_points! {
    Write => explain_write, explain_errno_write, explain_message_write, explain_message_errno_write;
    <'a> (fildes: i32, data: impl Into<UserBuf<'a>>, data_size: usize) => Write::new(fildes, data, data_size)
}

/// `write(2)`, explaining any failure through the output sink.
pub fn write_on_error(fildes: i32, data: &[u8]) -> std::io::Result<usize> {
    // SAFETY: data is a valid readable buffer of data.len() bytes.
    let n = unsafe { libc::write(fildes, data.as_ptr() as *const libc::c_void, data.len()) };
    if n >= 0 {
        return Ok(n as usize);
    }
    let errnum = crate::assemble::last_errno();
    Err(report(explain_errno_write(errnum, fildes, data, data.len()), errnum))
}

/// `write(2)`, exiting with an explanation on failure.
pub fn write_or_die(fildes: i32, data: &[u8]) -> usize {
    write_on_error(fildes, data).unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;
    use std::os::fd::AsRawFd;

    #[test]
    #[serial]
    fn test_not_open_for_writing() {
        options::set_global(Options::new());
        let f = tempfile::NamedTempFile::new().unwrap();
        let ro = std::fs::File::open(f.path()).unwrap();
        let fd = ro.as_raw_fd();
        assert_eq!(
            explain_errno_write(libc::EBADF, fd, "hello", 5),
            format!(
                "write({}, \"hello\", 5) failed, Bad file descriptor (EBADF) because the fildes \
                 argument does not refer to an object that is open for writing (O_RDONLY)",
                fd
            )
        );
    }

    #[test]
    #[serial]
    fn test_long_data_is_elided() {
        options::set_global(Options::new());
        let data = "x".repeat(200);
        let text = explain_errno_write(libc::EIO, 1_000_000, data.as_str(), data.len());
        let expected = format!("write(1000000, \"{}\"..., 200) failed", "x".repeat(PREVIEW));
        assert!(text.starts_with(&expected), "{}", text);
    }

    #[test]
    #[serial]
    fn test_short_slice_faults() {
        options::set_global(Options::new());
        let text = explain_errno_write(libc::EFAULT, 1, "ab", 10);
        assert!(text.ends_with(
            "because data refers to memory that is outside the process's accessible address space"
        ));
    }

    #[test]
    #[serial]
    fn test_broken_pipe() {
        options::set_global(Options::new());
        let (r, w) = nix::unistd::pipe().unwrap();
        drop(r);
        let text = explain_errno_write(libc::EPIPE, w.as_raw_fd(), "x", 1);
        assert!(text.contains("(EPIPE) because the file descriptor is connected to a pipe"));
        assert!(text.ends_with("SIGPIPE signal"));
    }

    #[test]
    #[serial]
    fn test_would_block() {
        options::set_global(Options::new());
        let (_r, w) = nix::unistd::pipe().unwrap();
        let fd = w.as_raw_fd();
        // SAFETY: fd is the pipe's write end, still open.
        unsafe {
            let fl = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, fl | libc::O_NONBLOCK);
        }
        let text = explain_errno_write(libc::EAGAIN, fd, "x", 1);
        assert!(text.ends_with("marked non-blocking (O_NONBLOCK) and the write would block"));
    }
}
