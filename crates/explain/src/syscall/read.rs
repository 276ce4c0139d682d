//! `read(2)`

use std::fmt::Write;

use explain_core::{Options, StringBuffer};
use explain_probe::fildes::{self, FdInfo};
use explain_probe::{is_efault, FileKind, ProbeContext};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::printers;

use super::{comma, open_paren, report, Syscall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub fildes: i32,
    /// Address of the caller's buffer
    pub data: usize,
    pub data_size: usize,
}

impl Read {
    fn info(&self) -> Option<FdInfo> {
        fildes::inspect(self.fildes)
    }
}

/// Alignment O_DIRECT transfers need on most filesystems.
pub(crate) const DIRECT_ALIGN: usize = 512;

pub(crate) fn misaligned(addr: usize, size: usize, fd: i32) -> bool {
    // SAFETY: lseek with SEEK_CUR and offset 0 only reports the position.
    let pos = unsafe { libc::lseek(fd, 0, libc::SEEK_CUR) };
    addr % DIRECT_ALIGN != 0 || size % DIRECT_ALIGN != 0 || (pos >= 0 && pos as usize % DIRECT_ALIGN != 0)
}

/// Is `fd` a terminal this process may not read from because it is in a
/// background process group?
pub(crate) fn background_tty(fd: i32) -> bool {
    if !fildes::is_tty(fd) {
        return false;
    }
    // SAFETY: neither call has memory-safety preconditions.
    let (fg, own) = unsafe { (libc::tcgetpgrp(fd), libc::getpgrp()) };
    fg >= 0 && fg != own
}

// ── Causes ───────────────────────────────────────────────────────

fn not_open(_: &mut ProbeContext, a: &Read) -> bool {
    !fildes::is_open(a.fildes)
}

fn render_ebadf(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Read) {
    common::ebadf(sb, ctx, a.fildes, "fildes");
}

fn not_readable(_: &mut ProbeContext, a: &Read) -> bool {
    a.info().map(|i| !i.access.readable()).unwrap_or(false)
}

fn render_not_readable(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Read) {
    common::not_open_for_reading(sb, a.fildes, "fildes");
}

fn data_faults(_: &mut ProbeContext, a: &Read) -> bool {
    a.data == 0 || is_efault(a.data as *const u8, a.data_size.max(1))
}

fn render_data_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    common::efault(sb, "data");
}

fn nonblocking(_: &mut ProbeContext, a: &Read) -> bool {
    a.info().map(|i| i.is_nonblocking()).unwrap_or(false)
}

fn render_would_block(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    sb.push_str(
        "non-blocking I/O has been selected using O_NONBLOCK and no data was immediately \
         available for reading",
    );
}

fn is_directory(_: &mut ProbeContext, a: &Read) -> bool {
    a.info().map(|i| i.kind() == FileKind::Directory).unwrap_or(false)
}

fn render_directory(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    sb.push_str(
        "fildes refers to a directory, and you must use getdents(2) to read directories, \
         preferably via the higher-level interface provided by readdir(3)",
    );
}

fn direct_misaligned(_: &mut ProbeContext, a: &Read) -> bool {
    a.info().map(|i| i.is_direct()).unwrap_or(false) && misaligned(a.data, a.data_size, a.fildes)
}

fn render_direct(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    let _ = write!(
        sb,
        "the file descriptor was opened with O_DIRECT and either the address of data, the value \
         of data_size, or the file offset is not suitably aligned (multiple of {})",
        DIRECT_ALIGN
    );
}

fn render_unsuitable(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Read) {
    sb.push_str("fildes is attached to an object which is unsuitable for reading");
    if let Some(info) = a.info() {
        let _ = write!(sb, " ({})", info.kind().describe());
    }
}

fn in_background(_: &mut ProbeContext, a: &Read) -> bool {
    background_tty(a.fildes)
}

fn render_background(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    sb.push_str(
        "the process is in a background process group and tried to read from its controlling \
         terminal",
    );
}

fn render_eio(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Read) {
    common::eio(sb);
}

static READ_CAUSES: &[CauseTemplate<Read>] = &[
    CauseTemplate::new(&[libc::EBADF], not_open, render_ebadf),
    CauseTemplate::new(&[libc::EBADF], not_readable, render_not_readable),
    CauseTemplate::new(&[libc::EFAULT], data_faults, render_data_fault),
    CauseTemplate::new(&[libc::EAGAIN], nonblocking, render_would_block),
    CauseTemplate::new(&[libc::EISDIR, libc::EINVAL], is_directory, render_directory),
    CauseTemplate::new(&[libc::EINVAL], direct_misaligned, render_direct),
    CauseTemplate::new(&[libc::EINVAL], cause::always, render_unsuitable),
    CauseTemplate::new(&[libc::EIO], in_background, render_background),
    CauseTemplate::new(&[libc::EIO], cause::always, render_eio),
];

impl Syscall for Read {
    const NAME: &'static str = "read";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        printers::print_fildes(sb, self.fildes);
        comma(sb);
        printers::print_pointer(sb, self.data);
        comma(sb);
        printers::print_size(sb, self.data_size);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        READ_CAUSES
    }
}

entry_points! {
    Read => explain_read, explain_errno_read, explain_message_read, explain_message_errno_read;
    <> (fildes: i32, data: *const u8, data_size: usize) => Read {
        fildes,
        data: data as usize,
        data_size,
    }
}

/// `read(2)`, explaining any failure through the output sink.
pub fn read_on_error(fildes: i32, data: &mut [u8]) -> std::io::Result<usize> {
    // SAFETY: data is a valid writable buffer of data.len() bytes.
    let n = unsafe { libc::read(fildes, data.as_mut_ptr() as *mut libc::c_void, data.len()) };
    if n >= 0 {
        return Ok(n as usize);
    }
    let errnum = crate::assemble::last_errno();
    Err(report(
        explain_errno_read(errnum, fildes, data.as_ptr(), data.len()),
        errnum,
    ))
}

/// `read(2)`, exiting with an explanation on failure.
pub fn read_or_die(fildes: i32, data: &mut [u8]) -> usize {
    read_on_error(fildes, data).unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;
    use std::os::fd::AsRawFd;

    fn tail(text: &str) -> &str {
        text.split_once(" because ").map(|(_, t)| t).unwrap_or("")
    }

    #[test]
    #[serial]
    fn test_not_open_for_reading() {
        options::set_global(Options::new());
        let f = tempfile::NamedTempFile::new().unwrap();
        let wo = std::fs::OpenOptions::new().write(true).open(f.path()).unwrap();
        let fd = wo.as_raw_fd();
        let mut buf = [0u8; 8];
        let text = explain_errno_read(libc::EBADF, fd, buf.as_mut_ptr(), 8);
        assert!(text.starts_with(&format!("read({}, 0x", fd)));
        assert_eq!(
            tail(&text),
            "the fildes argument does not refer to an object that is open for reading (O_WRONLY)"
        );
    }

    #[test]
    #[serial]
    fn test_closed_and_negative_fd() {
        options::set_global(Options::new());
        let buf = [0u8; 4];
        let text = explain_errno_read(libc::EBADF, 1_000_000, buf.as_ptr(), 4);
        assert_eq!(tail(&text), "the fildes argument does not refer to a valid open file descriptor");
        let text = explain_errno_read(libc::EBADF, -1, buf.as_ptr(), 4);
        assert_eq!(tail(&text), "the fildes argument is negative (-1)");
    }

    #[test]
    #[serial]
    fn test_null_buffer_faults() {
        options::set_global(Options::new());
        let text = explain_errno_read(libc::EFAULT, 0, std::ptr::null(), 4);
        assert!(text.starts_with("read(0, NULL, 4) failed, Bad address (EFAULT) because data refers"));
    }

    #[test]
    #[serial]
    fn test_directory() {
        options::set_global(Options::new());
        let dir = std::fs::File::open("/").unwrap();
        let buf = [0u8; 4];
        let text = explain_errno_read(libc::EISDIR, dir.as_raw_fd(), buf.as_ptr(), 4);
        assert!(tail(&text).starts_with("fildes refers to a directory"));
    }
}
