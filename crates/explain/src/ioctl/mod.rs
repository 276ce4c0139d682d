//! `ioctl(2)`
//!
//! The request number picks a catalog entry (see [`catalog`]), and the
//! entry says what kind of object the descriptor must be and how to print
//! the data argument. Requests missing from the catalog are printed in hex
//! and explained from the device class their number range implies.

pub mod catalog;
pub mod dispatch;

use std::ffi::CString;
use std::fmt::Write;

use explain_core::{Options, StringBuffer};
use explain_probe::{fildes, is_efault, ProbeContext};

use crate::cause::{self, CauseTemplate};
use crate::common;
use crate::printers;
use crate::syscall::{comma, open_paren, report, Syscall};

use catalog::{class_hint, ifreq_name, DataKind, DeviceClass, Encoded};
use dispatch::Lookup;

/// Printed in place of a data argument of unknown shape.
const UNKNOWN_DATA: &str = "\u{2026}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ioctl {
    pub fildes: i32,
    pub request: u64,
    /// The third argument, an integer or an address depending on the request
    pub data: usize,
}

impl Ioctl {
    fn lookup(&self) -> Lookup {
        dispatch::find(self.fildes, self.request, self.data)
    }

    /// The class the descriptor must belong to, if anything is known.
    fn class(&self) -> Option<DeviceClass> {
        match self.lookup().descriptor() {
            Some(d) => Some(d.class),
            None => class_hint(self.request),
        }
    }

    fn data_kind(&self) -> DataKind {
        match self.lookup() {
            Lookup::Found(d) => d.data,
            _ => DataKind::Unknown,
        }
    }

    fn print_data(&self, sb: &mut StringBuffer) {
        match self.data_kind() {
            DataKind::Unknown => sb.push_str(UNKNOWN_DATA),
            DataKind::Int => {
                let _ = write!(sb, "{}", self.data as isize);
            }
            DataKind::None => printers::print_pointer(sb, self.data),
            DataKind::IfReq => match ifreq_name(self.data) {
                Some(name) => {
                    sb.push_str("{ ifr_name = ");
                    sb.push_quoted(Some(name.as_bytes()));
                    sb.push_str(" }");
                }
                None => self.print_pointer(sb, DataKind::IfReq),
            },
            kind => self.print_pointer(sb, kind),
        }
    }

    fn print_pointer(&self, sb: &mut StringBuffer, kind: DataKind) {
        let size = kind.pointee_size().unwrap_or(1);
        if self.data != 0 && is_efault(self.data as *const u8, size) {
            sb.push_efault();
        } else {
            printers::print_pointer(sb, self.data);
        }
    }
}

// ── Causes ───────────────────────────────────────────────────────

fn not_open(_: &mut ProbeContext, a: &Ioctl) -> bool {
    !fildes::is_open(a.fildes)
}

fn render_ebadf(sb: &mut StringBuffer, ctx: &mut ProbeContext, a: &Ioctl) {
    common::ebadf(sb, ctx, a.fildes, "fildes");
}

fn data_faults(_: &mut ProbeContext, a: &Ioctl) -> bool {
    match a.data_kind().pointee_size() {
        Some(n) => a.data == 0 || is_efault(a.data as *const u8, n),
        None => false,
    }
}

fn render_data_fault(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Ioctl) {
    common::efault(sb, "data");
}

fn wrong_class(_: &mut ProbeContext, a: &Ioctl) -> bool {
    match a.class() {
        Some(DeviceClass::Any) | None => false,
        Some(class) => !class.matches(a.fildes, a.data),
    }
}

fn render_wrong_class(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Ioctl) {
    if let Some(class) = a.class() {
        let _ = write!(sb, "the file descriptor does not refer to a {}", class.describe());
    }
}

fn interface_name(a: &Ioctl) -> Option<String> {
    match a.data_kind() {
        DataKind::IfReq => ifreq_name(a.data),
        _ => None,
    }
}

fn no_such_interface(_: &mut ProbeContext, a: &Ioctl) -> bool {
    let Some(name) = interface_name(a) else {
        return false;
    };
    let Ok(c) = CString::new(name) else {
        return false;
    };
    // SAFETY: c is a valid NUL-terminated string.
    unsafe { libc::if_nametoindex(c.as_ptr()) == 0 }
}

fn render_no_interface(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Ioctl) {
    sb.push_str("there is no ");
    if let Some(name) = interface_name(a) {
        sb.push_quoted(Some(name.as_bytes()));
    }
    sb.push_str(" network interface");
}

fn lacks_privilege(ctx: &mut ProbeContext, a: &Ioctl) -> bool {
    match a.lookup() {
        Lookup::Found(d) => d.privilege.map(|cap| !ctx.has(cap)).unwrap_or(false),
        _ => false,
    }
}

fn render_privilege(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Ioctl) {
    if let Lookup::Found(d) = a.lookup() {
        if let Some(cap) = d.privilege {
            let _ = write!(
                sb,
                "the process does not have the {} capability required by the {} request",
                cap, d.name
            );
        }
    }
}

fn render_invalid(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Ioctl) {
    sb.push_str("the request or data argument is not valid for the file descriptor");
    if let Some(info) = fildes::inspect(a.fildes) {
        let _ = write!(sb, " ({})", info.kind().describe());
    }
}

fn render_not_tty(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Ioctl) {
    sb.push_str(
        "the file descriptor is not associated with a character special device, or the \
         request does not apply to the kind of object the file descriptor references",
    );
}

static IOCTL_CAUSES: &[CauseTemplate<Ioctl>] = &[
    CauseTemplate::new(&[libc::EBADF], not_open, render_ebadf),
    CauseTemplate::new(&[libc::EFAULT], data_faults, render_data_fault),
    CauseTemplate::new(
        &[libc::ENOTTY, libc::EINVAL, libc::ENOTSOCK, libc::ENODEV],
        wrong_class,
        render_wrong_class,
    ),
    CauseTemplate::new(&[libc::ENODEV], no_such_interface, render_no_interface),
    CauseTemplate::new(&[libc::EPERM, libc::EACCES], lacks_privilege, render_privilege),
    CauseTemplate::new(&[libc::EINVAL], cause::always, render_invalid),
    CauseTemplate::new(&[libc::ENOTTY], cause::always, render_not_tty),
];

impl Syscall for Ioctl {
    const NAME: &'static str = "ioctl";

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        printers::print_fildes(sb, self.fildes);
        comma(sb);
        match self.lookup() {
            Lookup::Found(d) => sb.push_str(d.name),
            _ => {
                let _ = write!(sb, "{:#x}", self.request);
            }
        }
        comma(sb);
        self.print_data(sb);
        sb.push_char(')');
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        IOCTL_CAUSES
    }

    fn footnotes(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        let lookup = self.lookup();
        if matches!(lookup, Lookup::Unknown) && class_hint(self.request).is_none() {
            sb.add_footnote(format_args!(
                "the ioctl request {:#x} is not recognized",
                self.request
            ));
        }
        if ctx.options.debug && !matches!(lookup, Lookup::Found(_)) {
            sb.add_footnote(format_args!(
                "{:#x} decodes as {}",
                self.request,
                Encoded::decode(self.request)
            ));
        }
    }
}

entry_points! {
    Ioctl => explain_ioctl, explain_errno_ioctl, explain_message_ioctl, explain_message_errno_ioctl;
    <> (fildes: i32, request: u64, data: usize) => Ioctl { fildes, request, data }
}

/// `ioctl(2)`, explaining any failure through the output sink.
///
/// # Safety
///
/// `data` must be what the driver expects for `request`; the kernel may
/// write through it.
pub unsafe fn ioctl_on_error(
    fildes: i32,
    request: u64,
    data: *mut libc::c_void,
) -> std::io::Result<i32> {
    // SAFETY: upheld by the caller.
    let rc = unsafe { libc::ioctl(fildes, request as _, data) };
    if rc >= 0 {
        return Ok(rc);
    }
    let errnum = crate::assemble::last_errno();
    Err(report(explain_errno_ioctl(errnum, fildes, request, data as usize), errnum))
}

/// `ioctl(2)`, exiting with an explanation on failure.
///
/// # Safety
///
/// As for [`ioctl_on_error`].
pub unsafe fn ioctl_or_die(fildes: i32, request: u64, data: *mut libc::c_void) -> i32 {
    // SAFETY: upheld by the caller.
    unsafe { ioctl_on_error(fildes, request, data) }.unwrap_or_else(|_| crate::output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;
    use std::os::fd::AsRawFd;

    #[test]
    #[serial]
    fn test_unknown_request_on_plain_socket() {
        options::set_global(Options::new());
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let fd = sock.as_raw_fd();
        assert_eq!(
            explain_errno_ioctl(libc::EINVAL, fd, 0x89a0, 0),
            format!(
                "ioctl({}, 0x89a0, \u{2026}) failed, Invalid argument (EINVAL) because the file \
                 descriptor does not refer to a PPP interface",
                fd
            )
        );
    }

    #[test]
    #[serial]
    fn test_terminal_request_on_regular_file() {
        options::set_global(Options::new());
        let f = tempfile::tempfile().unwrap();
        let fd = f.as_raw_fd();
        let mut ws = libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
        let addr = &mut ws as *mut libc::winsize as usize;
        let text = explain_errno_ioctl(libc::ENOTTY, fd, 0x5413, addr);
        assert_eq!(
            text,
            format!(
                "ioctl({}, TIOCGWINSZ, {:#x}) failed, Inappropriate ioctl for device (ENOTTY) \
                 because the file descriptor does not refer to a terminal",
                fd, addr
            )
        );
    }

    #[test]
    #[serial]
    fn test_null_data_pointer() {
        options::set_global(Options::new());
        let f = tempfile::tempfile().unwrap();
        let text = explain_errno_ioctl(libc::EFAULT, f.as_raw_fd(), 0x541B, 0);
        assert!(text.contains("FIONREAD, NULL)"));
        assert!(text.ends_with("because data refers to memory that is outside the process's \
                                accessible address space"));
    }

    #[test]
    #[serial]
    fn test_missing_interface() {
        options::set_global(Options::new());
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut req = [0u8; 40];
        req[..12].copy_from_slice(b"nosuchif9zz0");
        let text = explain_errno_ioctl(libc::ENODEV, sock.as_raw_fd(), 0x8913, req.as_ptr() as usize);
        assert!(text.contains("SIOCGIFFLAGS, { ifr_name = \"nosuchif9zz0\" })"));
        assert!(text.ends_with("because there is no \"nosuchif9zz0\" network interface"));
    }

    #[test]
    #[serial]
    fn test_unrecognized_request_footnote() {
        options::set_global(Options::new());
        let text = explain_errno_ioctl(libc::ENOTTY, 0, 0xdead, 0);
        assert!(text.contains("ioctl(0, 0xdead, \u{2026})"));
        assert!(text.ends_with("the ioctl request 0xdead is not recognized"));
    }

    #[test]
    #[serial]
    fn test_closed_descriptor() {
        options::set_global(Options::new());
        let text = explain_errno_ioctl(libc::EBADF, 9999, 0x5401, 0);
        assert!(text.starts_with("ioctl(9999, TCGETS, NULL) failed, Bad file descriptor (EBADF)"));
    }

    #[test]
    #[serial]
    fn test_ioctl_on_error_reports() {
        options::set_global(Options::new());
        let f = tempfile::tempfile().unwrap();
        crate::output::set_output(Some(Box::new(crate::output::WriterOutput::new(std::io::sink()))));
        let mut ws = libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
        // SAFETY: TIOCGWINSZ writes a winsize.
        let r = unsafe {
            ioctl_on_error(f.as_raw_fd(), libc::TIOCGWINSZ as u64, &mut ws as *mut _ as *mut _)
        };
        crate::output::set_output(None);
        assert_eq!(r.unwrap_err().raw_os_error(), Some(libc::ENOTTY));
    }
}
