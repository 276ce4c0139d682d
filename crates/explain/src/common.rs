//! Cause fragments shared by many syscalls.
//!
//! The generic explanation of an errno lives here, along with sentences
//! that several tables reuse (bad descriptor, descriptor limits, read-only
//! filesystems, bad pointers).

use std::fmt::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use explain_core::{errno, StringBuffer};
use explain_probe::fildes::{self, AccessMode};
use explain_probe::pids::Holder;
use explain_probe::{fs, rlimit, ProbeContext};

/// Explanation used when nothing more specific is known.
pub fn no_detail(sb: &mut StringBuffer, errnum: i32) {
    let _ = write!(sb, "{} (no further detail available)", errno::strerror(errnum));
}

/// Generic explanation of `ctx.errnum` for `syscall`.
pub fn generic(sb: &mut StringBuffer, ctx: &mut ProbeContext, syscall: &str) {
    match ctx.errnum {
        0 => {}
        libc::EAGAIN => ewouldblock(sb, syscall),
        libc::EMFILE => emfile(sb, ctx),
        libc::ENFILE => enfile(sb, ctx),
        libc::EPERM => {
            let _ = write!(
                sb,
                "the process does not have the appropriate privileges to use the {} system call",
                syscall
            );
        }
        libc::EINTR => eintr(sb, syscall),
        libc::ENOMEM => enomem_user(sb),
        libc::ENOBUFS => enobufs(sb),
        libc::ENOSYS | libc::ENOTTY | libc::EOPNOTSUPP => enosys(sb, syscall),
        libc::ERANGE => sb.push_str("the numerical result is out of range"),
        libc::EOVERFLOW => {
            sb.push_str("the result cannot be represented in the data types available")
        }
        libc::EFAULT => sb.push_str(
            "one or more arguments referred to memory outside the address space of the process",
        ),
        libc::EIO => eio(sb),
        n => {
            no_detail(sb, n);
            if ctx.options.debug {
                sb.add_footnote(format_args!(
                    "this error is undocumented for the {} system call",
                    syscall
                ));
            }
        }
    }
}

// ── Descriptors ──────────────────────────────────────────────────

pub fn ebadf(sb: &mut StringBuffer, ctx: &ProbeContext, fd: i32, caption: &str) {
    if fd < 0 {
        let _ = write!(sb, "the {} argument is negative ({})", caption, fd);
        return;
    }
    let _ = write!(
        sb,
        "the {} argument does not refer to a valid open file descriptor",
        caption
    );
    if ctx.options.dialect_specific && fildes::beyond_limit(fd) {
        if let Some(soft) = rlimit::get(rlimit::Resource::OpenFiles).and_then(|l| l.soft) {
            let _ = write!(sb, " ({} is beyond the descriptor limit of {})", fd, soft);
        }
    }
}

/// `fd` is open but not for reading; false when that is not the case.
pub fn not_open_for_reading(sb: &mut StringBuffer, fd: i32, caption: &str) -> bool {
    match fildes::inspect(fd) {
        Some(info) if !info.access.readable() => {
            access_mismatch(sb, caption, "reading", info.access);
            true
        }
        _ => false,
    }
}

/// `fd` is open but not for writing; false when that is not the case.
pub fn not_open_for_writing(sb: &mut StringBuffer, fd: i32, caption: &str) -> bool {
    match fildes::inspect(fd) {
        Some(info) if !info.access.writable() => {
            access_mismatch(sb, caption, "writing", info.access);
            true
        }
        _ => false,
    }
}

fn access_mismatch(sb: &mut StringBuffer, caption: &str, what: &str, access: AccessMode) {
    let _ = write!(
        sb,
        "the {} argument does not refer to an object that is open for {} ({})",
        caption,
        what,
        access.name()
    );
}

pub fn emfile(sb: &mut StringBuffer, ctx: &ProbeContext) {
    sb.push_str("the process already has the maximum number of file descriptors open");
    if let Some(soft) = rlimit::get(rlimit::Resource::OpenFiles).and_then(|l| l.soft) {
        let _ = write!(sb, " ({})", soft);
        if ctx.options.dialect_specific {
            if let Some(open) = rlimit::open_fd_count() {
                sb.add_footnote(format_args!("{} descriptors are currently open", open));
            }
        }
    }
}

pub fn enfile(sb: &mut StringBuffer, ctx: &ProbeContext) {
    sb.push_str("the system limit on the total number of open files has been reached");
    if ctx.options.dialect_specific {
        if let Some((used, max)) = rlimit::system_file_count() {
            let _ = write!(sb, " ({} of {})", used, max);
        }
    }
}

// ── Resources ────────────────────────────────────────────────────

pub fn enomem_kernel(sb: &mut StringBuffer) {
    sb.push_str("insufficient kernel memory was available");
}

pub fn enomem_user(sb: &mut StringBuffer) {
    sb.push_str("insufficient user-space memory was available");
}

pub fn enobufs(sb: &mut StringBuffer) {
    sb.push_str("insufficient kernel memory was available for buffers");
}

pub fn eintr(sb: &mut StringBuffer, syscall: &str) {
    let _ = write!(
        sb,
        "the {} system call was interrupted by a signal before it could complete",
        syscall
    );
}

pub fn ewouldblock(sb: &mut StringBuffer, syscall: &str) {
    let _ = write!(
        sb,
        "the file descriptor has been marked non-blocking (O_NONBLOCK) and the {} call would block",
        syscall
    );
}

pub fn enosys(sb: &mut StringBuffer, syscall: &str) {
    let _ = write!(
        sb,
        "the {} system call is not supported by the kernel, or by the object it was applied to",
        syscall
    );
}

pub fn eio(sb: &mut StringBuffer) {
    sb.push_str("a low-level I/O error occurred, probably in hardware");
}

// ── Arguments ────────────────────────────────────────────────────

pub fn efault(sb: &mut StringBuffer, caption: &str) {
    let _ = write!(
        sb,
        "{} refers to memory that is outside the process's accessible address space",
        caption
    );
}

pub fn einval_bits(sb: &mut StringBuffer, caption: &str) {
    let _ = write!(sb, "the {} argument contains one or more invalid bits", caption);
}

// ── Filesystems ──────────────────────────────────────────────────

/// Mount point of the filesystem holding `path`, or of its parent when
/// the path itself is missing.
fn mount_point_of(path: &Path) -> Option<std::path::PathBuf> {
    let m = fs::mount_of(path).or_else(|| path.parent().and_then(fs::mount_of))?;
    (!m.mount_point.as_os_str().is_empty()).then_some(m.mount_point)
}

fn push_mount_point(sb: &mut StringBuffer, path: &Path) {
    if let Some(mp) = mount_point_of(path) {
        sb.push_str(" (");
        sb.push_bytes(mp.as_os_str().as_bytes());
        sb.push_char(')');
    }
}

/// Is `path` (or the directory that would hold it) on a read-only mount?
pub fn on_read_only_fs(path: &Path) -> bool {
    fs::is_read_only(path)
        .or_else(|| path.parent().and_then(fs::is_read_only))
        .unwrap_or(false)
}

pub fn erofs(sb: &mut StringBuffer, path: &Path, caption: &str) {
    let _ = write!(
        sb,
        "write access was requested and {} refers to a file on a read-only file system",
        caption
    );
    push_mount_point(sb, path);
}

pub fn enospc(sb: &mut StringBuffer, path: &Path, caption: &str) {
    let dir = if path.exists() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    match fs::free_space(dir) {
        Some((_, _, 0)) => {
            let _ = write!(
                sb,
                "the file system containing {} has run out of inodes",
                caption
            );
        }
        _ => {
            let _ = write!(
                sb,
                "the file system containing {} has no room for more data",
                caption
            );
        }
    }
    push_mount_point(sb, path);
}

/// Data could not be written to the filesystem behind `fd`.
pub fn enospc_fildes(sb: &mut StringBuffer, fd: i32, caption: &str) {
    let _ = write!(
        sb,
        "the file system containing {} has no room for more data",
        caption
    );
    if let Some(p) = fildes::fd_path(fd) {
        push_mount_point(sb, &p);
    }
}

// ── Other processes ──────────────────────────────────────────────

/// ` (pid 42 "vim" holding open, ...)` for up to three holders.
pub fn push_holders(sb: &mut StringBuffer, holders: &[Holder]) {
    if holders.is_empty() {
        return;
    }
    sb.push_str(" (");
    for (i, h) in holders.iter().take(3).enumerate() {
        if i > 0 {
            sb.push_str(", ");
        }
        let _ = write!(sb, "pid {} ", h.pid);
        sb.push_quoted(Some(h.command.as_bytes()));
        let _ = write!(sb, " {}", h.how.describe());
    }
    if holders.len() > 3 {
        sb.push_str(", ...");
    }
    sb.push_char(')');
}
